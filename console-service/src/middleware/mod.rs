pub mod auth;
pub mod csrf;

pub use auth::{session_middleware, CurrentUser};
pub use csrf::csrf_middleware;
