//! Services layer for the console.

pub mod accounts;
pub mod cache;
pub mod catalog;
pub mod error;
pub mod keepalive;
pub mod lockout;
pub mod platform;
pub mod session;

pub use accounts::AccountStore;
pub use cache::{CacheTier, CachedServices, ServiceCache};
pub use catalog::{AggregatedServices, ServiceCatalog};
pub use error::ServiceError;
pub use keepalive::KeepAlive;
pub use lockout::{LockStatus, LoginLockout};
pub use platform::PlatformClient;
pub use session::{SessionRecord, SessionService, VerifiedSession};
