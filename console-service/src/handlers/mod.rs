pub mod accounts;
pub mod app;
pub mod auth;
pub mod env_vars;
pub mod monitoring;
pub mod service_control;
pub mod services;
