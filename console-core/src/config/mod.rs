//! Base configuration shared by every crate in the workspace. The
//! service-specific knobs live with the service; only the listener
//! settings belong here.

use crate::error::AppError;
use config::{Config as Cfg, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    8080
}

impl Config {
    /// Layered load: an optional `console.*` file, then `CONSOLE_`
    /// environment variables on top.
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let config = Cfg::builder()
            .add_source(File::with_name("console").required(false))
            .add_source(config::Environment::with_prefix("CONSOLE").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
