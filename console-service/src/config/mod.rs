use console_core::config as core_config;
use console_core::error::AppError;
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct ConsoleConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub log_level: String,
    pub redis: RedisConfig,
    pub admin: AdminConfig,
    pub upstream: UpstreamConfig,
    pub cache: CacheConfig,
    pub session: SessionConfig,
    pub lockout: LockoutConfig,
    pub keepalive: KeepAliveConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

/// Single operator credential pair checked at login.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub max_attempts: u32,
    pub retry_base_ms: u64,
    pub page_limit: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Entries younger than this are fresh.
    pub soft_ttl_ms: i64,
    /// Entries older than this are treated as absent.
    pub hard_ttl_ms: i64,
    /// Physical expiry applied on write, outlives the hard TTL.
    pub kv_ttl_seconds: u64,
    /// Bumping this orphans every previously written entry.
    pub version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub expiry_ms: i64,
    pub min_refresh_interval_ms: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LockoutConfig {
    pub max_attempts: u32,
    pub window_seconds: u64,
    pub base_lock_seconds: u64,
    pub max_lock_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeepAliveConfig {
    pub enabled: bool,
    pub interval_seconds: u64,
    pub ping_timeout_ms: u64,
    pub max_retries: u32,
    pub retry_base_ms: u64,
    pub batch_size: usize,
    pub batch_interval_ms: u64,
    /// Wall-clock budget for one run; remaining batches are skipped
    /// once it is exceeded.
    pub budget_ms: u64,
}

impl ConsoleConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = ConsoleConfig {
            common: common_config,
            environment,
            service_name: get_env("SERVICE_NAME", Some("console-service"), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            redis: RedisConfig {
                url: get_env("REDIS_URL", Some("redis://127.0.0.1:6379"), is_prod)?,
            },
            admin: AdminConfig {
                username: get_env("ADMIN_USERNAME", None, true)?,
                password: get_env("ADMIN_PASSWORD", None, true)?,
            },
            upstream: UpstreamConfig {
                base_url: get_env(
                    "UPSTREAM_API_BASE",
                    Some("https://api.render.com/v1"),
                    is_prod,
                )?,
                timeout_ms: parse_env("UPSTREAM_TIMEOUT_MS", 15_000, is_prod)?,
                max_attempts: parse_env("UPSTREAM_MAX_ATTEMPTS", 3, is_prod)?,
                retry_base_ms: parse_env("UPSTREAM_RETRY_BASE_MS", 500, is_prod)?,
                page_limit: parse_env("UPSTREAM_PAGE_LIMIT", 100, is_prod)?,
            },
            cache: CacheConfig {
                soft_ttl_ms: parse_env("CACHE_SOFT_TTL_MS", 15 * 60 * 1000, is_prod)?,
                hard_ttl_ms: parse_env("CACHE_HARD_TTL_MS", 24 * 60 * 60 * 1000, is_prod)?,
                kv_ttl_seconds: parse_env("CACHE_KV_TTL_SECONDS", 48 * 60 * 60, is_prod)?,
                version: get_env("CACHE_VERSION", Some("v1"), is_prod)?,
            },
            session: SessionConfig {
                expiry_ms: parse_env("SESSION_EXPIRY_MS", 24 * 60 * 60 * 1000, is_prod)?,
                min_refresh_interval_ms: parse_env(
                    "SESSION_MIN_REFRESH_INTERVAL_MS",
                    5 * 60 * 1000,
                    is_prod,
                )?,
            },
            lockout: LockoutConfig {
                max_attempts: parse_env("LOCKOUT_MAX_ATTEMPTS", 5, is_prod)?,
                window_seconds: parse_env("LOCKOUT_WINDOW_SECONDS", 15 * 60, is_prod)?,
                base_lock_seconds: parse_env("LOCKOUT_BASE_LOCK_SECONDS", 5 * 60, is_prod)?,
                max_lock_seconds: parse_env("LOCKOUT_MAX_LOCK_SECONDS", 60 * 60, is_prod)?,
            },
            keepalive: KeepAliveConfig {
                enabled: get_env("KEEPALIVE_ENABLED", Some("true"), is_prod)?
                    .parse()
                    .unwrap_or(true),
                interval_seconds: parse_env("KEEPALIVE_INTERVAL_SECONDS", 10 * 60, is_prod)?,
                ping_timeout_ms: parse_env("KEEPALIVE_PING_TIMEOUT_MS", 10_000, is_prod)?,
                max_retries: parse_env("KEEPALIVE_MAX_RETRIES", 2, is_prod)?,
                retry_base_ms: parse_env("KEEPALIVE_RETRY_BASE_MS", 1_000, is_prod)?,
                batch_size: parse_env("KEEPALIVE_BATCH_SIZE", 10, is_prod)?,
                batch_interval_ms: parse_env("KEEPALIVE_BATCH_INTERVAL_MS", 100, is_prod)?,
                budget_ms: parse_env("KEEPALIVE_BUDGET_MS", 25_000, is_prod)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.cache.soft_ttl_ms <= 0 || self.cache.hard_ttl_ms <= self.cache.soft_ttl_ms {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "cache TTLs must satisfy 0 < soft < hard"
            )));
        }

        if (self.cache.kv_ttl_seconds as i64) * 1000 < self.cache.hard_ttl_ms {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "CACHE_KV_TTL_SECONDS must cover the hard TTL"
            )));
        }

        if self.session.expiry_ms <= self.session.min_refresh_interval_ms {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SESSION_EXPIRY_MS must exceed the minimum refresh interval"
            )));
        }

        if self.upstream.max_attempts == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "UPSTREAM_MAX_ATTEMPTS must be at least 1"
            )));
        }

        if self.lockout.max_attempts == 0 || self.lockout.base_lock_seconds == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "lockout threshold and base lock must be positive"
            )));
        }

        if self.keepalive.batch_size == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "KEEPALIVE_BATCH_SIZE must be at least 1"
            )));
        }

        if self.environment == Environment::Prod && self.admin.password.len() < 12 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "ADMIN_PASSWORD must be at least 12 characters in production"
            )));
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: T, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr + std::fmt::Display + Copy,
{
    match env::var(key) {
        Ok(val) => val.parse().map_err(|_| {
            AppError::ConfigError(anyhow::anyhow!(format!("{} is not a valid value", key)))
        }),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else {
                Ok(default)
            }
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
