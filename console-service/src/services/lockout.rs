//! Brute-force protection for the login endpoint.
//!
//! Failure counters are kept per normalized client IP and per
//! normalized username; either dimension locking blocks the attempt.
//! Records expire via KV TTL equal to the rolling window, which is
//! the intended sliding-window reset. Past the threshold the lock
//! duration doubles per extra failure up to a cap.
//!
//! Two concurrent failures can under-count each other (no CAS on the
//! store); that only weakens the lockout, never defeats it.

use crate::config::LockoutConfig;
use console_core::kv::KvStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const ATTEMPT_PREFIX: &str = "login_attempt:";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempts: u32,
    /// Epoch ms; 0 means not locked.
    pub locked_until: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockStatus {
    pub locked: bool,
    pub locked_until: i64,
}

impl LockStatus {
    fn unlocked() -> Self {
        Self {
            locked: false,
            locked_until: 0,
        }
    }

    /// Seconds until the lock lifts, for a Retry-After header.
    pub fn retry_after_seconds(&self) -> u64 {
        let now = chrono::Utc::now().timestamp_millis();
        ((self.locked_until - now).max(0) as u64).div_ceil(1000)
    }
}

#[derive(Clone)]
pub struct LoginLockout {
    kv: Arc<dyn KvStore>,
    cfg: LockoutConfig,
}

impl LoginLockout {
    pub fn new(kv: Arc<dyn KvStore>, cfg: LockoutConfig) -> Self {
        Self { kv, cfg }
    }

    fn ip_key(ip: &str) -> String {
        format!("{}ip:{}", ATTEMPT_PREFIX, normalize(ip))
    }

    fn user_key(username: &str) -> String {
        format!("{}user:{}", ATTEMPT_PREFIX, normalize(username))
    }

    /// Whether either dimension is currently locked. Store read errors
    /// degrade to "unlocked": an outage weakens the guard rather than
    /// blocking all logins.
    pub async fn check(&self, ip: &str, username: &str) -> LockStatus {
        let ip_key = Self::ip_key(ip);
        let user_key = Self::user_key(username);
        let (ip_record, user_record) = tokio::join!(self.read(&ip_key), self.read(&user_key));

        let now = chrono::Utc::now().timestamp_millis();
        for record in [ip_record, user_record].into_iter().flatten() {
            if record.locked_until > now {
                return LockStatus {
                    locked: true,
                    locked_until: record.locked_until,
                };
            }
        }
        LockStatus::unlocked()
    }

    /// Record a failed attempt against both dimensions.
    pub async fn record_failure(&self, ip: &str, username: &str) {
        let ip_key = Self::ip_key(ip);
        let user_key = Self::user_key(username);
        let (ip_record, user_record) = tokio::join!(self.read(&ip_key), self.read(&user_key));

        let now = chrono::Utc::now().timestamp_millis();
        let next_ip = self.bump(ip_record, now);
        let next_user = self.bump(user_record, now);

        tokio::join!(self.write(&ip_key, &next_ip), self.write(&user_key, &next_user));
    }

    /// Clear both dimensions after a successful authentication.
    pub async fn clear(&self, ip: &str, username: &str) {
        let ip_key = Self::ip_key(ip);
        let user_key = Self::user_key(username);
        let (a, b) = tokio::join!(self.kv.delete(&ip_key), self.kv.delete(&user_key));
        for result in [a, b] {
            if let Err(e) = result {
                tracing::warn!(error = %e, "failed to clear login attempt record");
            }
        }
    }

    fn bump(&self, record: Option<AttemptRecord>, now: i64) -> AttemptRecord {
        let attempts = record.map(|r| r.attempts).unwrap_or(0) + 1;
        let locked_until = if attempts >= self.cfg.max_attempts {
            now + (self.lock_seconds(attempts) * 1000) as i64
        } else {
            0
        };
        AttemptRecord {
            attempts,
            locked_until,
            updated_at: now,
        }
    }

    /// `base * 2^(attempts - threshold)`, capped.
    fn lock_seconds(&self, attempts: u32) -> u64 {
        let exponent = attempts.saturating_sub(self.cfg.max_attempts).min(32);
        self.cfg
            .base_lock_seconds
            .saturating_mul(1u64 << exponent)
            .min(self.cfg.max_lock_seconds)
    }

    async fn read(&self, key: &str) -> Option<AttemptRecord> {
        match console_core::kv::get_json(self.kv.as_ref(), key).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(key, error = %e, "login attempt read failed");
                None
            }
        }
    }

    async fn write(&self, key: &str, record: &AttemptRecord) {
        let payload = match serde_json::to_string(record) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(key, error = %e, "login attempt encode failed");
                return;
            }
        };
        if let Err(e) = self
            .kv
            .put(key, &payload, Some(self.cfg.window_seconds))
            .await
        {
            tracing::warn!(key, error = %e, "login attempt write failed");
        }
    }
}

fn normalize(value: &str) -> String {
    let trimmed = value.trim().to_lowercase();
    if trimmed.is_empty() {
        "unknown".to_string()
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use console_core::kv::{FailingKv, MemoryKv};

    fn test_cfg() -> LockoutConfig {
        LockoutConfig {
            max_attempts: 5,
            window_seconds: 15 * 60,
            base_lock_seconds: 5 * 60,
            max_lock_seconds: 60 * 60,
        }
    }

    fn guard() -> LoginLockout {
        LoginLockout::new(Arc::new(MemoryKv::new()), test_cfg())
    }

    #[tokio::test]
    async fn locks_at_threshold_with_base_duration() {
        let guard = guard();
        for _ in 0..4 {
            guard.record_failure("1.2.3.4", "admin").await;
        }
        assert!(!guard.check("1.2.3.4", "admin").await.locked);

        guard.record_failure("1.2.3.4", "admin").await;
        let status = guard.check("1.2.3.4", "admin").await;
        assert!(status.locked);

        let now = chrono::Utc::now().timestamp_millis();
        let lock_ms = status.locked_until - now;
        assert!(lock_ms > 4 * 60 * 1000 && lock_ms <= 5 * 60 * 1000);
    }

    #[tokio::test]
    async fn lock_doubles_past_threshold_and_caps() {
        let guard = guard();
        for _ in 0..6 {
            guard.record_failure("1.2.3.4", "admin").await;
        }
        let status = guard.check("1.2.3.4", "admin").await;
        let now = chrono::Utc::now().timestamp_millis();
        let lock_ms = status.locked_until - now;
        // 6th failure: base * 2^1 = 10 minutes.
        assert!(lock_ms > 9 * 60 * 1000 && lock_ms <= 10 * 60 * 1000);

        // Many more failures hit the one-hour cap.
        for _ in 0..20 {
            guard.record_failure("1.2.3.4", "admin").await;
        }
        let status = guard.check("1.2.3.4", "admin").await;
        let lock_ms = status.locked_until - chrono::Utc::now().timestamp_millis();
        assert!(lock_ms <= 60 * 60 * 1000);
        assert!(lock_ms > 59 * 60 * 1000);
    }

    #[tokio::test]
    async fn either_dimension_blocks() {
        let guard = guard();
        // One IP hammering many usernames still locks the IP.
        for i in 0..5 {
            guard
                .record_failure("1.2.3.4", &format!("user{}", i))
                .await;
        }
        assert!(guard.check("1.2.3.4", "someone-new").await.locked);

        // Many IPs hammering one username still lock the username.
        let guard = LoginLockout::new(Arc::new(MemoryKv::new()), test_cfg());
        for i in 0..5 {
            guard
                .record_failure(&format!("10.0.0.{}", i), "admin")
                .await;
        }
        assert!(guard.check("99.99.99.99", "admin").await.locked);
    }

    #[tokio::test]
    async fn success_clears_both_dimensions() {
        let guard = guard();
        for _ in 0..5 {
            guard.record_failure("1.2.3.4", "admin").await;
        }
        assert!(guard.check("1.2.3.4", "admin").await.locked);

        guard.clear("1.2.3.4", "admin").await;
        assert!(!guard.check("1.2.3.4", "admin").await.locked);
        assert!(!guard.check("1.2.3.4", "other").await.locked);
        assert!(!guard.check("5.6.7.8", "admin").await.locked);
    }

    #[tokio::test]
    async fn dimensions_are_normalized() {
        let guard = guard();
        for _ in 0..5 {
            guard.record_failure(" 1.2.3.4 ", "Admin").await;
        }
        assert!(guard.check("1.2.3.4", "admin").await.locked);
    }

    #[tokio::test]
    async fn store_outage_degrades_to_unlocked() {
        let guard = LoginLockout::new(Arc::new(FailingKv), test_cfg());
        assert!(!guard.check("1.2.3.4", "admin").await.locked);
        // Writes are dropped without surfacing.
        guard.record_failure("1.2.3.4", "admin").await;
        guard.clear("1.2.3.4", "admin").await;
    }
}
