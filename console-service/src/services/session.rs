//! Authenticated sessions over the KV store, with sliding expiration.
//!
//! The stored expiry and the cookie Max-Age are always derived from
//! the same `now + expiry` instant, so server state and client-visible
//! expiry cannot drift. Store failures during verification read as
//! "no session": an outage must never look like authentication.

use crate::config::SessionConfig;
use crate::services::error::ServiceError;
use console_core::kv::KvStore;
use console_core::utils::generate_token;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const SESSION_PREFIX: &str = "session:";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub principal: String,
    pub created_at: i64,
    pub expires_at: i64,
    #[serde(default)]
    pub last_seen_at: Option<i64>,
}

#[derive(Debug)]
pub struct VerifiedSession {
    pub record: SessionRecord,
    /// Set when the sliding refresh rewrote the record; the cookie
    /// Max-Age to send back, in seconds.
    pub renewed_max_age: Option<u64>,
}

#[derive(Clone)]
pub struct SessionService {
    kv: Arc<dyn KvStore>,
    cfg: SessionConfig,
}

impl SessionService {
    pub fn new(kv: Arc<dyn KvStore>, cfg: SessionConfig) -> Self {
        Self { kv, cfg }
    }

    fn key(session_id: &str) -> String {
        format!("{}{}", SESSION_PREFIX, session_id)
    }

    pub fn cookie_max_age(&self) -> u64 {
        (self.cfg.expiry_ms / 1000) as u64
    }

    /// Create a session and return its id (256 bits of entropy).
    pub async fn create(&self, principal: &str) -> Result<String, ServiceError> {
        let session_id = generate_token(32);
        let now = chrono::Utc::now().timestamp_millis();
        let record = SessionRecord {
            principal: principal.to_string(),
            created_at: now,
            expires_at: now + self.cfg.expiry_ms,
            last_seen_at: None,
        };

        let payload = serde_json::to_string(&record)
            .map_err(|e| ServiceError::Internal(anyhow::Error::new(e)))?;
        self.kv
            .put(&Self::key(&session_id), &payload, Some(self.cookie_max_age()))
            .await
            .map_err(|e| ServiceError::Internal(anyhow::Error::new(e)))?;

        Ok(session_id)
    }

    /// Look up a session; with `sliding` the expiry is pushed forward,
    /// but only when the extension is worth at least the minimum
    /// refresh interval (throttles KV writes under rapid polling).
    pub async fn verify(&self, session_id: &str, sliding: bool) -> Option<VerifiedSession> {
        let key = Self::key(session_id);
        let mut record: SessionRecord =
            match console_core::kv::get_json(self.kv.as_ref(), &key).await {
                Ok(Some(record)) => record,
                Ok(None) => return None,
                Err(e) => {
                    // Fail closed.
                    tracing::warn!(error = %e, "session read failed, treating as unauthenticated");
                    return None;
                }
            };

        // Inclusive: a record whose expiry is exactly now is dead.
        let now = chrono::Utc::now().timestamp_millis();
        if now >= record.expires_at {
            if let Err(e) = self.kv.delete(&key).await {
                tracing::warn!(error = %e, "failed to delete expired session");
            }
            return None;
        }

        if sliding {
            let new_expires_at = now + self.cfg.expiry_ms;
            if new_expires_at - record.expires_at >= self.cfg.min_refresh_interval_ms {
                record.expires_at = new_expires_at;
                record.last_seen_at = Some(now);

                match serde_json::to_string(&record) {
                    Ok(payload) => {
                        if let Err(e) = self
                            .kv
                            .put(&key, &payload, Some(self.cookie_max_age()))
                            .await
                        {
                            // The old record is still valid; skip the renewal.
                            tracing::warn!(error = %e, "session renewal write failed");
                            return Some(VerifiedSession {
                                record,
                                renewed_max_age: None,
                            });
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "session encode failed");
                        return Some(VerifiedSession {
                            record,
                            renewed_max_age: None,
                        });
                    }
                }

                return Some(VerifiedSession {
                    record,
                    renewed_max_age: Some(self.cookie_max_age()),
                });
            }
        }

        Some(VerifiedSession {
            record,
            renewed_max_age: None,
        })
    }

    pub async fn destroy(&self, session_id: &str) {
        if let Err(e) = self.kv.delete(&Self::key(session_id)).await {
            tracing::warn!(error = %e, "failed to destroy session");
        }
    }
}
