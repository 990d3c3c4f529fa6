//! Per-account cache of upstream service listings.
//!
//! Entries carry their write time and are classified at read time:
//! fresh below the soft TTL, stale between soft and hard, and absent
//! at or past the hard TTL. Stale data is returned, never discarded;
//! the caller decides whether to refresh in the background.
//!
//! Caching is an optimization only: store failures degrade to a miss
//! on read and are dropped on write.

use crate::config::CacheConfig;
use crate::models::{Account, ServiceSummary};
use console_core::kv::KvStore;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTier {
    Fresh,
    Stale,
}

#[derive(Serialize, Deserialize)]
struct StoredServices {
    services: Vec<ServiceSummary>,
    cached_at: i64,
}

#[derive(Debug, Clone)]
pub struct CachedServices {
    pub services: Vec<ServiceSummary>,
    pub cached_at: i64,
    pub tier: CacheTier,
}

#[derive(Clone)]
pub struct ServiceCache {
    kv: Arc<dyn KvStore>,
    cfg: CacheConfig,
}

impl ServiceCache {
    pub fn new(kv: Arc<dyn KvStore>, cfg: CacheConfig) -> Self {
        Self { kv, cfg }
    }

    fn key(&self, account_id: &str) -> String {
        format!("services:{}:{}", self.cfg.version, account_id)
    }

    /// Read and classify one account's entry. Hard-expired entries and
    /// store errors both come back as `None`.
    pub async fn get(&self, account_id: &str) -> Option<CachedServices> {
        let key = self.key(account_id);
        let stored: StoredServices = match console_core::kv::get_json(self.kv.as_ref(), &key).await
        {
            Ok(Some(stored)) => stored,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(account_id, error = %e, "cache read failed, treating as miss");
                return None;
            }
        };

        let age = chrono::Utc::now().timestamp_millis() - stored.cached_at;
        let tier = if age < self.cfg.soft_ttl_ms {
            CacheTier::Fresh
        } else if age < self.cfg.hard_ttl_ms {
            CacheTier::Stale
        } else {
            return None;
        };

        Some(CachedServices {
            services: stored.services,
            cached_at: stored.cached_at,
            tier,
        })
    }

    /// Overwrite one account's entry with a fresh timestamp.
    pub async fn set(&self, account_id: &str, services: &[ServiceSummary]) {
        let stored = StoredServices {
            services: services.to_vec(),
            cached_at: chrono::Utc::now().timestamp_millis(),
        };
        let payload = match serde_json::to_string(&stored) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(account_id, error = %e, "cache encode failed");
                return;
            }
        };
        if let Err(e) = self
            .kv
            .put(&self.key(account_id), &payload, Some(self.cfg.kv_ttl_seconds))
            .await
        {
            tracing::warn!(account_id, error = %e, "cache write failed, dropped");
        }
    }

    pub async fn invalidate(&self, account_id: &str) {
        if let Err(e) = self.kv.delete(&self.key(account_id)).await {
            tracing::warn!(account_id, error = %e, "cache invalidation failed");
        }
    }

    /// Evaluate all accounts' entries concurrently.
    pub async fn get_all(&self, accounts: &[Account]) -> Vec<(Account, Option<CachedServices>)> {
        join_all(accounts.iter().map(|account| async move {
            (account.clone(), self.get(&account.id).await)
        }))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use console_core::kv::{FailingKv, MemoryKv};

    fn test_cfg() -> CacheConfig {
        CacheConfig {
            soft_ttl_ms: 15 * 60 * 1000,
            hard_ttl_ms: 24 * 60 * 60 * 1000,
            kv_ttl_seconds: 48 * 60 * 60,
            version: "v1".to_string(),
        }
    }

    fn summary(id: &str) -> ServiceSummary {
        ServiceSummary {
            id: id.to_string(),
            name: format!("svc-{}", id),
            service_type: None,
            auto_deploy: None,
            created_at: None,
            updated_at: None,
            suspended: None,
            dashboard_url: None,
            url: None,
            region: None,
            plan: None,
            env: None,
            image_path: None,
            owner_id: None,
            account_id: "acc_1".to_string(),
            account_name: "main".to_string(),
        }
    }

    async fn seed(cache: &ServiceCache, kv: &MemoryKv, account_id: &str, age_ms: i64) {
        let stored = StoredServices {
            services: vec![summary("srv-1")],
            cached_at: chrono::Utc::now().timestamp_millis() - age_ms,
        };
        kv.put(
            &cache.key(account_id),
            &serde_json::to_string(&stored).unwrap(),
            None,
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn classifies_entries_at_ttl_boundaries() {
        let kv = Arc::new(MemoryKv::new());
        let cfg = test_cfg();
        let cache = ServiceCache::new(kv.clone(), cfg.clone());

        // Ages straddling each boundary. The classification is strict:
        // fresh iff age < soft, stale iff soft <= age < hard.
        let cases = [
            (0, Some(CacheTier::Fresh)),
            (cfg.soft_ttl_ms - 1000, Some(CacheTier::Fresh)),
            (cfg.soft_ttl_ms, Some(CacheTier::Stale)),
            (cfg.hard_ttl_ms - 1000, Some(CacheTier::Stale)),
            (cfg.hard_ttl_ms, None),
            (cfg.hard_ttl_ms + 1000, None),
        ];

        for (age, expected) in cases {
            seed(&cache, &kv, "acc_1", age).await;
            let got = cache.get("acc_1").await;
            assert_eq!(got.as_ref().map(|c| c.tier), expected, "age {}ms", age);
            if let Some(cached) = got {
                assert_eq!(cached.services.len(), 1);
            }
        }
    }

    #[tokio::test]
    async fn get_is_idempotent_without_writes() {
        let kv = Arc::new(MemoryKv::new());
        let cache = ServiceCache::new(kv, test_cfg());
        cache.set("acc_1", &[summary("srv-1")]).await;

        let first = cache.get("acc_1").await.unwrap();
        let second = cache.get("acc_1").await.unwrap();
        assert_eq!(first.cached_at, second.cached_at);
        assert_eq!(first.services, second.services);
    }

    #[tokio::test]
    async fn invalidate_then_get_misses() {
        let kv = Arc::new(MemoryKv::new());
        let cache = ServiceCache::new(kv, test_cfg());
        cache.set("acc_1", &[summary("srv-1")]).await;
        assert!(cache.get("acc_1").await.is_some());

        cache.invalidate("acc_1").await;
        assert!(cache.get("acc_1").await.is_none());
    }

    #[tokio::test]
    async fn version_bump_orphans_old_entries() {
        let kv = Arc::new(MemoryKv::new());
        let cache_v1 = ServiceCache::new(kv.clone(), test_cfg());
        cache_v1.set("acc_1", &[summary("srv-1")]).await;

        let mut cfg = test_cfg();
        cfg.version = "v2".to_string();
        let cache_v2 = ServiceCache::new(kv, cfg);
        assert!(cache_v2.get("acc_1").await.is_none());
    }

    #[tokio::test]
    async fn store_failures_degrade_to_miss() {
        let cache = ServiceCache::new(Arc::new(FailingKv), test_cfg());
        assert!(cache.get("acc_1").await.is_none());
        // Writes and invalidations are dropped silently.
        cache.set("acc_1", &[summary("srv-1")]).await;
        cache.invalidate("acc_1").await;
    }
}
