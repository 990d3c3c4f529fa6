//! Fetch policy over the tiered cache.
//!
//! Fresh entries are served as-is; stale entries are served and
//! refreshed in the background; misses force a synchronous refresh.
//! Multi-account aggregation never lets one account's failure abort
//! the others, and reports the oldest cached_at among the data it
//! actually used.

use crate::models::{Account, ServiceSummary};
use crate::services::cache::{CacheTier, ServiceCache};
use crate::services::error::ServiceError;
use crate::services::platform::PlatformClient;
use futures::future::join_all;
use std::sync::Arc;

#[derive(Debug)]
pub struct AggregatedServices {
    pub services: Vec<ServiceSummary>,
    /// Oldest cached_at among the per-account results used, or None
    /// when no account produced data.
    pub cached_at: Option<i64>,
    /// Accounts whose synchronous refresh failed this round.
    pub failed_accounts: Vec<String>,
}

#[derive(Clone)]
pub struct ServiceCatalog {
    platform: Arc<PlatformClient>,
    cache: ServiceCache,
}

impl ServiceCatalog {
    pub fn new(platform: Arc<PlatformClient>, cache: ServiceCache) -> Self {
        Self { platform, cache }
    }

    pub fn cache(&self) -> &ServiceCache {
        &self.cache
    }

    /// Fetch one account's services from upstream, attribute them, and
    /// overwrite the cache entry.
    pub async fn refresh_account(
        &self,
        account: &Account,
    ) -> Result<Vec<ServiceSummary>, ServiceError> {
        let mut services = self.platform.list_services(account).await?;
        for service in &mut services {
            service.account_id = account.id.clone();
            service.account_name = account.name.clone();
        }
        self.cache.set(&account.id, &services).await;
        Ok(services)
    }

    /// Any cached tier is good enough here (keep-alive path); only a
    /// miss goes upstream.
    pub async fn cached_or_fetch(
        &self,
        account: &Account,
    ) -> Result<Vec<ServiceSummary>, ServiceError> {
        if let Some(cached) = self.cache.get(&account.id).await {
            return Ok(cached.services);
        }
        self.refresh_account(account).await
    }

    /// Serve the merged listing for all accounts.
    pub async fn aggregate(&self, accounts: &[Account], force_refresh: bool) -> AggregatedServices {
        let mut services = Vec::new();
        let mut cache_times = Vec::new();
        let mut failed_accounts = Vec::new();
        let mut needs_sync: Vec<Account> = Vec::new();

        if force_refresh {
            needs_sync.extend_from_slice(accounts);
        } else {
            for (account, cached) in self.cache.get_all(accounts).await {
                match cached {
                    None => needs_sync.push(account),
                    Some(cached) => {
                        if cached.tier == CacheTier::Stale {
                            self.spawn_background_refresh(account);
                        }
                        cache_times.push(cached.cached_at);
                        services.extend(cached.services);
                    }
                }
            }
        }

        if !needs_sync.is_empty() {
            let now = chrono::Utc::now().timestamp_millis();
            let results = join_all(
                needs_sync
                    .iter()
                    .map(|account| self.refresh_account(account)),
            )
            .await;

            for (account, result) in needs_sync.iter().zip(results) {
                match result {
                    Ok(fetched) => {
                        services.extend(fetched);
                        cache_times.push(now);
                    }
                    Err(e) => {
                        tracing::error!(account = %account.name, error = %e, "account refresh failed");
                        failed_accounts.push(account.name.clone());
                    }
                }
            }
        }

        sort_services(&mut services);

        AggregatedServices {
            services,
            cached_at: cache_times.into_iter().min(),
            failed_accounts,
        }
    }

    /// Fire-and-forget refresh; the caller's response has already
    /// committed to the stale data it holds.
    fn spawn_background_refresh(&self, account: Account) {
        let catalog = self.clone();
        tokio::spawn(async move {
            if let Err(e) = catalog.refresh_account(&account).await {
                tracing::warn!(account = %account.name, error = %e, "background refresh failed");
            }
        });
    }
}

/// Deterministic display order: account name, then service name (both
/// case-insensitive), then service id.
fn sort_services(services: &mut [ServiceSummary]) {
    services.sort_by(|a, b| {
        (
            a.account_name.to_lowercase(),
            a.name.to_lowercase(),
            &a.id,
        )
            .cmp(&(
                b.account_name.to_lowercase(),
                b.name.to_lowercase(),
                &b.id,
            ))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(account: &str, name: &str, id: &str) -> ServiceSummary {
        ServiceSummary {
            id: id.to_string(),
            name: name.to_string(),
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
            account_id: account.to_lowercase(),
            account_name: account.to_string(),
        }
    }

    #[test]
    fn sort_is_stable_and_case_insensitive() {
        let mut services = vec![
            summary("beta", "Zeta", "srv-3"),
            summary("Alpha", "api", "srv-2"),
            summary("alpha", "API", "srv-1"),
        ];
        sort_services(&mut services);
        let ids: Vec<_> = services.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["srv-1", "srv-2", "srv-3"]);

        // Re-sorting changes nothing.
        let before = services.clone();
        sort_services(&mut services);
        assert_eq!(before, services);
    }
}
