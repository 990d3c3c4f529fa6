//! Scheduled keep-alive pings for hosted services.
//!
//! Each run loads the account registry, resolves service listings
//! through the cache (any tier is acceptable), and pings every
//! non-suspended service with a URL in concurrent batches. The run
//! carries a wall-clock budget: once it is spent, remaining batches
//! are skipped rather than started.

use crate::config::KeepAliveConfig;
use crate::models::ServiceSummary;
use crate::services::accounts::AccountStore;
use crate::services::catalog::ServiceCatalog;
use futures::future::join_all;
use reqwest::Client;
use std::time::{Duration, Instant};

const USER_AGENT: &str = "console-keepalive/1.0";

#[derive(Debug)]
pub struct PingOutcome {
    pub id: String,
    pub name: String,
    pub url: String,
    pub success: bool,
    pub status: Option<u16>,
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct KeepAlive {
    catalog: ServiceCatalog,
    accounts: AccountStore,
    http: Client,
    cfg: KeepAliveConfig,
}

impl KeepAlive {
    pub fn new(catalog: ServiceCatalog, accounts: AccountStore, cfg: KeepAliveConfig) -> Self {
        Self {
            catalog,
            accounts,
            http: Client::new(),
            cfg,
        }
    }

    /// Periodic loop, spawned from main.
    pub async fn run_scheduler(self) {
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.cfg.interval_seconds));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            self.run_once().await;
        }
    }

    pub async fn run_once(&self) {
        let started = Instant::now();
        let budget = Duration::from_millis(self.cfg.budget_ms);

        let accounts = self.accounts.list().await;
        if accounts.is_empty() {
            tracing::info!("keepalive: no accounts configured, skipping");
            return;
        }

        // Per-account failures are collected, never propagated.
        let results = join_all(
            accounts
                .iter()
                .map(|account| self.catalog.cached_or_fetch(account)),
        )
        .await;

        let mut targets: Vec<ServiceSummary> = Vec::new();
        for (account, result) in accounts.iter().zip(results) {
            match result {
                Ok(services) => targets.extend(
                    services
                        .into_iter()
                        .filter(|s| s.url.is_some() && s.suspended.as_deref() != Some("suspended")),
                ),
                Err(e) => {
                    tracing::error!(account = %account.name, error = %e, "keepalive: failed to list services");
                }
            }
        }

        if targets.is_empty() {
            tracing::info!("keepalive: no pingable services");
            return;
        }

        let mut outcomes: Vec<PingOutcome> = Vec::new();
        let mut skipped = 0usize;
        for (index, batch) in targets.chunks(self.cfg.batch_size).enumerate() {
            if started.elapsed() >= budget {
                skipped = targets.len() - outcomes.len();
                tracing::warn!(skipped, "keepalive: budget exceeded, aborting remaining batches");
                break;
            }
            if index > 0 {
                tokio::time::sleep(Duration::from_millis(self.cfg.batch_interval_ms)).await;
            }
            outcomes.extend(join_all(batch.iter().map(|s| self.ping(s))).await);
        }

        let success = outcomes.iter().filter(|o| o.success).count();
        tracing::info!(
            total = outcomes.len(),
            success,
            failed = outcomes.len() - success,
            skipped,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "keepalive: run complete"
        );
        for outcome in outcomes.iter().filter(|o| !o.success) {
            tracing::warn!(
                service = %outcome.name,
                url = %outcome.url,
                error = outcome.error.as_deref().unwrap_or("unknown"),
                "keepalive: ping failed"
            );
        }
    }

    /// One ping with a bounded retry loop and exponential backoff.
    async fn ping(&self, service: &ServiceSummary) -> PingOutcome {
        let url = service.url.clone().unwrap_or_default();
        let mut last_error = String::new();

        for attempt in 0..=self.cfg.max_retries {
            if attempt > 0 {
                let delay = self.cfg.retry_base_ms * (1u64 << (attempt - 1));
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            match self
                .http
                .get(&url)
                .timeout(Duration::from_millis(self.cfg.ping_timeout_ms))
                .header(reqwest::header::USER_AGENT, USER_AGENT)
                .send()
                .await
            {
                Ok(response) => {
                    return PingOutcome {
                        id: service.id.clone(),
                        name: service.name.clone(),
                        url,
                        success: true,
                        status: Some(response.status().as_u16()),
                        error: None,
                    };
                }
                Err(e) => last_error = e.to_string(),
            }
        }

        PingOutcome {
            id: service.id.clone(),
            name: service.name.clone(),
            url,
            success: false,
            status: None,
            error: Some(last_error),
        }
    }
}
