//! Client for the upstream deployment platform API.
//!
//! Every call is bounded by a per-request timeout and retried on 429,
//! 5xx and timeouts with a bounded attempt budget. List endpoints use
//! cursor pagination with a cycle guard.

use crate::config::UpstreamConfig;
use crate::models::{Account, OwnerInfo, ServiceSummary};
use crate::services::error::ServiceError;
use reqwest::{header, Client, Method, StatusCode};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::time::Duration;

#[derive(Clone)]
pub struct PlatformClient {
    http: Client,
    cfg: UpstreamConfig,
}

impl PlatformClient {
    pub fn new(cfg: UpstreamConfig) -> Self {
        Self {
            http: Client::new(),
            cfg,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.cfg.base_url
    }

    /// Issue one request with the retry policy applied.
    ///
    /// 429 and 5xx are retried; the response body is drained first so
    /// the connection can be reused. A `Retry-After` header wins over
    /// the computed linear backoff. 204 and empty bodies map to `None`.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        api_key: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Option<Value>, ServiceError> {
        let url = format!("{}{}", self.cfg.base_url, path);

        for attempt in 1..=self.cfg.max_attempts {
            let mut req = self
                .http
                .request(method.clone(), &url)
                .timeout(Duration::from_millis(self.cfg.timeout_ms))
                .header(header::ACCEPT, "application/json")
                .bearer_auth(api_key);
            if !query.is_empty() {
                req = req.query(query);
            }
            if let Some(body) = body {
                req = req.json(body);
            }

            match req.send().await {
                Ok(response) => {
                    let status = response.status();

                    let retryable =
                        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
                    if retryable && attempt < self.cfg.max_attempts {
                        let delay = self.retry_delay(&response, attempt);
                        // Drain before dropping so the connection goes
                        // back to the pool in a reusable state.
                        let _ = response.text().await;
                        tracing::debug!(
                            %url,
                            status = status.as_u16(),
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "retrying upstream request"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    if !status.is_success() {
                        let body = response.text().await.unwrap_or_default();
                        return Err(ServiceError::Upstream {
                            status: status.as_u16(),
                            body,
                        });
                    }

                    if status == StatusCode::NO_CONTENT {
                        return Ok(None);
                    }

                    let text = response.text().await?;
                    if text.trim().is_empty() {
                        return Ok(None);
                    }

                    return serde_json::from_str(&text)
                        .map(Some)
                        .map_err(|e| ServiceError::MalformedPayload(e.to_string()));
                }
                Err(err) if err.is_timeout() => {
                    if attempt < self.cfg.max_attempts {
                        let delay =
                            Duration::from_millis(self.cfg.retry_base_ms * attempt as u64);
                        tracing::debug!(%url, attempt, "upstream request timed out, retrying");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(ServiceError::RetriesExhausted {
                        attempts: self.cfg.max_attempts,
                    });
                }
                Err(err) => return Err(ServiceError::Transport(err)),
            }
        }

        Err(ServiceError::RetriesExhausted {
            attempts: self.cfg.max_attempts,
        })
    }

    fn retry_delay(&self, response: &reqwest::Response, attempt: u32) -> Duration {
        if let Some(retry_after) = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
        {
            return Duration::from_secs_f64(retry_after);
        }
        Duration::from_millis(self.cfg.retry_base_ms * attempt as u64)
    }

    /// Walk a cursor-paginated listing to the end.
    ///
    /// Stops on an empty page, a page without a trailing cursor, or a
    /// cursor already seen (guards against a looping upstream).
    pub async fn paginate(
        &self,
        path: &str,
        api_key: &str,
        extra: &[(&str, String)],
    ) -> Result<Vec<Value>, ServiceError> {
        let mut all_items = Vec::new();
        let mut seen_cursors: HashSet<String> = HashSet::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut query: Vec<(&str, String)> =
                vec![("limit", self.cfg.page_limit.to_string())];
            query.extend(extra.iter().map(|(k, v)| (*k, v.clone())));
            if let Some(c) = &cursor {
                query.push(("cursor", c.clone()));
            }

            let page = match self
                .request(Method::GET, path, api_key, &query, None)
                .await?
            {
                Some(page) => page,
                None => break,
            };

            let items = page.as_array().ok_or_else(|| {
                ServiceError::MalformedPayload("expected an array page".to_string())
            })?;
            if items.is_empty() {
                break;
            }

            all_items.extend(items.iter().cloned());

            let next_cursor = items
                .last()
                .and_then(|item| item.get("cursor"))
                .and_then(Value::as_str)
                .map(str::to_string);

            match next_cursor {
                Some(next) if seen_cursors.insert(next.clone()) => cursor = Some(next),
                _ => break,
            }
        }

        Ok(all_items)
    }

    /// Full service listing for one account, trimmed to summaries.
    pub async fn list_services(
        &self,
        account: &Account,
    ) -> Result<Vec<ServiceSummary>, ServiceError> {
        let items = self
            .paginate(
                "/services",
                &account.api_key,
                &[("includePreviews", "true".to_string())],
            )
            .await?;

        Ok(items
            .iter()
            .filter_map(ServiceSummary::from_page_item)
            .collect())
    }

    pub async fn trigger_deploy(
        &self,
        account: &Account,
        service_id: &str,
    ) -> Result<Option<Value>, ServiceError> {
        self.request(
            Method::POST,
            &format!("/services/{}/deploys", encode(service_id)),
            &account.api_key,
            &[],
            Some(&json!({"clearCache": "do_not_clear"})),
        )
        .await
    }

    pub async fn get_events(
        &self,
        account: &Account,
        service_id: &str,
        limit: i64,
    ) -> Result<Option<Value>, ServiceError> {
        self.request(
            Method::GET,
            &format!("/services/{}/events", encode(service_id)),
            &account.api_key,
            &[("limit", limit.to_string())],
            None,
        )
        .await
    }

    pub async fn get_env_vars(
        &self,
        account: &Account,
        service_id: &str,
    ) -> Result<Vec<Value>, ServiceError> {
        self.paginate(
            &format!("/services/{}/env-vars", encode(service_id)),
            &account.api_key,
            &[],
        )
        .await
    }

    pub async fn replace_env_vars(
        &self,
        account: &Account,
        service_id: &str,
        env_vars: &Value,
    ) -> Result<Option<Value>, ServiceError> {
        self.request(
            Method::PUT,
            &format!("/services/{}/env-vars", encode(service_id)),
            &account.api_key,
            &[],
            Some(env_vars),
        )
        .await
    }

    pub async fn upsert_env_var(
        &self,
        account: &Account,
        service_id: &str,
        key: &str,
        value: &str,
    ) -> Result<Option<Value>, ServiceError> {
        self.request(
            Method::PUT,
            &format!("/services/{}/env-vars/{}", encode(service_id), encode(key)),
            &account.api_key,
            &[],
            Some(&json!({"value": value})),
        )
        .await
    }

    pub async fn delete_env_var(
        &self,
        account: &Account,
        service_id: &str,
        key: &str,
    ) -> Result<(), ServiceError> {
        self.request(
            Method::DELETE,
            &format!("/services/{}/env-vars/{}", encode(service_id), encode(key)),
            &account.api_key,
            &[],
            None,
        )
        .await?;
        Ok(())
    }

    pub async fn get_service(
        &self,
        account: &Account,
        service_id: &str,
    ) -> Result<Option<Value>, ServiceError> {
        self.request(
            Method::GET,
            &format!("/services/{}", encode(service_id)),
            &account.api_key,
            &[],
            None,
        )
        .await
    }

    pub async fn suspend_service(
        &self,
        account: &Account,
        service_id: &str,
    ) -> Result<Option<Value>, ServiceError> {
        self.service_action(account, service_id, "suspend").await
    }

    pub async fn resume_service(
        &self,
        account: &Account,
        service_id: &str,
    ) -> Result<Option<Value>, ServiceError> {
        self.service_action(account, service_id, "resume").await
    }

    pub async fn restart_service(
        &self,
        account: &Account,
        service_id: &str,
    ) -> Result<Option<Value>, ServiceError> {
        self.service_action(account, service_id, "restart").await
    }

    async fn service_action(
        &self,
        account: &Account,
        service_id: &str,
        action: &str,
    ) -> Result<Option<Value>, ServiceError> {
        self.request(
            Method::POST,
            &format!("/services/{}/{}", encode(service_id), action),
            &account.api_key,
            &[],
            None,
        )
        .await
    }

    pub async fn get_deploys(
        &self,
        account: &Account,
        service_id: &str,
        limit: i64,
    ) -> Result<Option<Value>, ServiceError> {
        self.request(
            Method::GET,
            &format!("/services/{}/deploys", encode(service_id)),
            &account.api_key,
            &[("limit", limit.to_string())],
            None,
        )
        .await
    }

    pub async fn cancel_deploy(
        &self,
        account: &Account,
        deploy_id: &str,
    ) -> Result<Option<Value>, ServiceError> {
        self.request(
            Method::POST,
            &format!("/deploys/{}/cancel", encode(deploy_id)),
            &account.api_key,
            &[],
            None,
        )
        .await
    }

    pub async fn rollback_deploy(
        &self,
        account: &Account,
        deploy_id: &str,
    ) -> Result<Option<Value>, ServiceError> {
        self.request(
            Method::POST,
            &format!("/deploys/{}/rollback", encode(deploy_id)),
            &account.api_key,
            &[],
            None,
        )
        .await
    }

    pub async fn get_instances(
        &self,
        account: &Account,
        service_id: &str,
    ) -> Result<Option<Value>, ServiceError> {
        self.request(
            Method::GET,
            &format!("/services/{}/instances", encode(service_id)),
            &account.api_key,
            &[],
            None,
        )
        .await
    }

    pub async fn get_logs(
        &self,
        account: &Account,
        service_id: &str,
        limit: i64,
        start_time: Option<&str>,
        end_time: Option<&str>,
    ) -> Result<Option<Value>, ServiceError> {
        let owner_id = account.owner_id.clone().ok_or_else(|| {
            ServiceError::Validation("account has no ownerId; re-test its API key".to_string())
        })?;

        let mut query: Vec<(&str, String)> = vec![
            ("ownerId", owner_id),
            ("resource", service_id.to_string()),
            ("direction", "backward".to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(start) = start_time {
            query.push(("startTime", start.to_string()));
        }
        if let Some(end) = end_time {
            query.push(("endTime", end.to_string()));
        }

        self.request(Method::GET, "/logs", &account.api_key, &query, None)
            .await
    }

    pub async fn scale_service(
        &self,
        account: &Account,
        service_id: &str,
        num_instances: i64,
    ) -> Result<Option<Value>, ServiceError> {
        self.request(
            Method::POST,
            &format!("/services/{}/scale", encode(service_id)),
            &account.api_key,
            &[],
            Some(&json!({"numInstances": num_instances})),
        )
        .await
    }

    /// Probe the owners endpoint to check that a key works, and learn
    /// whose it is.
    pub async fn validate_api_key(&self, api_key: &str) -> Result<OwnerInfo, ServiceError> {
        let data = self
            .request(
                Method::GET,
                "/owners",
                api_key,
                &[("limit", "1".to_string())],
                None,
            )
            .await?;

        let owners = data
            .as_ref()
            .and_then(Value::as_array)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| {
                ServiceError::MalformedPayload("owners probe returned no entries".to_string())
            })?;

        let owner = owners[0].get("owner").ok_or_else(|| {
            ServiceError::MalformedPayload("owners entry missing owner field".to_string())
        })?;

        let id = owner.get("id").and_then(Value::as_str);
        let email = owner.get("email").and_then(Value::as_str);
        let (id, email) = match (id, email) {
            (Some(id), Some(email)) => (id, email),
            _ => {
                return Err(ServiceError::MalformedPayload(
                    "owner entry missing id or email".to_string(),
                ))
            }
        };

        Ok(OwnerInfo {
            owner_id: id.to_string(),
            owner_email: email.to_string(),
            owner_name: owner
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or(email)
                .to_string(),
            owner_type: owner
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("user")
                .to_string(),
        })
    }
}

fn encode(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}
