//! Aggregated service listing and deploy trigger.

use axum::{
    extract::{Query, State},
    Json,
};
use console_core::error::AppError;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub refresh: Option<String>,
}

/// Merged listing across all accounts. `?refresh=true` bypasses the
/// cache entirely; otherwise fresh entries are served as-is and stale
/// ones are served while a background refresh runs.
pub async fn list_services(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, AppError> {
    let accounts = state.accounts.list().await;
    let force_refresh = query.refresh.as_deref() == Some("true");

    let aggregated = state.catalog.aggregate(&accounts, force_refresh).await;
    Ok(Json(json!({
        "services": aggregated.services,
        "cachedAt": aggregated.cached_at,
        "failedAccounts": aggregated.failed_accounts,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployRequest {
    pub account_id: String,
    pub service_id: String,
}

pub async fn trigger_deploy(
    State(state): State<AppState>,
    Json(request): Json<DeployRequest>,
) -> Result<Json<Value>, AppError> {
    let account = state.accounts.require(&request.account_id).await?;
    let deploy = state
        .platform
        .trigger_deploy(&account, &request.service_id)
        .await?;

    // The listing's deploy state is now outdated.
    state.catalog.cache().invalidate(&account.id).await;

    Ok(Json(json!({"success": true, "deploy": deploy})))
}
