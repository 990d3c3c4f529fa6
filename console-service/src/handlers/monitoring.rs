//! Read-side monitoring (instances, logs, events) and scaling.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use console_core::error::AppError;
use console_core::utils::clamp_limit;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::AppState;

pub async fn get_instances(
    State(state): State<AppState>,
    Path((account, service_id)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    let account = state.accounts.require(&account).await?;
    let instances = state.platform.get_instances(&account, &service_id).await?;
    Ok(Json(json!({"instances": instances})))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsQuery {
    #[serde(default)]
    pub limit: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
}

pub async fn get_logs(
    State(state): State<AppState>,
    Path((account, service_id)): Path<(String, String)>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Value>, AppError> {
    let account = state.accounts.require(&account).await?;
    let limit = clamp_limit(query.limit.as_deref(), 100, 1, 1000);
    let logs = state
        .platform
        .get_logs(
            &account,
            &service_id,
            limit,
            query.start_time.as_deref(),
            query.end_time.as_deref(),
        )
        .await?;
    Ok(Json(json!({"logs": logs})))
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub limit: Option<String>,
}

pub async fn get_events(
    State(state): State<AppState>,
    Path((account, service_id)): Path<(String, String)>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Value>, AppError> {
    let account = state.accounts.require(&account).await?;
    let limit = clamp_limit(query.limit.as_deref(), 50, 1, 100);
    let events = state
        .platform
        .get_events(&account, &service_id, limit)
        .await?;
    Ok(Json(json!({"events": events})))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleRequest {
    pub num_instances: i64,
}

pub async fn scale_service(
    State(state): State<AppState>,
    Path((account, service_id)): Path<(String, String)>,
    Json(request): Json<ScaleRequest>,
) -> Result<Json<Value>, AppError> {
    if !(1..=100).contains(&request.num_instances) {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "numInstances must be between 1 and 100"
        )));
    }

    let account = state.accounts.require(&account).await?;
    let result = state
        .platform
        .scale_service(&account, &service_id, request.num_instances)
        .await?;
    state.catalog.cache().invalidate(&account.id).await;
    Ok(Json(json!({"success": true, "result": result})))
}
