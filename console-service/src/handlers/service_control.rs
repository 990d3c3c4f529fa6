//! Per-service lifecycle operations: detail view, suspend/resume/
//! restart, and deploy management. Every mutation invalidates the
//! owning account's cache entry.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use console_core::error::AppError;
use console_core::utils::clamp_limit;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    #[serde(default)]
    pub limit: Option<String>,
}

pub async fn get_service(
    State(state): State<AppState>,
    Path((account, service_id)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    let account = state.accounts.require(&account).await?;
    let detail = state.platform.get_service(&account, &service_id).await?;
    Ok(Json(json!({"service": detail})))
}

pub async fn suspend_service(
    State(state): State<AppState>,
    Path((account, service_id)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    let account = state.accounts.require(&account).await?;
    state.platform.suspend_service(&account, &service_id).await?;
    state.catalog.cache().invalidate(&account.id).await;
    Ok(Json(json!({"success": true})))
}

pub async fn resume_service(
    State(state): State<AppState>,
    Path((account, service_id)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    let account = state.accounts.require(&account).await?;
    state.platform.resume_service(&account, &service_id).await?;
    state.catalog.cache().invalidate(&account.id).await;
    Ok(Json(json!({"success": true})))
}

pub async fn restart_service(
    State(state): State<AppState>,
    Path((account, service_id)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    let account = state.accounts.require(&account).await?;
    state.platform.restart_service(&account, &service_id).await?;
    state.catalog.cache().invalidate(&account.id).await;
    Ok(Json(json!({"success": true})))
}

pub async fn list_deploys(
    State(state): State<AppState>,
    Path((account, service_id)): Path<(String, String)>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Value>, AppError> {
    let account = state.accounts.require(&account).await?;
    let limit = clamp_limit(query.limit.as_deref(), 20, 1, 100);
    let deploys = state
        .platform
        .get_deploys(&account, &service_id, limit)
        .await?;
    Ok(Json(json!({"deploys": deploys})))
}

pub async fn cancel_deploy(
    State(state): State<AppState>,
    Path((account, deploy_id)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    let account = state.accounts.require(&account).await?;
    let result = state.platform.cancel_deploy(&account, &deploy_id).await?;
    state.catalog.cache().invalidate(&account.id).await;
    Ok(Json(json!({"success": true, "deploy": result})))
}

pub async fn rollback_deploy(
    State(state): State<AppState>,
    Path((account, deploy_id)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    let account = state.accounts.require(&account).await?;
    let result = state.platform.rollback_deploy(&account, &deploy_id).await?;
    state.catalog.cache().invalidate(&account.id).await;
    Ok(Json(json!({"success": true, "deploy": result})))
}
