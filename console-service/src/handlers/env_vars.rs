//! Environment variable management for one service.

use axum::{
    extract::{Path, State},
    Json,
};
use console_core::error::AppError;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::AppState;

pub async fn get_env_vars(
    State(state): State<AppState>,
    Path((account, service_id)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    let account = state.accounts.require(&account).await?;
    let env_vars = state.platform.get_env_vars(&account, &service_id).await?;
    Ok(Json(json!({"envVars": env_vars})))
}

/// Full replacement; the upstream treats the payload as the complete
/// new set, so a partial list deletes the rest.
pub async fn replace_env_vars(
    State(state): State<AppState>,
    Path((account, service_id)): Path<(String, String)>,
    Json(env_vars): Json<Value>,
) -> Result<Json<Value>, AppError> {
    if !env_vars.is_array() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "expected an array of env vars"
        )));
    }

    let account = state.accounts.require(&account).await?;
    let result = state
        .platform
        .replace_env_vars(&account, &service_id, &env_vars)
        .await?;
    Ok(Json(json!({"success": true, "envVars": result})))
}

#[derive(Debug, Deserialize)]
pub struct EnvVarValue {
    pub value: String,
}

pub async fn upsert_env_var(
    State(state): State<AppState>,
    Path((account, service_id, key)): Path<(String, String, String)>,
    Json(body): Json<EnvVarValue>,
) -> Result<Json<Value>, AppError> {
    let account = state.accounts.require(&account).await?;
    let result = state
        .platform
        .upsert_env_var(&account, &service_id, &key, &body.value)
        .await?;
    Ok(Json(json!({"success": true, "envVar": result})))
}

pub async fn delete_env_var(
    State(state): State<AppState>,
    Path((account, service_id, key)): Path<(String, String, String)>,
) -> Result<Json<Value>, AppError> {
    let account = state.accounts.require(&account).await?;
    state
        .platform
        .delete_env_var(&account, &service_id, &key)
        .await?;
    Ok(Json(json!({"success": true})))
}
