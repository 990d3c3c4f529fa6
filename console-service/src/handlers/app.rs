use axum::{extract::State, Json};
use console_core::error::AppError;
use console_core::kv::KvStore;
use serde_json::{json, Value};

use crate::AppState;

/// Liveness plus a KV round-trip; degraded when the store is down.
pub async fn health(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let kv_healthy = state.kv.health_check().await.is_ok();
    Ok(Json(json!({
        "status": if kv_healthy { "healthy" } else { "degraded" },
        "service": state.config.service_name,
        "kv": if kv_healthy { "up" } else { "down" },
    })))
}
