//! Account registry management. API keys never leave the server in
//! full; listings carry a masked preview only.

use axum::{
    extract::{Path, State},
    Json,
};
use console_core::error::AppError;
use console_core::utils::secret_preview;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::models::Account;
use crate::AppState;

const KEY_PREVIEW_MIN_LEN: usize = 12;
const API_KEY_MIN_LEN: usize = 12;

fn validate_api_key_shape(api_key: &str) -> Result<(), AppError> {
    if api_key.chars().count() < API_KEY_MIN_LEN {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "apiKey must be at least {} characters",
            API_KEY_MIN_LEN
        )));
    }
    Ok(())
}

fn masked(account: &Account) -> Value {
    json!({
        "id": account.id,
        "name": account.name,
        "apiKeyPreview": secret_preview(&account.api_key, KEY_PREVIEW_MIN_LEN),
        "ownerId": account.owner_id,
        "ownerEmail": account.owner_email,
        "createdAt": account.created_at,
    })
}

pub async fn list_accounts(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let accounts = state.accounts.list().await;
    let masked: Vec<Value> = accounts.iter().map(masked).collect();
    Ok(Json(json!({"accounts": masked})))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    pub name: String,
    pub api_key: String,
}

/// Adding an account always probes the key against the upstream
/// owners endpoint; the owner identity is derived server-side, never
/// taken from the client. A key that fails the probe is not stored.
pub async fn create_account(
    State(state): State<AppState>,
    Json(request): Json<CreateAccountRequest>,
) -> Result<Json<Value>, AppError> {
    let name = request.name.trim();
    let api_key = request.api_key.trim();
    if name.is_empty() || api_key.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "name and apiKey are required"
        )));
    }
    validate_api_key_shape(api_key)?;

    let owner = state.platform.validate_api_key(api_key).await?;
    let account = state
        .accounts
        .add(
            name,
            api_key,
            Some(owner.owner_id),
            Some(owner.owner_email),
        )
        .await?;
    Ok(Json(json!({"success": true, "account": masked(&account)})))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestKeyRequest {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
}

/// Probe a key against the upstream owners endpoint. Accepts either a
/// raw key (pre-save check) or an existing account id.
pub async fn test_account_key(
    State(state): State<AppState>,
    Json(request): Json<TestKeyRequest>,
) -> Result<Json<Value>, AppError> {
    let api_key = match (request.api_key, request.account_id) {
        (Some(key), _) if !key.trim().is_empty() => key.trim().to_string(),
        (_, Some(account_id)) => state.accounts.require(&account_id).await?.api_key,
        _ => {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "apiKey or accountId is required"
            )))
        }
    };

    let owner = state.platform.validate_api_key(&api_key).await?;
    Ok(Json(json!({"valid": true, "owner": owner})))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// A key change is re-probed upstream and the stored owner identity
/// follows the new key; a rename alone leaves the owner untouched.
pub async fn update_account(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
    Json(request): Json<UpdateAccountRequest>,
) -> Result<Json<Value>, AppError> {
    let api_key = request.api_key.as_deref().map(str::trim);
    let mut owner_id = None;
    let mut owner_email = None;
    if let Some(api_key) = api_key {
        validate_api_key_shape(api_key)?;
        let owner = state.platform.validate_api_key(api_key).await?;
        owner_id = Some(owner.owner_id);
        owner_email = Some(owner.owner_email);
    }

    let account = state
        .accounts
        .update(
            &account_id,
            request.name.as_deref(),
            api_key,
            owner_id,
            owner_email,
        )
        .await?;

    // A key change can alter what the account is allowed to see.
    state.catalog.cache().invalidate(&account.id).await;

    Ok(Json(json!({"success": true, "account": masked(&account)})))
}

pub async fn delete_account(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let removed = state.accounts.remove(&account_id).await?;
    state.catalog.cache().invalidate(&removed.id).await;
    Ok(Json(json!({"success": true})))
}
