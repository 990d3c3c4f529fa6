//! Login, logout and CSRF token issuance.

use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Form, Json,
};
use axum_extra::extract::CookieJar;
use console_core::error::AppError;
use console_core::utils::{generate_token, timing_safe_eq};
use serde::Deserialize;
use serde_json::json;

use crate::cookies;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Best-effort client address for the lockout dimensions. Proxied
/// deployments surface the real address in these headers; without
/// them every client shares the "unknown" bucket.
fn client_ip(headers: &HeaderMap) -> String {
    if let Some(ip) = headers
        .get("cf-connecting-ip")
        .and_then(|v| v.to_str().ok())
    {
        return ip.to_string();
    }
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let ip = client_ip(&headers);

    let status = state.lockout.check(&ip, &form.username).await;
    if status.locked {
        let retry_after = status.retry_after_seconds();
        return Err(AppError::TooManyRequests(
            "Too many failed login attempts; try again later".to_string(),
            Some(retry_after),
        ));
    }

    // Both comparisons always run so the two failure cases are not
    // distinguishable by timing.
    let username_ok = timing_safe_eq(&form.username, &state.config.admin.username);
    let password_ok = timing_safe_eq(&form.password, &state.config.admin.password);
    if !(username_ok & password_ok) {
        state.lockout.record_failure(&ip, &form.username).await;
        tracing::warn!(ip = %ip, "failed login attempt");
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Invalid username or password"
        )));
    }

    state.lockout.clear(&ip, &form.username).await;
    let session_id = state.sessions.create(&form.username).await?;
    tracing::info!(principal = %form.username, "login succeeded");

    let cookie = cookies::session_cookie(
        &session_id,
        state.sessions.cookie_max_age(),
        state.secure_cookies(),
    );
    let mut response = Json(json!({"success": true})).into_response();
    response.headers_mut().append(
        SET_COOKIE,
        HeaderValue::from_str(&cookie)
            .map_err(|e| AppError::InternalError(anyhow::Error::new(e)))?,
    );
    Ok(response)
}

pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    if let Some(cookie) = jar.get(cookies::SESSION_COOKIE) {
        state.sessions.destroy(cookie.value()).await;
    }

    let secure = state.secure_cookies();
    let mut response = Json(json!({"success": true})).into_response();
    for cookie in [
        cookies::clear_session_cookie(secure),
        cookies::clear_csrf_cookie(secure),
    ] {
        response.headers_mut().append(
            SET_COOKIE,
            HeaderValue::from_str(&cookie)
                .map_err(|e| AppError::InternalError(anyhow::Error::new(e)))?,
        );
    }
    Ok(response)
}

/// Hand out the double-submit token. An existing cookie is reused so
/// parallel tabs do not invalidate each other.
pub async fn csrf_token(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    if let Some(cookie) = jar.get(cookies::CSRF_COOKIE) {
        let token = cookie.value().to_string();
        return Ok(Json(json!({"token": token})).into_response());
    }

    let token = generate_token(32);
    let cookie = cookies::csrf_cookie(
        &token,
        state.sessions.cookie_max_age(),
        state.secure_cookies(),
    );
    let mut response = Json(json!({"token": token})).into_response();
    response.headers_mut().append(
        SET_COOKIE,
        HeaderValue::from_str(&cookie)
            .map_err(|e| AppError::InternalError(anyhow::Error::new(e)))?,
    );
    Ok(response)
}
