//! Session middleware for the protected API surface.
//!
//! Every protected request verifies the session cookie with sliding
//! expiration. When the verify renewed the stored record, the matching
//! Set-Cookie rides on the response so the client's Max-Age tracks the
//! server-side expiry.

use axum::{
    extract::{Request, State},
    http::{header::SET_COOKIE, HeaderValue},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use console_core::error::AppError;

use crate::cookies;
use crate::AppState;

/// Inserted as a request extension once the session checks out.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub principal: String,
}

pub async fn session_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let session_id = jar
        .get(cookies::SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Authentication required")))?;

    let verified = state
        .sessions
        .verify(&session_id, true)
        .await
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Session expired or invalid")))?;

    request.extensions_mut().insert(CurrentUser {
        principal: verified.record.principal.clone(),
    });

    let mut response = next.run(request).await;

    if let Some(max_age) = verified.renewed_max_age {
        let cookie = cookies::session_cookie(&session_id, max_age, state.secure_cookies());
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }

    Ok(response)
}
