//! Double-submit CSRF guard for mutating requests.
//!
//! Two independent checks: the Origin (or Referer) header must match
//! the request host when present, and the token in the csrf cookie
//! must equal the token supplied in the `X-CSRF-Token` header or, for
//! form posts, the `csrf_token` body field. Safe methods pass through
//! untouched.

use axum::{
    body::Body,
    extract::Request,
    http::{header, Method},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use console_core::error::AppError;
use console_core::utils::timing_safe_eq;
use http_body_util::BodyExt;

use crate::cookies;

pub const CSRF_HEADER: &str = "x-csrf-token";
const CSRF_FIELD: &str = "csrf_token";

pub async fn csrf_middleware(
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !is_mutating(request.method()) {
        return Ok(next.run(request).await);
    }

    if !origin_matches_host(&request) {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Cross-origin request rejected"
        )));
    }

    let cookie_token = jar
        .get(cookies::CSRF_COOKIE)
        .map(|cookie| cookie.value().to_string());

    let (request, submitted_token) = extract_submitted_token(request).await?;

    match (cookie_token, submitted_token) {
        (Some(expected), Some(submitted)) if timing_safe_eq(&expected, &submitted) => {
            Ok(next.run(request).await)
        }
        _ => Err(AppError::Forbidden(anyhow::anyhow!(
            "CSRF validation failed"
        ))),
    }
}

fn is_mutating(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// A present Origin or Referer must name the same authority the
/// request was sent to. Absent headers (non-browser clients) pass;
/// the token check still stands between them and a state change.
fn origin_matches_host(request: &Request) -> bool {
    let Some(host) = header_str(request, header::HOST) else {
        return false;
    };
    let host = host.to_ascii_lowercase();

    if let Some(origin) = header_str(request, header::ORIGIN) {
        if origin != "null" {
            return url_authority(origin).as_deref() == Some(host.as_str());
        }
        // "null" origins (sandboxed frames, some redirects) carry no
        // useful information; fall through to the Referer, if any.
    }

    if let Some(referer) = header_str(request, header::REFERER) {
        return url_authority(referer).as_deref() == Some(host.as_str());
    }

    true
}

fn header_str(request: &Request, name: header::HeaderName) -> Option<&str> {
    request.headers().get(name)?.to_str().ok()
}

fn url_authority(url: &str) -> Option<String> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))?;
    let authority = rest.split('/').next()?;
    if authority.is_empty() {
        None
    } else {
        Some(authority.to_ascii_lowercase())
    }
}

/// Pull the submitted token out of the header or, for urlencoded form
/// posts, out of the body. Reading the body consumes it, so the
/// request is rebuilt from the buffered bytes before moving on.
async fn extract_submitted_token(
    request: Request,
) -> Result<(Request, Option<String>), AppError> {
    if let Some(token) = request
        .headers()
        .get(CSRF_HEADER)
        .and_then(|value| value.to_str().ok())
    {
        let token = token.to_string();
        return Ok((request, Some(token)));
    }

    let is_form = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false);
    if !is_form {
        return Ok((request, None));
    }

    let (parts, body) = request.into_parts();
    let bytes = body
        .collect()
        .await
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("failed to read request body: {e}")))?
        .to_bytes();

    let token = serde_urlencoded::from_bytes::<Vec<(String, String)>>(&bytes)
        .ok()
        .and_then(|fields| {
            fields
                .into_iter()
                .find(|(name, _)| name == CSRF_FIELD)
                .map(|(_, value)| value)
        });

    Ok((Request::from_parts(parts, Body::from(bytes)), token))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with_headers(pairs: &[(&str, &str)]) -> Request {
        let mut builder = Request::builder().method(Method::POST).uri("/api/deploy");
        for (name, value) in pairs {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn safe_methods_are_not_mutating() {
        assert!(!is_mutating(&Method::GET));
        assert!(!is_mutating(&Method::HEAD));
        assert!(!is_mutating(&Method::OPTIONS));
        assert!(is_mutating(&Method::POST));
        assert!(is_mutating(&Method::DELETE));
    }

    #[test]
    fn matching_origin_passes() {
        let request = request_with_headers(&[
            ("host", "console.example.com"),
            ("origin", "https://console.example.com"),
        ]);
        assert!(origin_matches_host(&request));
    }

    #[test]
    fn foreign_origin_is_rejected() {
        let request = request_with_headers(&[
            ("host", "console.example.com"),
            ("origin", "https://evil.example.net"),
        ]);
        assert!(!origin_matches_host(&request));
    }

    #[test]
    fn referer_is_checked_when_origin_is_absent() {
        let request = request_with_headers(&[
            ("host", "console.example.com"),
            ("referer", "https://evil.example.net/login"),
        ]);
        assert!(!origin_matches_host(&request));

        let request = request_with_headers(&[
            ("host", "console.example.com"),
            ("referer", "https://console.example.com/login"),
        ]);
        assert!(origin_matches_host(&request));
    }

    #[test]
    fn headerless_requests_pass_the_origin_check() {
        let request = request_with_headers(&[("host", "console.example.com")]);
        assert!(origin_matches_host(&request));
    }

    #[tokio::test]
    async fn token_is_read_from_the_header_first() {
        let request = request_with_headers(&[
            ("host", "console.example.com"),
            ("x-csrf-token", "abc123"),
        ]);
        let (_, token) = extract_submitted_token(request).await.unwrap();
        assert_eq!(token.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn form_body_token_survives_the_rebuild() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/login")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("username=admin&csrf_token=tok42&password=pw"))
            .unwrap();

        let (request, token) = extract_submitted_token(request).await.unwrap();
        assert_eq!(token.as_deref(), Some("tok42"));

        // The handler downstream still sees the full body.
        let bytes = request.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"username=admin&csrf_token=tok42&password=pw");
    }
}
