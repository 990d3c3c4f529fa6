#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use console_core::config as core_config;
use console_core::kv::MemoryKv;
use console_service::config::{
    AdminConfig, CacheConfig, ConsoleConfig, Environment, KeepAliveConfig, LockoutConfig,
    RedisConfig, SessionConfig, UpstreamConfig,
};
use console_service::{build_router, AppState};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "correct-horse-battery";

/// Config wired for tests: in-memory store, tiny retry delays, and an
/// upstream base pointing wherever the test says.
pub fn test_config(upstream_base: &str) -> ConsoleConfig {
    ConsoleConfig {
        common: core_config::Config { port: 8080 },
        environment: Environment::Dev,
        service_name: "console-service-test".to_string(),
        log_level: "warn".to_string(),
        redis: RedisConfig {
            url: "redis://unused".to_string(),
        },
        admin: AdminConfig {
            username: ADMIN_USERNAME.to_string(),
            password: ADMIN_PASSWORD.to_string(),
        },
        upstream: UpstreamConfig {
            base_url: upstream_base.to_string(),
            timeout_ms: 2_000,
            max_attempts: 3,
            retry_base_ms: 10,
            page_limit: 100,
        },
        cache: CacheConfig {
            soft_ttl_ms: 15 * 60 * 1000,
            hard_ttl_ms: 24 * 60 * 60 * 1000,
            kv_ttl_seconds: 48 * 60 * 60,
            version: "v1".to_string(),
        },
        session: SessionConfig {
            expiry_ms: 24 * 60 * 60 * 1000,
            min_refresh_interval_ms: 5 * 60 * 1000,
        },
        lockout: LockoutConfig {
            max_attempts: 5,
            window_seconds: 15 * 60,
            base_lock_seconds: 5 * 60,
            max_lock_seconds: 60 * 60,
        },
        keepalive: KeepAliveConfig {
            enabled: false,
            interval_seconds: 600,
            ping_timeout_ms: 1_000,
            max_retries: 0,
            retry_base_ms: 10,
            batch_size: 10,
            batch_interval_ms: 1,
            budget_ms: 5_000,
        },
    }
}

pub fn test_state(upstream_base: &str) -> AppState {
    AppState::new(test_config(upstream_base), Arc::new(MemoryKv::new()))
}

pub fn test_app(upstream_base: &str) -> (Router, AppState) {
    let state = test_state(upstream_base);
    (build_router(state.clone()), state)
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// First Set-Cookie value whose name matches, without attributes.
pub fn cookie_value(response: &Response<Body>, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|cookie| {
            let (pair, _) = cookie.split_once(';').unwrap_or((cookie, ""));
            let (cookie_name, value) = pair.split_once('=')?;
            (cookie_name == name).then(|| value.to_string())
        })
}

pub async fn fetch_csrf(router: &Router) -> (String, String) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/csrf")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let token = cookie_value(&response, "csrf_token").unwrap();
    let cookie = format!("csrf_token={}", token);
    (token, cookie)
}

/// Run the full login flow and return a Cookie header value carrying
/// the session and csrf cookies.
pub async fn login(router: &Router) -> String {
    let (token, csrf_cookie) = fetch_csrf(router).await;

    let body = format!(
        "username={}&password={}&csrf_token={}",
        ADMIN_USERNAME, ADMIN_PASSWORD, token
    );
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/login")
                .header(header::HOST, "console.test")
                .header(header::ORIGIN, "http://console.test")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .header(header::COOKIE, &csrf_cookie)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let session = cookie_value(&response, "session").unwrap();
    format!("session={}; {}", session, csrf_cookie)
}
