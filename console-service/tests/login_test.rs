mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;

use common::{body_json, fetch_csrf, login, test_app, ADMIN_USERNAME};

fn login_request(cookie: &str, token: &str, username: &str, password: &str) -> Request<Body> {
    let body = format!(
        "username={}&password={}&csrf_token={}",
        username, password, token
    );
    Request::builder()
        .method("POST")
        .uri("/login")
        .header(header::HOST, "console.test")
        .header(header::ORIGIN, "http://console.test")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::COOKIE, cookie)
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn login_grants_access_to_protected_routes() {
    let (router, _state) = test_app("http://127.0.0.1:1");

    // Without a session the API is closed.
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/services")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let session_cookie = login(&router).await;

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/services")
                .header(header::COOKIE, &session_cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // No accounts configured yet, so the listing is empty.
    let body = body_json(response).await;
    assert_eq!(body["services"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let (router, _state) = test_app("http://127.0.0.1:1");
    let (token, cookie) = fetch_csrf(&router).await;

    let response = router
        .clone()
        .oneshot(login_request(&cookie, &token, ADMIN_USERNAME, "nope"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn repeated_failures_lock_the_account() {
    let (router, _state) = test_app("http://127.0.0.1:1");
    let (token, cookie) = fetch_csrf(&router).await;

    for _ in 0..5 {
        let response = router
            .clone()
            .oneshot(login_request(&cookie, &token, ADMIN_USERNAME, "nope"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    // The sixth attempt is blocked before credentials are checked,
    // even with the right password.
    let response = router
        .clone()
        .oneshot(login_request(
            &cookie,
            &token,
            ADMIN_USERNAME,
            common::ADMIN_PASSWORD,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let retry_after: u64 = response
        .headers()
        .get(header::RETRY_AFTER)
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after > 0 && retry_after <= 5 * 60);
}

#[tokio::test]
async fn logout_destroys_the_session() {
    let (router, _state) = test_app("http://127.0.0.1:1");
    let session_cookie = login(&router).await;

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/logout")
                .header(header::HOST, "console.test")
                .header(header::ORIGIN, "http://console.test")
                .header("x-csrf-token", extract_csrf(&session_cookie))
                .header(header::COOKIE, &session_cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The old session id no longer works.
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/services")
                .header(header::COOKIE, &session_cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

fn extract_csrf(cookie_header: &str) -> String {
    cookie_header
        .split("csrf_token=")
        .nth(1)
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string()
}
