//! Set-Cookie builders. Reading is done through `CookieJar`; writing
//! stays manual so the attributes are exactly what we intend.

pub const SESSION_COOKIE: &str = "session";
pub const CSRF_COOKIE: &str = "csrf_token";

fn secure_attr(secure: bool) -> &'static str {
    if secure { "; Secure" } else { "" }
}

/// HttpOnly session cookie; Max-Age always matches the stored expiry.
pub fn session_cookie(session_id: &str, max_age_seconds: u64, secure: bool) -> String {
    format!(
        "{}={}; Path=/{}; HttpOnly; SameSite=Strict; Max-Age={}",
        SESSION_COOKIE,
        session_id,
        secure_attr(secure),
        max_age_seconds
    )
}

pub fn clear_session_cookie(secure: bool) -> String {
    format!(
        "{}=; Path=/{}; HttpOnly; SameSite=Strict; Max-Age=0",
        SESSION_COOKIE,
        secure_attr(secure)
    )
}

/// Deliberately not HttpOnly: the double-submit check requires client
/// script to read this value back.
pub fn csrf_cookie(token: &str, max_age_seconds: u64, secure: bool) -> String {
    format!(
        "{}={}; Path=/{}; SameSite=Strict; Max-Age={}",
        CSRF_COOKIE,
        token,
        secure_attr(secure),
        max_age_seconds
    )
}

pub fn clear_csrf_cookie(secure: bool) -> String {
    format!(
        "{}=; Path=/{}; SameSite=Strict; Max-Age=0",
        CSRF_COOKIE,
        secure_attr(secure)
    )
}
