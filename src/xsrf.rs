//! XSRF (Cross-Site Request Forgery) protection middleware.
//!
//! Every session owns a random token. State-changing requests (POST, PUT,
//! DELETE, PATCH) made with a session must echo it either in the
//! `X-XSRF-Token` header or in the `_xsrf_token` form field. Requests without
//! a session carry no authority and are left to the auth middleware.

use axum::body::Body;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tower_cookies::Cookies;

use crate::auth::SESSION_COOKIE;
use crate::state::AppState;

/// The header name for XSRF tokens in fetch requests.
pub const XSRF_HEADER: &str = "X-XSRF-Token";

/// The form field name for XSRF tokens in form submissions.
pub const XSRF_FORM_FIELD: &str = "_xsrf_token";

/// Largest form body read while looking for the token.
const MAX_FORM_BYTES: usize = 1024 * 1024;

pub async fn xsrf_middleware(
    State(state): State<AppState>,
    cookies: Cookies,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !matches!(
        *request.method(),
        Method::POST | Method::PUT | Method::DELETE | Method::PATCH
    ) {
        return next.run(request).await;
    }

    let Some(session) = cookies
        .get(SESSION_COOKIE)
        .and_then(|cookie| state.sessions.get(cookie.value()))
    else {
        return next.run(request).await;
    };
    let expected = session.xsrf_token;

    // Check for token in header first (fetch requests)
    let header_token = request
        .headers()
        .get(XSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    if let Some(token) = header_token {
        if token == expected {
            return next.run(request).await;
        }
        return xsrf_error_response();
    }

    let is_form = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false);

    if !is_form {
        // JSON and everything else must use the header
        return xsrf_error_response();
    }

    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_FORM_BYTES).await {
        Ok(b) => b,
        Err(_) => return xsrf_error_response(),
    };

    let form_token = form_urlencoded_token(&bytes);
    if form_token.as_deref() == Some(expected.as_str()) {
        return next.run(Request::from_parts(parts, Body::from(bytes))).await;
    }

    tracing::warn!(user_id = session.user_id, "Rejected form with bad XSRF token");
    xsrf_error_response()
}

fn form_urlencoded_token(body: &[u8]) -> Option<String> {
    serde_urlencoded::from_bytes::<Vec<(String, String)>>(body)
        .ok()?
        .into_iter()
        .find(|(key, _)| key == XSRF_FORM_FIELD)
        .map(|(_, value)| value)
}

fn xsrf_error_response() -> Response {
    (StatusCode::FORBIDDEN, "Invalid or missing XSRF token").into_response()
}
