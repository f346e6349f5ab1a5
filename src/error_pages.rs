use askama::Template;
use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{Html, IntoResponse, Response};
use tower_cookies::Cookies;

use crate::auth::SESSION_COOKIE;
use crate::handlers::layout::{Flash, Layout};
use crate::models::CurrentUser;
use crate::state::AppState;

/// Newtype for passing error messages through response extensions.
#[derive(Clone)]
pub struct ErrorMessage(pub String);

#[derive(Template)]
#[template(path = "pages/error.html")]
struct ErrorPageTemplate {
    layout: Layout,
    status_code: u16,
    status_text: &'static str,
    message: String,
    home: &'static str,
}

/// Requests whose error bodies are consumed by scripts rather than shown
/// as pages: JSON routes, the health check, and in-page fetches.
fn keeps_raw_errors(request: &Request<Body>) -> bool {
    let path = request.uri().path();
    let headers = request.headers();
    path.starts_with("/api/")
        || path == "/health"
        || headers.contains_key("hx-request")
        || headers
            .get("x-requested-with")
            .is_some_and(|v| v == "fetch")
}

/// Middleware that turns bare 4xx/5xx responses into a full error page.
///
/// Handlers that already re-rendered a page (the auth form after a failed
/// login, say) send `text/html` without an [`ErrorMessage`] and are left alone.
pub async fn error_page_middleware(
    State(state): State<AppState>,
    cookies: Cookies,
    request: Request<Body>,
    next: Next,
) -> Response {
    let raw = keeps_raw_errors(&request);
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let user = cookies
        .get(SESSION_COOKIE)
        .and_then(|cookie| state.sessions.get(cookie.value()))
        .map(|session| session.current_user());

    let response = next.run(request).await;
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let message = response.extensions().get::<ErrorMessage>().map(|e| e.0.clone());
    tracing::warn!(
        %status,
        %method,
        %path,
        message = message.as_deref().unwrap_or(""),
        "request failed"
    );

    let already_page = message.is_none()
        && response
            .headers()
            .get(axum::http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/html"));
    if raw || already_page {
        return response;
    }

    render_error_page(user.as_ref(), status, message)
}

/// Fallback for unmatched routes.
pub async fn fallback_handler() -> Response {
    let mut response = StatusCode::NOT_FOUND.into_response();
    response
        .extensions_mut()
        .insert(ErrorMessage("The page you're looking for doesn't exist.".into()));
    response
}

fn render_error_page(user: Option<&CurrentUser>, status: StatusCode, message: Option<String>) -> Response {
    let (status_text, fallback) = describe(status);
    let template = ErrorPageTemplate {
        layout: Layout::public(status_text, user, Flash::default()),
        status_code: status.as_u16(),
        status_text,
        message: message.unwrap_or_else(|| match fallback {
            Some(text) => text.to_string(),
            None => format!("An unexpected error occurred ({}).", status.as_u16()),
        }),
        home: if user.is_some() { "/dashboard" } else { "/" },
    };

    match template.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to render error page");
            (status, "Internal Server Error").into_response()
        }
    }
}

/// Title and default explanation for a status code.
fn describe(status: StatusCode) -> (&'static str, Option<&'static str>) {
    match status {
        StatusCode::BAD_REQUEST => ("Bad Request", Some("The request could not be understood.")),
        StatusCode::UNAUTHORIZED => ("Unauthorized", Some("Please sign in to continue.")),
        StatusCode::FORBIDDEN => ("Forbidden", Some("You don't have permission to do that.")),
        StatusCode::NOT_FOUND => ("Not Found", Some("The page you're looking for doesn't exist.")),
        StatusCode::METHOD_NOT_ALLOWED => ("Method Not Allowed", Some("This action is not supported.")),
        StatusCode::PAYLOAD_TOO_LARGE => ("Payload Too Large", Some("The submitted data is too large.")),
        StatusCode::BAD_GATEWAY => ("Bad Gateway", Some("The payment service could not be reached.")),
        StatusCode::INTERNAL_SERVER_ERROR => ("Internal Server Error", Some("Something went wrong on our end.")),
        _ => ("Error", None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[test]
    fn test_raw_error_routes() {
        assert!(keeps_raw_errors(&request("/api/expenses")));
        assert!(keeps_raw_errors(&request("/health")));
        assert!(!keeps_raw_errors(&request("/expenses")));

        let mut fetch = request("/assistant");
        fetch
            .headers_mut()
            .insert("x-requested-with", "fetch".parse().unwrap());
        assert!(keeps_raw_errors(&fetch));
    }

    #[test]
    fn test_describe_unknown_status() {
        assert_eq!(describe(StatusCode::IM_A_TEAPOT), ("Error", None));
        assert_eq!(describe(StatusCode::NOT_FOUND).0, "Not Found");
    }
}
