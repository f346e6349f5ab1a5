//! Shared test utilities for integration tests.
//!
//! `TestClient` drives the full router (auth, XSRF and error-page layers
//! included) against a fresh in-memory database, keeping the session cookie
//! and XSRF token between requests the way a browser would.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use budget_savvy::config::Config;
use budget_savvy::server::{app_router, open_database};
use budget_savvy::state::AppState;
use budget_savvy::xsrf::{XSRF_FORM_FIELD, XSRF_HEADER};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

pub const TEST_EMAIL: &str = "saver@example.com";
pub const TEST_PASSWORD: &str = "correct-horse-42";

struct Session {
    cookie: String,
    xsrf_token: String,
}

/// A buffered response.
pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response is not JSON")
    }

    pub fn location(&self) -> &str {
        self.location.as_deref().expect("response has no Location header")
    }
}

pub struct TestClient {
    pub state: AppState,
    session: Option<Session>,
}

impl TestClient {
    /// Anonymous client with a fresh in-memory database.
    pub fn new() -> Self {
        Self::with_config(Config::for_tests())
    }

    pub fn with_config(config: Config) -> Self {
        let db = open_database(&config).expect("Failed to open test database");
        Self {
            state: AppState::new(db, config),
            session: None,
        }
    }

    /// Client already registered and signed in as [`TEST_EMAIL`].
    pub async fn signed_in() -> Self {
        let mut client = Self::new();
        client.register(TEST_EMAIL, TEST_PASSWORD).await;
        let status = client.login(TEST_EMAIL, TEST_PASSWORD).await;
        assert_eq!(status, StatusCode::SEE_OTHER, "login should redirect");
        client
    }

    /// Second, anonymous browser talking to the same server.
    pub fn same_server(&self) -> Self {
        Self {
            state: self.state.clone(),
            session: None,
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.is_some()
    }

    pub fn xsrf_token(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.xsrf_token.as_str())
    }

    pub async fn send(&self, mut request: Request<Body>) -> TestResponse {
        if let Some(session) = &self.session {
            request.headers_mut().insert(
                header::COOKIE,
                session.cookie.parse().expect("valid cookie header"),
            );
        }
        let response = app_router(self.state.clone())
            .oneshot(request)
            .await
            .expect("router is infallible");
        buffer(response).await
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn get_json(&self, uri: &str) -> (StatusCode, Value) {
        let response = self.get(uri).await;
        let value = serde_json::from_slice(&response.body).unwrap_or(Value::Null);
        (response.status, value)
    }

    /// POST a form, adding the session's XSRF token when signed in.
    pub async fn post_form(&self, uri: &str, form: &[(&str, &str)]) -> TestResponse {
        let mut pairs: Vec<(&str, &str)> = form.to_vec();
        if let Some(token) = self.xsrf_token() {
            pairs.push((XSRF_FORM_FIELD, token));
        }
        self.post_form_raw(uri, &pairs).await
    }

    /// POST a form exactly as given.
    pub async fn post_form_raw(&self, uri: &str, form: &[(&str, &str)]) -> TestResponse {
        let body = form
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    /// Send JSON with the XSRF header, as the browser script does.
    pub async fn send_json(&self, method: &str, uri: &str, payload: &Value) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-requested-with", "fetch");
        if let Some(token) = self.xsrf_token() {
            builder = builder.header(XSRF_HEADER, token);
        }
        self.send(builder.body(Body::from(payload.to_string())).unwrap())
            .await
    }

    pub async fn delete(&self, uri: &str) -> TestResponse {
        let mut builder = Request::builder().method("DELETE").uri(uri);
        if let Some(token) = self.xsrf_token() {
            builder = builder.header(XSRF_HEADER, token);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn register(&self, email: &str, password: &str) -> TestResponse {
        self.post_form_raw("/auth/register", &[("email", email), ("password", password)])
            .await
    }

    /// Sign in and keep the session cookie plus its XSRF token.
    pub async fn login(&mut self, email: &str, password: &str) -> StatusCode {
        self.login_with(&[("email", email), ("password", password)])
            .await
            .status
    }

    pub async fn login_with(&mut self, form: &[(&str, &str)]) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri("/auth/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(
                form.iter()
                    .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
                    .collect::<Vec<_>>()
                    .join("&"),
            ))
            .unwrap();
        let response = app_router(self.state.clone())
            .oneshot(request)
            .await
            .expect("router is infallible");

        let cookie = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with("session="))
            .and_then(|v| v.split(';').next())
            .map(str::to_string);
        let buffered = buffer(response).await;

        if let Some(cookie) = cookie {
            self.session = Some(Session {
                cookie,
                xsrf_token: String::new(),
            });
            let (_, info) = self.get_json("/api/session").await;
            let token = info["xsrf_token"].as_str().unwrap_or_default().to_string();
            if let Some(session) = self.session.as_mut() {
                session.xsrf_token = token;
            }
        }
        buffered
    }

    pub fn forget_session(&mut self) {
        self.session = None;
    }

    /// Add an expense through the web form; returns the redirect target.
    pub async fn add_expense(&self, title: &str, amount: &str, category: &str, date: &str) -> String {
        let response = self
            .post_form(
                "/expenses",
                &[
                    ("title", title),
                    ("amount", amount),
                    ("category", category),
                    ("date", date),
                ],
            )
            .await;
        assert_eq!(response.status, StatusCode::SEE_OTHER);
        response.location().to_string()
    }
}

impl Default for TestClient {
    fn default() -> Self {
        Self::new()
    }
}

async fn buffer(response: Response<Body>) -> TestResponse {
    let header_string = |name: header::HeaderName| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let status = response.status();
    let location = header_string(header::LOCATION);
    let content_type = header_string(header::CONTENT_TYPE);
    let content_disposition = header_string(header::CONTENT_DISPOSITION);
    let body = response
        .into_body()
        .collect()
        .await
        .expect("body collects")
        .to_bytes()
        .to_vec();

    TestResponse {
        status,
        location,
        content_type,
        content_disposition,
        body,
    }
}
