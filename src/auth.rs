//! Account registration, sign-in and the session middleware.
//!
//! Passwords are stored as Argon2id PHC strings. Session tokens are random
//! UUIDs held in the server-side [`SessionStore`](crate::state::SessionStore);
//! each session carries its own XSRF token. Tokens are invalidated on logout
//! or server restart.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use askama::Template;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{Html, IntoResponse, Json, Redirect, Response};
use axum::{Extension, Form};
use serde::{Deserialize, Serialize};
use tower_cookies::{Cookie, Cookies};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::queries::users;
use crate::error::{AppError, AppResult, RenderHtml};
use crate::form_utils::{deserialize_optional_string, is_valid_email};
use crate::handlers::layout::{redirect_with_error, redirect_with_notice, Flash, Layout};
use crate::models::CurrentUser;
use crate::services::checkout::Plan;
use crate::state::{AppState, Session};

/// Cookie name for the session token.
pub const SESSION_COOKIE: &str = "session";

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 100;

/// Paths reachable without a session.
fn is_public_path(path: &str) -> bool {
    matches!(
        path,
        "/" | "/auth" | "/auth/login" | "/auth/register" | "/checkout" | "/health" | "/api/session"
    ) || path.starts_with("/static/")
}

#[derive(Template)]
#[template(path = "pages/auth.html")]
pub struct AuthTemplate {
    pub layout: Layout,
    pub tab: String,
    pub plan: Option<String>,
    pub email: String,
    pub error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuthParams {
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub tab: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub plan: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CredentialsForm {
    pub email: String,
    pub password: String,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub plan: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PasswordForm {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xsrf_token: Option<String>,
}

/// Resolves the session cookie to a [`CurrentUser`] request extension and
/// turns away anonymous requests to protected paths.
pub async fn auth_middleware(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if let Some(session_cookie) = cookies.get(SESSION_COOKIE) {
        if let Some(session) = state.sessions.get(session_cookie.value()) {
            request.extensions_mut().insert(session.current_user());
            return next.run(request).await;
        }
    }

    let path = request.uri().path();
    if is_public_path(path) {
        return next.run(request).await;
    }

    // For HTMX requests or API calls, return 401
    let is_htmx = request.headers().contains_key("HX-Request");
    if is_htmx || path.starts_with("/api/") {
        return (StatusCode::UNAUTHORIZED, "Authentication required").into_response();
    }

    Redirect::to("/auth").into_response()
}

/// Render the sign-in / sign-up page.
pub async fn auth_page(
    user: Option<Extension<CurrentUser>>,
    Query(params): Query<AuthParams>,
    Query(flash): Query<Flash>,
) -> AppResult<Response> {
    if user.is_some() {
        return Ok(Redirect::to("/dashboard").into_response());
    }

    let tab = match params.tab.as_deref() {
        Some("register") => "register",
        _ => "login",
    };
    let template = AuthTemplate {
        layout: Layout::public("Sign in", None, flash),
        tab: tab.to_string(),
        plan: params.plan.map(|p| Plan::from_id(&p).as_str().to_string()),
        email: String::new(),
        error: None,
    };
    Ok(template.render_html()?.into_response())
}

fn auth_form_error(tab: &str, form: &CredentialsForm, message: &str) -> AppResult<Response> {
    let template = AuthTemplate {
        layout: Layout::public("Sign in", None, Flash::default()),
        tab: tab.to_string(),
        plan: form.plan.clone(),
        email: form.email.trim().to_string(),
        error: Some(message.to_string()),
    };
    let html: Html<String> = template.render_html()?;
    Ok((StatusCode::UNPROCESSABLE_ENTITY, html).into_response())
}

/// Validation shared by sign-up and sign-in.
pub fn validate_credentials(email: &str, password: &str) -> Result<(), &'static str> {
    if !is_valid_email(email) {
        return Err("Please enter a valid email address");
    }
    validate_password(password)
}

pub fn validate_password(password: &str) -> Result<(), &'static str> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err("Password must be at least 8 characters");
    }
    if len > MAX_PASSWORD_LEN {
        return Err("Password cannot exceed 100 characters");
    }
    Ok(())
}

/// Handle sign-up. New accounts are sent to the login tab.
pub async fn register_submit(
    State(state): State<AppState>,
    Form(form): Form<CredentialsForm>,
) -> AppResult<Response> {
    let email = form.email.trim();
    if let Err(message) = validate_credentials(email, &form.password) {
        return auth_form_error("register", &form, message);
    }

    let conn = state.db.get()?;
    if users::email_exists(&conn, email)? {
        debug!(email = %email, "Registration for existing email");
        return auth_form_error("register", &form, "User already registered");
    }

    let hash = hash_password(&form.password)?;
    let user_id = users::create_user(&conn, email, &hash)?;
    info!(user_id, "User registered");

    let mut target = String::from("/auth?tab=login");
    if let Some(plan) = &form.plan {
        target.push_str(&format!("&plan={}", urlencoding::encode(plan)));
    }
    Ok(redirect_with_notice(
        &target,
        "Registration successful! Please check your email to verify your account.",
    )
    .into_response())
}

/// Handle sign-in and start a session.
pub async fn login_submit(
    State(state): State<AppState>,
    cookies: Cookies,
    Form(form): Form<CredentialsForm>,
) -> AppResult<Response> {
    let email = form.email.trim();
    if let Err(message) = validate_credentials(email, &form.password) {
        return auth_form_error("login", &form, message);
    }

    let user = {
        let conn = state.db.get()?;
        users::find_by_email(&conn, email)?
    };

    let Some(user) = user.filter(|u| verify_password(&form.password, &u.password_hash)) else {
        warn!(email = %email, "Failed login attempt");
        return auth_form_error("login", &form, "Invalid login credentials");
    };

    let session_token = Uuid::new_v4().to_string();
    state.sessions.insert(
        session_token.clone(),
        Session {
            user_id: user.id,
            email: user.email.clone(),
            xsrf_token: Uuid::new_v4().to_string(),
        },
    );

    let cookie = Cookie::build((SESSION_COOKIE, session_token))
        .path("/")
        .http_only(true)
        .same_site(tower_cookies::cookie::SameSite::Strict)
        .build();
    cookies.add(cookie);
    info!(user_id = user.id, "User logged in");

    // A paid plan picked before signing in is resumed on the pricing section.
    let target = match form.plan.as_deref().map(Plan::from_id) {
        Some(plan) if plan.is_paid() => format!("/?plan={}#pricing", plan),
        _ => "/dashboard".to_string(),
    };
    Ok(redirect_with_notice(&target, "Login successful!").into_response())
}

/// Handle logout.
pub async fn logout(State(state): State<AppState>, cookies: Cookies) -> impl IntoResponse {
    if let Some(session_cookie) = cookies.get(SESSION_COOKIE) {
        if let Some(session) = state.sessions.remove(session_cookie.value()) {
            info!(user_id = session.user_id, "User logged out");
        }
    }

    let cookie = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .build();
    cookies.remove(cookie);

    Redirect::to("/auth")
}

/// Current session as JSON. Anonymous callers get `authenticated: false`.
pub async fn session_info(user: Option<Extension<CurrentUser>>) -> Json<SessionInfo> {
    Json(match user {
        Some(Extension(user)) => SessionInfo {
            authenticated: true,
            user_id: Some(user.id),
            email: Some(user.email),
            xsrf_token: Some(user.xsrf_token),
        },
        None => SessionInfo {
            authenticated: false,
            user_id: None,
            email: None,
            xsrf_token: None,
        },
    })
}

/// Change the signed-in user's password.
pub async fn update_password(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Form(form): Form<PasswordForm>,
) -> AppResult<Redirect> {
    const BACK: &str = "/settings?tab=account";

    if let Err(message) = validate_password(&form.new_password) {
        return Ok(redirect_with_error(BACK, message));
    }
    if form.new_password != form.confirm_password {
        return Ok(redirect_with_error(BACK, "New passwords do not match"));
    }

    let conn = state.db.get()?;
    let account = users::get_user(&conn, user.id)?
        .ok_or_else(|| AppError::Unauthorized("Account no longer exists".into()))?;

    if !verify_password(&form.current_password, &account.password_hash) {
        warn!(user_id = user.id, "Password change with wrong current password");
        return Ok(redirect_with_error(BACK, "Current password is incorrect"));
    }

    let hash = hash_password(&form.new_password)?;
    users::update_password_hash(&conn, user.id, &hash)?;
    info!(user_id = user.id, "Password updated");

    Ok(redirect_with_notice(BACK, "Password updated successfully!"))
}

/// Hash a password into an Argon2id PHC string.
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
        .map_err(|e| AppError::Internal(format!("Failed to create salt: {}", e)))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

/// Verify a password against an Argon2 hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hash) else {
        tracing::error!("Invalid password hash format in users table");
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}
