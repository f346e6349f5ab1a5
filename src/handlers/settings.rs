use askama::Template;
use axum::extract::{Query, State};
use axum::response::{Html, Json, Redirect};
use axum::{Extension, Form};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AppError, AppResult, RenderHtml};
use crate::filters::SUPPORTED_CURRENCIES;
use crate::form_utils::deserialize_optional_string;
use crate::handlers::layout::{page_layout, redirect_with_error, redirect_with_notice, Flash, Layout};
use crate::models::{
    CurrentUser, NotificationKey, NotificationPreferences, SecurityKey, SecurityPreferences,
};
use crate::services::advisories::Page;
use crate::services::preferences::{Badge, PreferenceStore, SqliteStorage};
use crate::state::AppState;

const TABS: &[&str] = &["account", "notifications", "security"];

pub struct ToggleRow {
    pub key: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub enabled: bool,
}

#[derive(Template)]
#[template(path = "pages/settings.html")]
pub struct SettingsTemplate {
    pub layout: Layout,
    pub tab: &'static str,
    pub email: String,
    pub currency: String,
    pub currencies: &'static [&'static str],
    pub notifications: Vec<ToggleRow>,
    pub two_factor: bool,
}

impl SettingsTemplate {
    pub fn is_currency(&self, code: &str) -> bool {
        self.currency == code
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SettingsParams {
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub tab: Option<String>,
}

/// One flag flip from a settings form. Checkbox-style values are accepted.
#[derive(Debug, Deserialize)]
pub struct ToggleForm {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

impl ToggleForm {
    fn enabled(&self) -> bool {
        matches!(self.value.trim(), "true" | "on" | "1" | "yes")
    }
}

#[derive(Debug, Deserialize)]
pub struct CurrencyForm {
    pub currency: String,
}

#[derive(Debug, Deserialize)]
pub struct TogglePayload {
    pub key: String,
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct PreferencesResponse {
    pub notifications: NotificationPreferences,
    pub security: SecurityPreferences,
    pub currency: String,
    pub badges: Vec<Badge>,
}

impl PreferencesResponse {
    fn from_store(prefs: &PreferenceStore<SqliteStorage<'_>>) -> Self {
        Self {
            notifications: prefs.notifications(),
            security: prefs.security(),
            currency: prefs.currency().to_string(),
            badges: prefs.active_badges(),
        }
    }
}

fn open_store<'c>(
    conn: &'c rusqlite::Connection,
    state: &AppState,
    user: &CurrentUser,
) -> PreferenceStore<SqliteStorage<'c>> {
    PreferenceStore::open(SqliteStorage::new(conn, user.id), &state.config.default_currency)
}

pub async fn index(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<SettingsParams>,
    Query(flash): Query<Flash>,
) -> AppResult<Html<String>> {
    let conn = state.db.get()?;
    let (layout, prefs) = page_layout(&conn, &state.config, &user, Page::Settings, "Settings", flash)?;

    let tab = params
        .tab
        .as_deref()
        .and_then(|t| TABS.iter().find(|known| **known == t).copied())
        .unwrap_or("account");
    let notifications = prefs.notifications();

    let template = SettingsTemplate {
        layout,
        tab,
        email: user.email.clone(),
        currency: prefs.currency().to_string(),
        currencies: SUPPORTED_CURRENCIES,
        notifications: NotificationKey::all()
            .iter()
            .map(|key| ToggleRow {
                key: key.as_str(),
                label: key.label(),
                description: key.description(),
                enabled: notifications.get(*key),
            })
            .collect(),
        two_factor: prefs.security().two_factor,
    };
    template.render_html()
}

pub async fn update_notification(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Form(form): Form<ToggleForm>,
) -> AppResult<Redirect> {
    const BACK: &str = "/settings?tab=notifications";
    let Ok(key) = form.key.parse::<NotificationKey>() else {
        return Ok(redirect_with_error(BACK, "Unknown notification preference"));
    };

    let conn = state.db.get()?;
    let mut prefs = open_store(&conn, &state, &user);
    let updated = prefs.update_notification(key, form.enabled());
    info!(user_id = user.id, key = key.as_str(), value = updated.get(key), "Notification preference changed");

    Ok(redirect_with_notice(BACK, "Notification preferences updated!"))
}

pub async fn update_security(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Form(form): Form<ToggleForm>,
) -> AppResult<Redirect> {
    const BACK: &str = "/settings?tab=security";
    let Ok(key) = form.key.parse::<SecurityKey>() else {
        return Ok(redirect_with_error(BACK, "Unknown security preference"));
    };

    let conn = state.db.get()?;
    let mut prefs = open_store(&conn, &state, &user);
    let updated = prefs.update_security(key, form.enabled());
    info!(user_id = user.id, key = key.as_str(), value = updated.get(key), "Security preference changed");

    Ok(redirect_with_notice(BACK, "Security settings updated!"))
}

pub async fn update_currency(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Form(form): Form<CurrencyForm>,
) -> AppResult<Redirect> {
    const BACK: &str = "/settings?tab=account";
    let code = form.currency.trim().to_ascii_uppercase();
    if !SUPPORTED_CURRENCIES.contains(&code.as_str()) {
        return Ok(redirect_with_error(BACK, "Unsupported currency"));
    }

    let conn = state.db.get()?;
    let mut prefs = open_store(&conn, &state, &user);
    let currency = prefs.update_currency(&code);
    info!(user_id = user.id, %currency, "Preferred currency changed");

    Ok(redirect_with_notice(BACK, "Profile updated successfully!"))
}

pub async fn api_preferences(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Json<PreferencesResponse>> {
    let conn = state.db.get()?;
    let prefs = open_store(&conn, &state, &user);
    Ok(Json(PreferencesResponse::from_store(&prefs)))
}

pub async fn api_update_notification(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<TogglePayload>,
) -> AppResult<Json<NotificationPreferences>> {
    let key: NotificationKey = payload.key.parse().map_err(AppError::Validation)?;
    let conn = state.db.get()?;
    let mut prefs = open_store(&conn, &state, &user);
    Ok(Json(prefs.update_notification(key, payload.enabled)))
}

pub async fn api_update_security(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<TogglePayload>,
) -> AppResult<Json<SecurityPreferences>> {
    let key: SecurityKey = payload.key.parse().map_err(AppError::Validation)?;
    let conn = state.db.get()?;
    let mut prefs = open_store(&conn, &state, &user);
    Ok(Json(prefs.update_security(key, payload.enabled)))
}
