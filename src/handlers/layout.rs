//! Data shared by every page: navigation, toasts, preference badges and
//! the timed advisories armed by the browser.

use axum::response::Redirect;
use rusqlite::Connection;
use serde::Deserialize;

use crate::config::Config;
use crate::date_utils::{today, MonthPeriod};
use crate::db::queries::expenses::{self, ExpenseFilter};
use crate::error::AppResult;
use crate::form_utils::deserialize_optional_string;
use crate::models::CurrentUser;
use crate::services::advisories::{self, Advisory, AdvisoryContext, Page};
use crate::services::preferences::{Badge, PreferenceStore, SqliteStorage};
use crate::VERSION;

/// One-shot toast messages carried in the query string after a redirect.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct Flash {
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub notice: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub error: Option<String>,
}

pub struct Layout {
    pub title: String,
    pub version: &'static str,
    pub active: &'static str,
    pub user_email: Option<String>,
    pub xsrf_token: String,
    pub badges: Vec<Badge>,
    pub advisories: Vec<Advisory>,
    pub two_factor: bool,
    pub notice: Option<String>,
    pub error: Option<String>,
}

impl Layout {
    /// Layout for pages reachable without signing in.
    pub fn public(title: &str, user: Option<&CurrentUser>, flash: Flash) -> Self {
        Self {
            title: title.to_string(),
            version: VERSION,
            active: "",
            user_email: user.map(|u| u.email.clone()),
            xsrf_token: user.map(|u| u.xsrf_token.clone()).unwrap_or_default(),
            badges: Vec::new(),
            advisories: Vec::new(),
            two_factor: false,
            notice: flash.notice,
            error: flash.error,
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.user_email.is_some()
    }
}

fn nav_key(page: Page) -> &'static str {
    match page {
        Page::Dashboard => "dashboard",
        Page::Expenses => "expenses",
        Page::Reports => "reports",
        Page::Assistant => "assistant",
        Page::Settings => "settings",
    }
}

/// Open the user's preferences and build the layout for an authenticated page.
///
/// Budget usage and bill reminders are computed from the current and previous
/// month's expenses; the preference flags decide what reaches the page.
pub fn page_layout<'c>(
    conn: &'c Connection,
    config: &Config,
    user: &CurrentUser,
    page: Page,
    title: &str,
    flash: Flash,
) -> AppResult<(Layout, PreferenceStore<SqliteStorage<'c>>)> {
    let prefs = PreferenceStore::open(
        SqliteStorage::new(conn, user.id),
        &config.default_currency,
    );

    let today = today();
    let this_month = MonthPeriod::containing(today);
    let recent = expenses::list_expenses(
        conn,
        &ExpenseFilter::for_user(user.id).between(this_month.prev().start(), this_month.end()),
    )?;
    let spent: i64 = recent
        .iter()
        .filter(|e| this_month.contains(e.date))
        .map(|e| e.amount_cents)
        .sum();

    let budget = prefs.budget_status(spent, config.monthly_budget_cents);
    let reminders = prefs.upcoming_reminders(&recent, today);
    let ctx = AdvisoryContext {
        budget,
        reminders: &reminders,
        currency: prefs.currency(),
        today,
    };
    let advisories = advisories::for_page(page, &prefs.notifications(), &ctx);

    let layout = Layout {
        title: title.to_string(),
        version: VERSION,
        active: nav_key(page),
        user_email: Some(user.email.clone()),
        xsrf_token: user.xsrf_token.clone(),
        badges: prefs.active_badges(),
        advisories,
        two_factor: prefs.requires_two_factor(),
        notice: flash.notice,
        error: flash.error,
    };
    Ok((layout, prefs))
}

/// Append `key=value` to a target URL, keeping any `#fragment` last.
pub fn with_query(target: &str, key: &str, value: &str) -> String {
    let (path, fragment) = match target.split_once('#') {
        Some((path, fragment)) => (path, Some(fragment)),
        None => (target, None),
    };
    let separator = if path.contains('?') { '&' } else { '?' };
    let mut url = format!("{}{}{}={}", path, separator, key, urlencoding::encode(value));
    if let Some(fragment) = fragment {
        url.push('#');
        url.push_str(fragment);
    }
    url
}

pub fn redirect_with_notice(target: &str, message: &str) -> Redirect {
    Redirect::to(&with_query(target, "notice", message))
}

pub fn redirect_with_error(target: &str, message: &str) -> Redirect {
    Redirect::to(&with_query(target, "error", message))
}
