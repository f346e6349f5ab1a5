use askama::Template;
use axum::extract::{Query, State};
use axum::response::Html;
use axum::Extension;
use serde::Deserialize;
use tracing::debug;

use crate::date_utils::{today, MonthPeriod};
use crate::db::queries::expenses::{self, ExpenseFilter};
use crate::error::{AppResult, RenderHtml};
use crate::filters;
use crate::form_utils::deserialize_optional_string;
use crate::handlers::expenses::ExpenseRow;
use crate::handlers::layout::{page_layout, Flash, Layout};
use crate::handlers::reports::ShareRow;
use crate::models::CurrentUser;
use crate::services::advisories::Page;
use crate::services::analytics;
use crate::state::AppState;

const RECENT_LIMIT: i64 = 5;

#[derive(Template)]
#[template(path = "pages/dashboard.html")]
pub struct DashboardTemplate {
    pub layout: Layout,
    pub month_label: String,
    pub total_spent: String,
    pub monthly_budget: String,
    pub budget: BudgetBar,
    pub change: ChangeBadge,
    pub breakdown: Vec<ShareRow>,
    pub recent: Vec<ExpenseRow>,
    pub transaction_count: usize,
}

/// Budget usage bar: width capped at 100, tone by usage level.
pub struct BudgetBar {
    pub percent: u32,
    pub tone: &'static str,
}

impl BudgetBar {
    pub fn new(spent_cents: i64, budget_cents: i64) -> Self {
        let used = if budget_cents > 0 {
            spent_cents as f64 / budget_cents as f64 * 100.0
        } else {
            0.0
        };
        let tone = if used > 90.0 {
            "danger"
        } else if used > 70.0 {
            "warning"
        } else {
            "normal"
        };
        Self {
            percent: used.clamp(0.0, 100.0).round() as u32,
            tone,
        }
    }
}

/// Month-over-month change; spending more is shown as bad news.
pub struct ChangeBadge {
    pub label: String,
    pub is_increase: bool,
}

impl ChangeBadge {
    pub fn new(percent: f64) -> Self {
        Self {
            label: filters::format_percent(percent.abs()),
            is_increase: percent > 0.0,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DashboardParams {
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub payment: Option<String>,
}

pub async fn index(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<DashboardParams>,
    Query(mut flash): Query<Flash>,
) -> AppResult<Html<String>> {
    debug!(user_id = user.id, "Loading dashboard");
    if params.payment.as_deref() == Some("success") && flash.notice.is_none() {
        flash.notice = Some("Payment successful! Your subscription is now active.".into());
    }

    let conn = state.db.get()?;
    let (layout, prefs) = page_layout(&conn, &state.config, &user, Page::Dashboard, "Dashboard", flash)?;
    let currency = prefs.currency().to_string();

    let month = MonthPeriod::containing(today());
    let this_month = expenses::list_expenses(
        &conn,
        &ExpenseFilter::for_user(user.id).between(month.start(), month.end()),
    )?;
    let last_month_total = expenses::sum_amount_cents(
        &conn,
        &ExpenseFilter::for_user(user.id).between(month.prev().start(), month.prev().end()),
    )?;
    let recent = expenses::list_expenses(
        &conn,
        &ExpenseFilter {
            limit: Some(RECENT_LIMIT),
            ..ExpenseFilter::for_user(user.id)
        },
    )?;

    let summary = analytics::SpendingSummary::from_expenses(&this_month);
    let change = analytics::percent_change(summary.total_cents, last_month_total);

    debug!(
        user_id = user.id,
        total_this_month = summary.total_cents,
        total_last_month = last_month_total,
        "Dashboard data loaded"
    );

    let template = DashboardTemplate {
        layout,
        month_label: month.label(),
        total_spent: filters::format_money(summary.total_cents, &currency),
        monthly_budget: filters::format_money(state.config.monthly_budget_cents, &currency),
        budget: BudgetBar::new(summary.total_cents, state.config.monthly_budget_cents),
        change: ChangeBadge::new(change),
        breakdown: ShareRow::from_breakdown(&analytics::category_breakdown(&this_month), &currency),
        recent: recent.iter().map(|e| ExpenseRow::new(e, &currency)).collect(),
        transaction_count: summary.transaction_count,
    };
    template.render_html()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_bar_tones() {
        assert_eq!(BudgetBar::new(50_000, 300_000).tone, "normal");
        assert_eq!(BudgetBar::new(240_000, 300_000).tone, "warning");
        let over = BudgetBar::new(450_000, 300_000);
        assert_eq!(over.tone, "danger");
        assert_eq!(over.percent, 100);
    }

    #[test]
    fn test_change_badge() {
        let up = ChangeBadge::new(12.5);
        assert!(up.is_increase);
        assert_eq!(up.label, "12.5%");
        assert!(!ChangeBadge::new(-3.0).is_increase);
    }
}
