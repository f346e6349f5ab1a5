use askama::Template;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{Html, IntoResponse, Response};
use axum::Extension;
use chrono::{Datelike, Local, NaiveDate};
use rusqlite::Connection;
use serde::Deserialize;
use tracing::{debug, info};

use crate::date_utils::{iso_year_bounds, month_end, month_start, today, MonthPeriod, TrendRange};
use crate::db::queries::expenses::{self, ExpenseFilter};
use crate::error::{AppError, AppResult, RenderHtml};
use crate::filters;
use crate::form_utils::deserialize_optional_string;
use crate::handlers::layout::{page_layout, Flash, Layout};
use crate::models::{Category, CurrentUser, Expense};
use crate::services::advisories::Page;
use crate::services::analytics::{self, Bucket, CategoryShare};
use crate::services::preferences::{PreferenceStore, SqliteStorage};
use crate::services::report::ExpenseReport;
use crate::state::AppState;

const TABS: &[&str] = &["overview", "trends", "insights"];

#[derive(Debug, Default, Deserialize)]
pub struct ReportParams {
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub tab: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub bucket: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub range: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub month: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub format: Option<String>,
}

impl ReportParams {
    /// Requested month, defaulting to the current one.
    pub fn period(&self) -> Result<MonthPeriod, AppError> {
        match self.month.as_deref() {
            Some(m) => m.parse().map_err(AppError::Validation),
            None => Ok(MonthPeriod::current()),
        }
    }

    pub fn bucket(&self) -> Bucket {
        self.bucket
            .as_deref()
            .and_then(|b| b.parse().ok())
            .unwrap_or_default()
    }

    pub fn range(&self) -> TrendRange {
        self.range
            .as_deref()
            .and_then(|r| r.parse().ok())
            .unwrap_or_default()
    }

    fn tab(&self) -> &'static str {
        self.tab
            .as_deref()
            .and_then(|t| TABS.iter().find(|known| **known == t).copied())
            .unwrap_or("overview")
    }
}

/// Expenses needed to chart one month: its calendar and ISO week-numbering
/// year (for monthly and weekly buckets), the two months before it (for month-over-month change)
/// and the longest trend window ending today.
pub struct ReportData {
    pub period: MonthPeriod,
    pub today: NaiveDate,
    pub expenses: Vec<Expense>,
}

impl ReportData {
    pub fn load(conn: &Connection, user_id: i64, period: MonthPeriod) -> AppResult<Self> {
        let today = today();
        let (iso_start, iso_end) = iso_year_bounds(period.year);
        let from = month_start(period.year, 1)
            .min(iso_start)
            .min(period.shift(-2).start())
            .min(TrendRange::NinetyDays.cutoff(today));
        let to = month_end(period.year, 12).max(iso_end).max(today);

        let expenses =
            expenses::list_expenses(conn, &ExpenseFilter::for_user(user_id).between(from, to))?;
        debug!(user_id, %from, %to, count = expenses.len(), "Loaded report data");

        Ok(Self {
            period,
            today,
            expenses,
        })
    }

    pub fn month_expenses(&self) -> Vec<Expense> {
        self.expenses
            .iter()
            .filter(|e| self.period.contains(e.date))
            .cloned()
            .collect()
    }

    /// Daily buckets cover the selected month, weekly its ISO week-numbering
    /// year and monthly its calendar year.
    pub fn bucket_source(&self, bucket: Bucket) -> Vec<Expense> {
        let year = self.period.year;
        self.expenses
            .iter()
            .filter(|e| match bucket {
                Bucket::Day => self.period.contains(e.date),
                Bucket::Week => e.date.iso_week().year() == year,
                Bucket::Month => e.date.year() == year,
            })
            .cloned()
            .collect()
    }
}

/// A category share rendered as a horizontal bar.
pub struct ShareRow {
    pub category: Category,
    pub amount: String,
    pub count: usize,
    pub percent: String,
    pub width: u32,
}

impl ShareRow {
    pub fn from_breakdown(shares: &[CategoryShare], currency: &str) -> Vec<Self> {
        shares
            .iter()
            .map(|s| Self {
                category: s.category,
                amount: filters::format_money(s.total_cents, currency),
                count: s.count,
                percent: filters::format_percent(s.percentage),
                width: s.percentage.round().clamp(0.0, 100.0) as u32,
            })
            .collect()
    }
}

/// A bucket or trend point scaled against the largest value in its series.
pub struct BarRow {
    pub label: String,
    pub amount: String,
    pub detail: String,
    pub width: u32,
}

fn scale(value: i64, max: i64) -> u32 {
    if max <= 0 {
        0
    } else {
        (value as f64 / max as f64 * 100.0).round().clamp(0.0, 100.0) as u32
    }
}

pub struct MonthRow {
    pub label: String,
    pub amount: String,
}

pub struct ChangeRow {
    pub label: String,
    pub percent: String,
    pub is_increase: bool,
}

#[derive(Template)]
#[template(path = "pages/reports.html")]
pub struct ReportsTemplate {
    pub layout: Layout,
    pub tab: &'static str,
    pub period_label: String,
    pub month_param: String,
    pub prev_month: String,
    pub next_month: String,
    pub bucket: &'static str,
    pub buckets: &'static [Bucket],
    pub range: &'static str,
    pub ranges: &'static [TrendRange],
    pub total: String,
    pub count: usize,
    pub average: String,
    pub largest: String,
    pub breakdown: Vec<ShareRow>,
    pub bars: Vec<BarRow>,
    pub trend: Vec<BarRow>,
    pub trend_average: String,
    pub months: Vec<MonthRow>,
    pub changes: Vec<ChangeRow>,
    pub top_category: Option<String>,
    pub frequent_category: Option<String>,
    pub observations: Vec<String>,
}

impl ReportsTemplate {
    /// Query string for the current selection with one parameter replaced.
    pub fn link(&self, key: &str, value: &str) -> String {
        let mut pairs = vec![
            ("tab", self.tab),
            ("month", self.month_param.as_str()),
            ("bucket", self.bucket),
            ("range", self.range),
        ];
        for pair in pairs.iter_mut() {
            if pair.0 == key {
                pair.1 = value;
            }
        }
        let query: Vec<String> = pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect();
        format!("/reports?{}", query.join("&"))
    }
}

pub async fn index(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<ReportParams>,
    Query(flash): Query<Flash>,
) -> AppResult<Html<String>> {
    let period = params.period()?;
    let bucket = params.bucket();
    let range = params.range();

    let conn = state.db.get()?;
    let (layout, prefs) = page_layout(&conn, &state.config, &user, Page::Reports, "Reports", flash)?;
    let currency = prefs.currency().to_string();
    let data = ReportData::load(&conn, user.id, period)?;

    let month_expenses = data.month_expenses();
    let summary = analytics::SpendingSummary::from_expenses(&month_expenses);
    let summaries = analytics::category_summaries(&month_expenses);

    let buckets = analytics::bucket_totals(&data.bucket_source(bucket), bucket);
    let bucket_max = buckets.iter().map(|b| b.total_cents).max().unwrap_or(0);
    let bars = buckets
        .iter()
        .map(|b| BarRow {
            label: b.label.clone(),
            amount: filters::format_money(b.total_cents, &currency),
            detail: String::new(),
            width: scale(b.total_cents, bucket_max),
        })
        .collect();

    let points = analytics::trend_series(&data.expenses, range, data.today);
    let trend_max = points.iter().map(|p| p.total_cents).max().unwrap_or(0);
    let trend = points
        .iter()
        .map(|p| BarRow {
            label: p.date.format("%b %-d").to_string(),
            amount: filters::format_money(p.total_cents, &currency),
            detail: filters::format_money(p.running_total_cents, &currency),
            width: scale(p.total_cents, trend_max),
        })
        .collect();

    let monthly = analytics::monthly_change_summary(&data.expenses, period);
    let report = ExpenseReport::build(
        &month_expenses,
        period,
        Local::now().naive_local(),
        &currency,
    )
    .with_prior_month_total(monthly.months.get(1).map(|m| m.total_cents).unwrap_or(0));

    let template = ReportsTemplate {
        layout,
        tab: params.tab(),
        period_label: period.label(),
        month_param: period.as_param(),
        prev_month: period.prev().as_param(),
        next_month: period.next().as_param(),
        bucket: bucket.as_str(),
        buckets: Bucket::all(),
        range: range.as_str(),
        ranges: TrendRange::all(),
        total: filters::format_money(summary.total_cents, &currency),
        count: summary.transaction_count,
        average: filters::format_money(summary.average_cents, &currency),
        largest: filters::format_money(summary.max_transaction_cents, &currency),
        breakdown: ShareRow::from_breakdown(&analytics::category_breakdown(&month_expenses), &currency),
        bars,
        trend,
        trend_average: filters::format_money(analytics::average_daily(&points), &currency),
        months: monthly
            .months
            .iter()
            .map(|m| MonthRow {
                label: m.label.clone(),
                amount: filters::format_money(m.total_cents, &currency),
            })
            .collect(),
        changes: monthly
            .changes
            .iter()
            .map(|c| ChangeRow {
                label: format!("{} vs {}", c.to, c.from),
                percent: filters::format_percent(c.percent.abs()),
                is_increase: c.percent > 0.0,
            })
            .collect(),
        top_category: analytics::top_category(&summaries).map(|s| {
            format!("{} ({})", s.category, filters::format_money(s.total_cents, &currency))
        }),
        frequent_category: analytics::most_frequent_category(&summaries)
            .map(|s| format!("{} ({} transactions)", s.category, s.count)),
        observations: report.observations,
    };
    template.render_html()
}

/// Download the month's report as PDF (default) or CSV.
pub async fn download(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<ReportParams>,
) -> AppResult<Response> {
    let period = params.period()?;
    let conn = state.db.get()?;
    let prefs = PreferenceStore::open(
        SqliteStorage::new(&conn, user.id),
        &state.config.default_currency,
    );

    let month = expenses::list_expenses(
        &conn,
        &ExpenseFilter::for_user(user.id).between(period.start(), period.end()),
    )?;
    let prior_total = expenses::sum_amount_cents(
        &conn,
        &ExpenseFilter::for_user(user.id).between(period.prev().start(), period.prev().end()),
    )?;

    let report = ExpenseReport::build(&month, period, Local::now().naive_local(), prefs.currency())
        .with_prior_month_total(prior_total);

    let (content_type, extension, body) = match params.format.as_deref() {
        Some("csv") => ("text/csv; charset=utf-8", "csv", report.render_csv()?),
        None | Some("pdf") => ("application/pdf", "pdf", report.render_pdf()),
        Some(other) => {
            return Err(AppError::Validation(format!("Unknown report format: {}", other)))
        }
    };
    let filename = report.filename(extension);
    info!(user_id = user.id, %filename, count = report.count, "Report downloaded");

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response())
}
