//! JSON endpoints backing the charts and scripted clients.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::Extension;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::date_utils::parse_date;
use crate::db::queries::expenses::{self, ExpenseFilter};
use crate::error::{AppError, AppResult};
use crate::form_utils::{
    deserialize_optional_string, non_empty, parse_currency, validate_amount_cents,
};
use crate::handlers::reports::{ReportData, ReportParams};
use crate::models::{Category, CurrentUser, Expense, NewExpense};
use crate::services::analytics::{self, BucketTotal, CategoryShare, MonthlyChangeSummary, TrendPoint};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ExpenseQuery {
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub search: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub from: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub to: Option<String>,
}

impl ExpenseQuery {
    fn to_filter(&self, user_id: i64) -> AppResult<ExpenseFilter> {
        let date = |value: &Option<String>| -> AppResult<_> {
            value
                .as_deref()
                .map(|d| {
                    parse_date(d).ok_or_else(|| AppError::Validation(format!("Invalid date: {}", d)))
                })
                .transpose()
        };
        let category = self
            .category
            .as_deref()
            .map(|c| c.parse::<Category>())
            .transpose()
            .map_err(AppError::Validation)?;

        Ok(ExpenseFilter {
            search: self.search.clone(),
            category,
            from_date: date(&self.from)?,
            to_date: date(&self.to)?,
            ..ExpenseFilter::for_user(user_id)
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ExpensePayload {
    #[serde(default)]
    pub title: String,
    pub amount_cents: i64,
    pub category: String,
    pub date: String,
    pub note: Option<String>,
    pub currency: Option<String>,
}

impl ExpensePayload {
    fn validate(&self) -> AppResult<NewExpense> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(AppError::Validation("Title is required".into()));
        }
        let amount_cents = validate_amount_cents(self.amount_cents)?;
        let category: Category = self.category.parse().map_err(AppError::Validation)?;
        let date = parse_date(&self.date)
            .ok_or_else(|| AppError::Validation(format!("Invalid date: {}", self.date)))?;

        Ok(NewExpense {
            title: title.to_string(),
            amount_cents,
            category,
            date,
            note: non_empty(self.note.as_deref()),
            currency: parse_currency(self.currency.as_deref())?,
        })
    }
}

fn not_found(id: &str) -> AppError {
    AppError::NotFound(format!("Expense {} not found", id))
}

pub async fn list_expenses(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<ExpenseQuery>,
) -> AppResult<Json<Vec<Expense>>> {
    let filter = query.to_filter(user.id)?;
    let conn = state.db.get()?;
    Ok(Json(expenses::list_expenses(&conn, &filter)?))
}

pub async fn get_expense(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<Json<Expense>> {
    let conn = state.db.get()?;
    expenses::get_expense(&conn, user.id, &id)?
        .map(Json)
        .ok_or_else(|| not_found(&id))
}

pub async fn create_expense(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<ExpensePayload>,
) -> AppResult<(StatusCode, Json<Expense>)> {
    let new_expense = payload.validate()?;
    let conn = state.db.get()?;
    let id = expenses::create_expense(&conn, user.id, &new_expense)?;
    info!(expense_id = %id, user_id = user.id, "Expense created via API");

    let created = expenses::get_expense(&conn, user.id, &id)?.ok_or_else(|| not_found(&id))?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_expense(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(payload): Json<ExpensePayload>,
) -> AppResult<Json<Expense>> {
    let changes = payload.validate()?;
    let conn = state.db.get()?;
    if !expenses::update_expense(&conn, user.id, &id, &changes)? {
        return Err(not_found(&id));
    }
    info!(expense_id = %id, user_id = user.id, "Expense updated via API");

    expenses::get_expense(&conn, user.id, &id)?
        .map(Json)
        .ok_or_else(|| not_found(&id))
}

pub async fn delete_expense(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let conn = state.db.get()?;
    if !expenses::delete_expense(&conn, user.id, &id)? {
        return Err(not_found(&id));
    }
    info!(expense_id = %id, user_id = user.id, "Expense deleted via API");
    Ok(StatusCode::NO_CONTENT)
}

fn load_report(
    state: &AppState,
    user: &CurrentUser,
    params: &ReportParams,
) -> AppResult<ReportData> {
    let period = params.period()?;
    let conn = state.db.get()?;
    ReportData::load(&conn, user.id, period)
}

pub async fn category_breakdown(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<ReportParams>,
) -> AppResult<Json<Vec<CategoryShare>>> {
    let data = load_report(&state, &user, &params)?;
    Ok(Json(analytics::category_breakdown(&data.month_expenses())))
}

pub async fn bucket_totals(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<ReportParams>,
) -> AppResult<Json<Vec<BucketTotal>>> {
    let bucket = params.bucket();
    let data = load_report(&state, &user, &params)?;
    Ok(Json(analytics::bucket_totals(&data.bucket_source(bucket), bucket)))
}

#[derive(Debug, Serialize)]
pub struct TrendResponse {
    pub range: &'static str,
    pub points: Vec<TrendPoint>,
    pub average_daily_cents: i64,
}

pub async fn trend(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<ReportParams>,
) -> AppResult<Json<TrendResponse>> {
    let range = params.range();
    let data = load_report(&state, &user, &params)?;
    let points = analytics::trend_series(&data.expenses, range, data.today);
    Ok(Json(TrendResponse {
        range: range.as_str(),
        average_daily_cents: analytics::average_daily(&points),
        points,
    }))
}

pub async fn monthly_change(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<ReportParams>,
) -> AppResult<Json<MonthlyChangeSummary>> {
    let data = load_report(&state, &user, &params)?;
    Ok(Json(analytics::monthly_change_summary(&data.expenses, data.period)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(amount_cents: i64) -> ExpensePayload {
        ExpensePayload {
            title: "Groceries".into(),
            amount_cents,
            category: "food".into(),
            date: "2024-05-02".into(),
            note: Some("".into()),
            currency: None,
        }
    }

    #[test]
    fn test_payload_validation() {
        let expense = payload(4200).validate().unwrap();
        assert_eq!(expense.category, Category::Food);
        assert_eq!(expense.note, None);
        assert!(payload(0).validate().is_err());
        assert!(payload(5_000_000_000_000_000_000).validate().is_err());

        let mut bad_date = payload(100);
        bad_date.date = "05/02/2024".into();
        assert!(bad_date.validate().is_err());
    }

    #[test]
    fn test_query_rejects_bad_dates() {
        let query = ExpenseQuery {
            from: Some("yesterday".into()),
            ..ExpenseQuery::default()
        };
        assert!(query.to_filter(1).is_err());
    }
}
