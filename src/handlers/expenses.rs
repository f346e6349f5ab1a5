use askama::Template;
use axum::extract::{Path, Query, State};
use axum::response::{Html, Redirect};
use axum::{Extension, Form};
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::date_utils::{parse_date, today};
use crate::db::queries::expenses::{self, ExpenseFilter};
use crate::error::{AppError, AppResult, RenderHtml};
use crate::filters;
use crate::form_utils::{
    deserialize_optional_string, non_empty, parse_amount_cents, parse_currency, validate_amount_cents,
};
use crate::handlers::layout::{page_layout, redirect_with_error, redirect_with_notice, Flash, Layout};
use crate::models::{Category, CurrentUser, Expense, NewExpense};
use crate::services::advisories::Page;
use crate::state::AppState;

const REQUIRED_FIELDS: &str = "Please fill out all required fields";
const SAVE_FAILED: &str = "Failed to save expense. Please try again.";

/// An expense as displayed in the list.
pub struct ExpenseRow {
    pub id: String,
    pub title: String,
    pub category: Category,
    pub date: String,
    pub date_display: String,
    pub amount: String,
    pub note: String,
}

impl ExpenseRow {
    pub fn new(expense: &Expense, currency: &str) -> Self {
        Self {
            id: expense.id.clone(),
            title: expense.title.clone(),
            category: expense.category,
            date: expense.date.to_string(),
            date_display: expense.date_display(),
            amount: expense.amount_formatted(currency),
            note: expense.note_text().to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "pages/expenses.html")]
pub struct ExpensesTemplate {
    pub layout: Layout,
    pub rows: Vec<ExpenseRow>,
    pub search: String,
    pub category: String,
    pub categories: &'static [Category],
    pub total: String,
    pub count: usize,
    pub form: ExpenseFormData,
}

#[derive(Template)]
#[template(path = "pages/expense_edit.html")]
pub struct ExpenseEditTemplate {
    pub layout: Layout,
    pub id: String,
    pub categories: &'static [Category],
    pub form: ExpenseFormData,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExpenseListParams {
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub search: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub category: Option<String>,
}

/// Raw expense form fields. Every field is optional at the HTTP level so a
/// half-filled form reaches validation instead of failing extraction.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ExpenseFormData {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub currency: String,
}

impl ExpenseFormData {
    fn blank() -> Self {
        Self {
            category: Category::Food.as_str().to_string(),
            date: today().to_string(),
            ..Self::default()
        }
    }

    fn from_expense(expense: &Expense) -> Self {
        Self {
            title: expense.title.clone(),
            amount: filters::format_plain(expense.amount_cents),
            category: expense.category.as_str().to_string(),
            date: expense.date.to_string(),
            note: expense.note_text().to_string(),
            currency: expense.currency.clone().unwrap_or_default(),
        }
    }

    pub fn is_category(&self, category: &Category) -> bool {
        self.category == category.as_str()
    }

    pub fn to_new_expense(&self) -> Result<NewExpense, AppError> {
        let title = self.title.trim();
        if title.is_empty()
            || self.amount.trim().is_empty()
            || self.category.trim().is_empty()
            || self.date.trim().is_empty()
        {
            return Err(AppError::Validation(REQUIRED_FIELDS.into()));
        }

        let amount_cents = validate_amount_cents(parse_amount_cents(&self.amount)?)?;
        let category: Category = self.category.parse().map_err(AppError::Validation)?;
        let date = parse_date(&self.date)
            .ok_or_else(|| AppError::Validation(format!("Invalid date: {}", self.date.trim())))?;

        Ok(NewExpense {
            title: title.to_string(),
            amount_cents,
            category,
            date,
            note: non_empty(Some(&self.note)),
            currency: parse_currency(Some(&self.currency))?,
        })
    }
}

/// Failures on form posts come back as a toast on the expenses page.
fn form_failure(target: &str, err: AppError) -> AppResult<Redirect> {
    match err {
        AppError::Validation(message) => Ok(redirect_with_error(target, &message)),
        AppError::NotFound(_) => Err(err),
        other => {
            error!(error = %other, "Expense write failed");
            Ok(redirect_with_error(target, SAVE_FAILED))
        }
    }
}

pub async fn index(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<ExpenseListParams>,
    Query(flash): Query<Flash>,
) -> AppResult<Html<String>> {
    let conn = state.db.get()?;
    let (layout, prefs) = page_layout(&conn, &state.config, &user, Page::Expenses, "Expenses", flash)?;

    let filter = ExpenseFilter {
        search: params.search.clone(),
        category: params.category.as_deref().and_then(|c| c.parse().ok()),
        ..ExpenseFilter::for_user(user.id)
    };
    let list = expenses::list_expenses(&conn, &filter)?;
    let total_cents: i64 = list.iter().map(|e| e.amount_cents).sum();
    debug!(user_id = user.id, count = list.len(), "Loaded expenses");

    let currency = prefs.currency().to_string();
    let template = ExpensesTemplate {
        layout,
        rows: list.iter().map(|e| ExpenseRow::new(e, &currency)).collect(),
        search: params.search.unwrap_or_default(),
        category: params.category.unwrap_or_default(),
        categories: Category::all(),
        total: filters::format_money(total_cents, &currency),
        count: list.len(),
        form: ExpenseFormData::blank(),
    };
    template.render_html()
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Form(form): Form<ExpenseFormData>,
) -> AppResult<Redirect> {
    debug!(title = %form.title, amount = %form.amount, "Creating expense");
    let new_expense = match form.to_new_expense() {
        Ok(e) => e,
        Err(e) => return form_failure("/expenses", e),
    };

    let conn = state.db.get()?;
    match expenses::create_expense(&conn, user.id, &new_expense) {
        Ok(id) => {
            info!(expense_id = %id, user_id = user.id, "Expense created via web form");
            Ok(redirect_with_notice("/expenses", "Expense added successfully!"))
        }
        Err(e) => form_failure("/expenses", e.into()),
    }
}

pub async fn edit_form(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Query(flash): Query<Flash>,
) -> AppResult<Html<String>> {
    let conn = state.db.get()?;
    let expense = expenses::get_expense(&conn, user.id, &id)?
        .ok_or_else(|| AppError::NotFound(format!("Expense {} not found", id)))?;

    let (layout, _) = page_layout(&conn, &state.config, &user, Page::Expenses, "Edit Expense", flash)?;
    let template = ExpenseEditTemplate {
        layout,
        id: expense.id.clone(),
        categories: Category::all(),
        form: ExpenseFormData::from_expense(&expense),
    };
    template.render_html()
}

pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Form(form): Form<ExpenseFormData>,
) -> AppResult<Redirect> {
    debug!(expense_id = %id, "Updating expense");
    let back = format!("/expenses/{}/edit", id);
    let changes = match form.to_new_expense() {
        Ok(e) => e,
        Err(e) => return form_failure(&back, e),
    };

    let conn = state.db.get()?;
    match expenses::update_expense(&conn, user.id, &id, &changes) {
        Ok(true) => {
            info!(expense_id = %id, user_id = user.id, "Expense updated via web form");
            Ok(redirect_with_notice("/expenses", "Expense updated successfully!"))
        }
        Ok(false) => Err(AppError::NotFound(format!("Expense {} not found", id))),
        Err(e) => form_failure(&back, e.into()),
    }
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<Redirect> {
    info!(expense_id = %id, user_id = user.id, "Deleting expense");
    let conn = state.db.get()?;

    if !expenses::delete_expense(&conn, user.id, &id)? {
        return Err(AppError::NotFound(format!("Expense {} not found", id)));
    }
    Ok(redirect_with_notice("/expenses", "Expense deleted successfully"))
}
