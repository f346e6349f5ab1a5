pub mod api;
pub mod assistant;
pub mod checkout;
pub mod dashboard;
pub mod expenses;
pub mod landing;
pub mod layout;
pub mod reports;
pub mod settings;

use axum::routing::{get, post};
use axum::Router;

use crate::auth;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        // Public pages
        .route("/", get(landing::index))
        .route("/auth", get(auth::auth_page))
        .route("/auth/login", post(auth::login_submit))
        .route("/auth/register", post(auth::register_submit))
        .route("/auth/logout", post(auth::logout))
        .route("/checkout", post(checkout::start))
        // Pages
        .route("/dashboard", get(dashboard::index))
        .route("/expenses", get(expenses::index).post(expenses::create))
        .route("/reports", get(reports::index))
        .route("/assistant", get(assistant::index).post(assistant::ask))
        .route("/settings", get(settings::index))
        // Expense CRUD
        .route("/expenses/:id/edit", get(expenses::edit_form))
        .route("/expenses/:id", post(expenses::update))
        .route("/expenses/:id/delete", post(expenses::delete))
        // Reports
        .route("/reports/download", get(reports::download))
        // Settings
        .route("/settings/notifications", post(settings::update_notification))
        .route("/settings/security", post(settings::update_security))
        .route("/settings/currency", post(settings::update_currency))
        .route("/settings/password", post(auth::update_password))
        // API (JSON)
        .route("/api/session", get(auth::session_info))
        .route("/api/assistant", post(assistant::api_ask))
        .route("/api/preferences", get(settings::api_preferences))
        .route(
            "/api/preferences/notifications",
            post(settings::api_update_notification),
        )
        .route(
            "/api/preferences/security",
            post(settings::api_update_security),
        )
        .route(
            "/api/expenses",
            get(api::list_expenses).post(api::create_expense),
        )
        .route(
            "/api/expenses/:id",
            get(api::get_expense)
                .put(api::update_expense)
                .delete(api::delete_expense),
        )
        .route("/api/reports/categories", get(api::category_breakdown))
        .route("/api/reports/buckets", get(api::bucket_totals))
        .route("/api/reports/trend", get(api::trend))
        .route("/api/reports/monthly-change", get(api::monthly_change))
        // Health check
        .route("/health", get(health))
}

async fn health() -> &'static str {
    "OK"
}
