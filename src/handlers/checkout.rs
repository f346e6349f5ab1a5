use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::Redirect;
use axum::{Extension, Form};
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::AppResult;
use crate::handlers::layout::{redirect_with_error, redirect_with_notice, with_query};
use crate::models::CurrentUser;
use crate::services::checkout::{self, CheckoutOutcome, Plan};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PlanForm {
    #[serde(default)]
    pub plan: String,
}

/// Origin used for the processor's return URLs: the configured public URL,
/// else whatever host the browser used to reach us.
fn request_origin(config: &Config, headers: &HeaderMap) -> String {
    if let Some(url) = &config.public_url {
        return url.clone();
    }
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| config.address());
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("http");
    format!("{}://{}", scheme, host)
}

pub async fn start(
    State(state): State<AppState>,
    user: Option<Extension<CurrentUser>>,
    headers: HeaderMap,
    Form(form): Form<PlanForm>,
) -> AppResult<Redirect> {
    let plan = Plan::from_id(&form.plan);

    let Some(Extension(user)) = user else {
        let target = with_query("/auth?tab=register", "plan", plan.as_str());
        return Ok(Redirect::to(&target));
    };

    let origin = request_origin(&state.config, &headers);
    let outcome = checkout::start_checkout(
        &state.http,
        &state.config.stripe_api_base,
        state.config.stripe_secret_key.as_deref(),
        &user.email,
        plan,
        &origin,
    )
    .await;

    match outcome {
        Ok(CheckoutOutcome::Free) => Ok(redirect_with_notice(
            "/dashboard",
            "You've selected the Free plan",
        )),
        Ok(CheckoutOutcome::Redirect(url)) => {
            info!(user_id = user.id, plan = %plan, "Redirecting to hosted checkout");
            Ok(Redirect::to(&url))
        }
        Err(e) => {
            warn!(user_id = user.id, plan = %plan, error = %e, "Checkout failed");
            Ok(redirect_with_error("/auth", &e.user_message()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_origin_prefers_public_url() {
        let mut config = Config::for_tests();
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("budget.local:7070"));
        assert_eq!(request_origin(&config, &headers), "http://budget.local:7070");

        config.public_url = Some("https://budgetsavvy.example".into());
        assert_eq!(request_origin(&config, &headers), "https://budgetsavvy.example");
    }
}
