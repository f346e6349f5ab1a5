//! Subscription checkout through Stripe's REST API.
//!
//! The free plan never touches the processor. Paid plans look up (or create)
//! a customer for the user's email and open a hosted checkout session whose
//! URL the browser is redirected to.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};

const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Plan {
    #[default]
    Free,
    Premium,
    Family,
}

impl Plan {
    pub fn all() -> &'static [Plan] {
        &[Plan::Free, Plan::Premium, Plan::Family]
    }

    /// Unknown plan ids fall back to the free plan.
    pub fn from_id(id: &str) -> Self {
        id.parse().unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Premium => "premium",
            Plan::Family => "family",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Plan::Free => "Free",
            Plan::Premium => "Premium",
            Plan::Family => "Family",
        }
    }

    /// Monthly price in USD cents.
    pub fn price_cents(&self) -> i64 {
        match self {
            Plan::Free => 0,
            Plan::Premium => 999,
            Plan::Family => 1999,
        }
    }

    pub fn is_paid(&self) -> bool {
        self.price_cents() > 0
    }

    pub fn product_name(&self) -> &'static str {
        match self {
            Plan::Free => "Budget Savvy Free",
            Plan::Premium => "Budget Savvy Premium",
            Plan::Family => "Budget Savvy Family",
        }
    }

    pub fn product_description(&self) -> Option<&'static str> {
        match self {
            Plan::Free => None,
            Plan::Premium => Some("Advanced expense analytics, unlimited reports, and more"),
            Plan::Family => {
                Some("Everything in Premium plus family budget planning for up to 5 users")
            }
        }
    }

    pub fn tagline(&self) -> &'static str {
        match self {
            Plan::Free => "Perfect for individuals just getting started with budgeting",
            Plan::Premium => "Ideal for individuals serious about financial growth",
            Plan::Family => "Perfect for managing household finances together",
        }
    }

    pub fn features(&self) -> &'static [&'static str] {
        match self {
            Plan::Free => &[
                "Basic expense tracking",
                "Limited monthly reports",
                "2 financial accounts",
                "Email support",
            ],
            Plan::Premium => &[
                "Advanced expense analytics",
                "Unlimited custom reports",
                "Unlimited financial accounts",
                "Budget automation",
                "Priority support",
            ],
            Plan::Family => &[
                "Everything in Premium",
                "Up to 5 user accounts",
                "Family budget planning",
                "Shared expense tracking",
                "Financial goal collaboration",
            ],
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Plan::Free),
            "premium" => Ok(Plan::Premium),
            "family" => Ok(Plan::Family),
            other => Err(format!("Unknown plan: {}", other)),
        }
    }
}

/// Result of choosing a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// Nothing to pay; the user goes straight to the dashboard.
    Free,
    /// Hosted payment page to redirect to.
    Redirect(String),
}

#[derive(Debug, Deserialize)]
struct CustomerList {
    data: Vec<Customer>,
}

#[derive(Debug, Deserialize)]
struct Customer {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CheckoutSession {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

pub struct StripeClient<'a> {
    http: &'a Client,
    api_base: &'a str,
    secret_key: &'a str,
}

impl<'a> StripeClient<'a> {
    pub fn new(http: &'a Client, api_base: &'a str, secret_key: &'a str) -> Self {
        Self {
            http,
            api_base: api_base.trim_end_matches('/'),
            secret_key,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    /// Id of the customer registered under `email`, creating one if needed.
    pub async fn find_or_create_customer(&self, email: &str) -> AppResult<String> {
        let response = self
            .http
            .get(self.url("/v1/customers"))
            .bearer_auth(self.secret_key)
            .query(&[("email", email), ("limit", "1")])
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .send()
            .await
            .map_err(request_failed)?;
        let existing: CustomerList = parse_response(response).await?;

        if let Some(customer) = existing.data.into_iter().next() {
            debug!(customer_id = %customer.id, "Reusing existing customer");
            return Ok(customer.id);
        }

        let response = self
            .http
            .post(self.url("/v1/customers"))
            .bearer_auth(self.secret_key)
            .form(&[("email", email)])
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .send()
            .await
            .map_err(request_failed)?;
        let created: Customer = parse_response(response).await?;
        info!(customer_id = %created.id, "Created customer");
        Ok(created.id)
    }

    pub async fn create_session(
        &self,
        customer_id: &str,
        plan: Plan,
        origin: &str,
    ) -> AppResult<String> {
        let params = session_params(customer_id, plan, origin);
        let response = self
            .http
            .post(self.url("/v1/checkout/sessions"))
            .bearer_auth(self.secret_key)
            .form(&params)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .send()
            .await
            .map_err(request_failed)?;
        let session: CheckoutSession = parse_response(response).await?;

        session
            .url
            .ok_or_else(|| AppError::Payment("No checkout URL returned".into()))
    }
}

fn request_failed(e: reqwest::Error) -> AppError {
    warn!(error = %e, "Payment processor request failed");
    AppError::Payment("Failed to process payment".into())
}

async fn parse_response<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> AppResult<T> {
    let status = response.status();
    if !status.is_success() {
        let message = response
            .json::<StripeErrorBody>()
            .await
            .ok()
            .and_then(|body| body.error.message)
            .unwrap_or_else(|| "Failed to process payment".to_string());
        warn!(status = %status, message = %message, "Payment processor rejected request");
        return Err(AppError::Payment(message));
    }

    response.json::<T>().await.map_err(|e| {
        warn!(error = %e, "Unexpected payment processor response");
        AppError::Payment("Failed to process payment".into())
    })
}

/// Form fields for a monthly subscription checkout session.
pub fn session_params(customer_id: &str, plan: Plan, origin: &str) -> Vec<(String, String)> {
    let origin = origin.trim_end_matches('/');
    let item = "line_items[0]";
    let price = format!("{}[price_data]", item);

    let mut params = vec![
        ("customer".to_string(), customer_id.to_string()),
        ("mode".to_string(), "subscription".to_string()),
        ("payment_method_types[0]".to_string(), "card".to_string()),
        (format!("{}[quantity]", item), "1".to_string()),
        (format!("{}[currency]", price), "usd".to_string()),
        (format!("{}[unit_amount]", price), plan.price_cents().to_string()),
        (format!("{}[recurring][interval]", price), "month".to_string()),
        (
            format!("{}[product_data][name]", price),
            plan.product_name().to_string(),
        ),
    ];
    if let Some(description) = plan.product_description() {
        params.push((
            format!("{}[product_data][description]", price),
            description.to_string(),
        ));
    }
    params.push((
        "success_url".to_string(),
        format!("{}/dashboard?payment=success", origin),
    ));
    params.push((
        "cancel_url".to_string(),
        format!("{}/?payment=canceled", origin),
    ));
    params
}

/// Start checkout for `plan` on behalf of `email`.
pub async fn start_checkout(
    http: &Client,
    api_base: &str,
    secret_key: Option<&str>,
    email: &str,
    plan: Plan,
    origin: &str,
) -> AppResult<CheckoutOutcome> {
    if !plan.is_paid() {
        return Ok(CheckoutOutcome::Free);
    }

    let secret_key = secret_key.ok_or_else(|| {
        warn!("STRIPE_SECRET_KEY is not set");
        AppError::Payment("Stripe configuration error".into())
    })?;

    let client = StripeClient::new(http, api_base, secret_key);
    let customer_id = client.find_or_create_customer(email).await?;
    let url = client.create_session(&customer_id, plan, origin).await?;
    info!(plan = %plan, "Checkout session created");
    Ok(CheckoutOutcome::Redirect(url))
}
