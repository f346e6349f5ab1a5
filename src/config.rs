use std::env;
use std::path::PathBuf;

use crate::form_utils::parse_amount_cents;

pub const DEFAULT_MONTHLY_BUDGET_CENTS: i64 = 300_000;
pub const DEFAULT_ASSISTANT_DELAY_MS: u64 = 1000;
pub const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub migrations_path: PathBuf,
    pub static_path: PathBuf,
    /// Budget used for the dashboard usage bar and budget alerts.
    pub monthly_budget_cents: i64,
    /// Currency shown until a user picks their own.
    pub default_currency: String,
    /// Artificial "thinking" pause before the assistant replies.
    pub assistant_delay_ms: u64,
    pub stripe_secret_key: Option<String>,
    pub stripe_api_base: String,
    /// Externally visible origin used for checkout return URLs.
    pub public_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            host: env::var("BUDGET_SAVVY_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("BUDGET_SAVVY_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(7070),
            database_path: env::var("BUDGET_SAVVY_DATABASE_URL")
                .map(|v| {
                    PathBuf::from(
                        v.strip_prefix("sqlite://")
                            .or_else(|| v.strip_prefix("sqlite:"))
                            .unwrap_or(&v),
                    )
                })
                .unwrap_or_else(|_| PathBuf::from("data/budget-savvy.db")),
            migrations_path: env::var("BUDGET_SAVVY_MIGRATIONS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("migrations")),
            static_path: env::var("BUDGET_SAVVY_STATIC_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("static")),
            monthly_budget_cents: env::var("BUDGET_SAVVY_MONTHLY_BUDGET")
                .ok()
                .and_then(|v| parse_amount_cents(&v).ok())
                .filter(|cents| *cents > 0)
                .unwrap_or(DEFAULT_MONTHLY_BUDGET_CENTS),
            default_currency: env::var("BUDGET_SAVVY_CURRENCY")
                .ok()
                .filter(|c| c.len() == 3)
                .map(|c| c.to_ascii_uppercase())
                .unwrap_or_else(|| "USD".into()),
            assistant_delay_ms: env::var("BUDGET_SAVVY_ASSISTANT_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_ASSISTANT_DELAY_MS),
            stripe_secret_key: env::var("STRIPE_SECRET_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            stripe_api_base: env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| DEFAULT_STRIPE_API_BASE.into()),
            public_url: env::var("BUDGET_SAVVY_PUBLIC_URL")
                .ok()
                .filter(|u| !u.trim().is_empty())
                .map(|u| u.trim_end_matches('/').to_string()),
        }
    }

    /// Defaults suitable for tests: in-memory database, no payment key, no assistant delay.
    pub fn for_tests() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 7070,
            database_path: PathBuf::from(":memory:"),
            migrations_path: PathBuf::from("migrations"),
            static_path: PathBuf::from("static"),
            monthly_budget_cents: DEFAULT_MONTHLY_BUDGET_CENTS,
            default_currency: "USD".into(),
            assistant_delay_ms: 0,
            stripe_secret_key: None,
            stripe_api_base: DEFAULT_STRIPE_API_BASE.into(),
            public_url: None,
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
