//! Per-user notification, security and currency preferences.
//!
//! A [`PreferenceStore`] is opened over a [`PreferenceStorage`] backend, reads
//! both records once, and writes the full record back after every update.
//! Persistence failures never reach the caller: the in-memory state is
//! authoritative for the rest of the request and the failure is logged.

use chrono::{Datelike, NaiveDate};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::date_utils::MonthPeriod;
use crate::db::queries::preferences as queries;
use crate::models::{
    Category, Expense, NotificationKey, NotificationPreferences, SecurityKey, SecurityPreferences,
};

pub const NOTIFICATION_KEY: &str = "notificationPreferences";
pub const SECURITY_KEY: &str = "securityPreferences";
pub const CURRENCY_KEY: &str = "currency";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Key-value persistence for serialized preference records.
pub trait PreferenceStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn save(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Rows in the `preferences` table belonging to one user.
pub struct SqliteStorage<'a> {
    conn: &'a Connection,
    user_id: i64,
}

impl<'a> SqliteStorage<'a> {
    pub fn new(conn: &'a Connection, user_id: i64) -> Self {
        Self { conn, user_id }
    }
}

impl PreferenceStorage for SqliteStorage<'_> {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(queries::get_preference(self.conn, self.user_id, key)?)
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        Ok(queries::set_preference(self.conn, self.user_id, key, value)?)
    }
}

/// In-process storage. Clones share the same map.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    values: Arc<Mutex<HashMap<String, String>>>,
    fail_writes: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that accepts reads but rejects every write.
    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }
}

impl PreferenceStorage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.get(key))
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::Unavailable("writes disabled".into()));
        }
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BudgetStatus {
    pub is_over_budget: bool,
    pub percent_used: f64,
}

impl BudgetStatus {
    pub fn none() -> Self {
        Self {
            is_over_budget: false,
            percent_used: 0.0,
        }
    }
}

/// A recurring bill expected again before the end of the current month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reminder {
    pub title: String,
    pub due_date: NaiveDate,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Badge {
    pub label: &'static str,
    pub tone: &'static str,
}

const BILL_CATEGORIES: &[Category] = &[Category::Rent, Category::Housing, Category::Utilities];
const MAX_REMINDERS: usize = 3;

pub struct PreferenceStore<S: PreferenceStorage> {
    storage: S,
    notifications: NotificationPreferences,
    security: SecurityPreferences,
    currency: String,
}

impl<S: PreferenceStorage> PreferenceStore<S> {
    /// Load both records. Missing, unreadable or malformed records fall back to defaults.
    pub fn open(storage: S, default_currency: &str) -> Self {
        let notifications = load_record(&storage, NOTIFICATION_KEY).unwrap_or_default();
        let security = load_record(&storage, SECURITY_KEY).unwrap_or_default();
        let currency = load_record::<String, S>(&storage, CURRENCY_KEY)
            .filter(|c| c.len() == 3)
            .unwrap_or_else(|| default_currency.to_string());

        Self {
            storage,
            notifications,
            security,
            currency,
        }
    }

    pub fn notifications(&self) -> NotificationPreferences {
        self.notifications
    }

    pub fn security(&self) -> SecurityPreferences {
        self.security
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn update_notification(&mut self, key: NotificationKey, value: bool) -> NotificationPreferences {
        self.notifications.set(key, value);
        self.persist(NOTIFICATION_KEY, &self.notifications);
        self.notifications
    }

    pub fn update_security(&mut self, key: SecurityKey, value: bool) -> SecurityPreferences {
        self.security.set(key, value);
        self.persist(SECURITY_KEY, &self.security);
        self.security
    }

    pub fn update_currency(&mut self, code: &str) -> String {
        self.currency = code.to_ascii_uppercase();
        self.persist(CURRENCY_KEY, &self.currency);
        self.currency.clone()
    }

    /// Budget usage, or an all-clear when budget alerts are switched off.
    pub fn budget_status(&self, spent_cents: i64, budget_cents: i64) -> BudgetStatus {
        if !self.notifications.budget_alerts || budget_cents <= 0 {
            return BudgetStatus::none();
        }
        let percent_used = spent_cents as f64 / budget_cents as f64 * 100.0;
        BudgetStatus {
            is_over_budget: percent_used > 100.0,
            percent_used,
        }
    }

    /// Bills paid last month that fall due again between `today` and month end.
    /// Empty when expense reminders are switched off.
    pub fn upcoming_reminders(&self, expenses: &[Expense], today: NaiveDate) -> Vec<Reminder> {
        if !self.notifications.expense_reminders {
            return Vec::new();
        }

        let this_month = MonthPeriod::containing(today);
        let last_month = this_month.prev();
        let end = this_month.end();

        let mut reminders: Vec<Reminder> = expenses
            .iter()
            .filter(|e| last_month.contains(e.date) && BILL_CATEGORIES.contains(&e.category))
            .filter_map(|e| {
                let day = e.date.day().min(end.day());
                let due_date = NaiveDate::from_ymd_opt(this_month.year, this_month.month, day)?;
                (due_date >= today).then(|| Reminder {
                    title: e.title.clone(),
                    due_date,
                    amount_cents: e.amount_cents,
                })
            })
            .collect();

        reminders.sort_by_key(|r| r.due_date);
        reminders.truncate(MAX_REMINDERS);
        reminders
    }

    pub fn requires_two_factor(&self) -> bool {
        self.security.two_factor
    }

    /// Status badges for every active flag.
    pub fn active_badges(&self) -> Vec<Badge> {
        let mut badges = Vec::new();
        if self.notifications.budget_alerts {
            badges.push(Badge {
                label: "Budget alerts active",
                tone: "green",
            });
        }
        if self.notifications.expense_reminders {
            badges.push(Badge {
                label: "Expense reminders active",
                tone: "blue",
            });
        }
        if self.notifications.financial_tips {
            badges.push(Badge {
                label: "Financial tips active",
                tone: "purple",
            });
        }
        if self.security.two_factor {
            badges.push(Badge {
                label: "Two-factor authentication enabled",
                tone: "amber",
            });
        }
        badges
    }

    fn persist<T: Serialize>(&self, key: &str, record: &T) {
        let result = serde_json::to_string(record)
            .map_err(|e| StorageError::Unavailable(e.to_string()))
            .and_then(|json| self.storage.save(key, &json));

        if let Err(e) = result {
            tracing::warn!(key, error = %e, "Failed to persist preferences");
        }
    }
}

fn load_record<T, S>(storage: &S, key: &str) -> Option<T>
where
    T: serde::de::DeserializeOwned,
    S: PreferenceStorage,
{
    match storage.load(key) {
        Ok(Some(json)) => match serde_json::from_str(&json) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(key, error = %e, "Ignoring malformed preference record");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(key, error = %e, "Failed to load preferences");
            None
        }
    }
}
