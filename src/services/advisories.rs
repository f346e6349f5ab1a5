//! Delayed advisory pop-ups shown on page load.
//!
//! Each advisory is produced only when its preference flag is on. The browser
//! arms one timer per advisory using `delay_ms` and clears them on unload.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::filters;
use crate::models::NotificationPreferences;
use crate::services::preferences::{BudgetStatus, Reminder};

pub const BUDGET_ALERT_DELAY_MS: u64 = 3000;
pub const REMINDER_DELAY_MS: u64 = 5000;
pub const FINANCIAL_TIP_DELAY_MS: u64 = 8000;

/// Usage level at which a budget alert is raised.
pub const BUDGET_WARNING_PERCENT: f64 = 80.0;

const FINANCIAL_TIPS: &[&str] = &[
    "Try the 50/30/20 rule: 50% needs, 30% wants, 20% savings.",
    "Set up an automatic transfer to savings on payday.",
    "Review your subscriptions each month and cancel the ones you don't use.",
    "Aim for an emergency fund covering three to six months of expenses.",
    "Pay down high-interest debt first to save the most on interest.",
    "Wait 24 hours before any non-essential purchase over $50.",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Dashboard,
    Expenses,
    Reports,
    Assistant,
    Settings,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Advisory {
    pub kind: &'static str,
    pub message: String,
    pub delay_ms: u64,
}

/// Inputs the advisories are computed from, already gated by the preference store.
pub struct AdvisoryContext<'a> {
    pub budget: BudgetStatus,
    pub reminders: &'a [Reminder],
    pub currency: &'a str,
    pub today: NaiveDate,
}

pub fn for_page(
    page: Page,
    prefs: &NotificationPreferences,
    ctx: &AdvisoryContext<'_>,
) -> Vec<Advisory> {
    let mut advisories = Vec::new();

    if prefs.budget_alerts && matches!(page, Page::Dashboard | Page::Expenses) {
        if let Some(advisory) = budget_alert(&ctx.budget) {
            advisories.push(advisory);
        }
    }

    if prefs.expense_reminders && matches!(page, Page::Dashboard | Page::Expenses) {
        if let Some(next) = ctx.reminders.first() {
            advisories.push(Advisory {
                kind: "reminder",
                message: format!(
                    "Upcoming: {} ({}) due {}",
                    next.title,
                    filters::format_money(next.amount_cents, ctx.currency),
                    next.due_date.format("%b %-d")
                ),
                delay_ms: REMINDER_DELAY_MS,
            });
        }
    }

    if prefs.financial_tips && matches!(page, Page::Dashboard | Page::Reports | Page::Assistant) {
        advisories.push(Advisory {
            kind: "tip",
            message: format!("Tip: {}", tip_of_the_day(ctx.today)),
            delay_ms: FINANCIAL_TIP_DELAY_MS,
        });
    }

    advisories
}

fn budget_alert(status: &BudgetStatus) -> Option<Advisory> {
    let message = if status.is_over_budget {
        format!(
            "You're over budget: {} of this month's budget used.",
            filters::format_percent(status.percent_used)
        )
    } else if status.percent_used >= BUDGET_WARNING_PERCENT {
        format!(
            "Heads up: {} of this month's budget already used.",
            filters::format_percent(status.percent_used)
        )
    } else {
        return None;
    };

    Some(Advisory {
        kind: "budget",
        message,
        delay_ms: BUDGET_ALERT_DELAY_MS,
    })
}

pub fn tip_of_the_day(today: NaiveDate) -> &'static str {
    FINANCIAL_TIPS[today.ordinal0() as usize % FINANCIAL_TIPS.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 10).unwrap()
    }

    fn ctx<'a>(budget: BudgetStatus, reminders: &'a [Reminder]) -> AdvisoryContext<'a> {
        AdvisoryContext {
            budget,
            reminders,
            currency: "USD",
            today: today(),
        }
    }

    fn over_budget() -> BudgetStatus {
        BudgetStatus {
            is_over_budget: true,
            percent_used: 112.0,
        }
    }

    #[test]
    fn test_no_advisories_when_flags_off() {
        let prefs = NotificationPreferences {
            budget_alerts: false,
            expense_reminders: false,
            financial_tips: false,
            email_notifications: true,
        };
        let reminders = vec![Reminder {
            title: "Rent".into(),
            due_date: today(),
            amount_cents: 120000,
        }];
        assert!(for_page(Page::Dashboard, &prefs, &ctx(over_budget(), &reminders)).is_empty());
    }

    #[test]
    fn test_budget_alert_thresholds() {
        let prefs = NotificationPreferences::default();
        let calm = BudgetStatus {
            is_over_budget: false,
            percent_used: 40.0,
        };
        assert!(for_page(Page::Dashboard, &prefs, &ctx(calm, &[])).is_empty());

        let advisories = for_page(Page::Dashboard, &prefs, &ctx(over_budget(), &[]));
        assert_eq!(advisories.len(), 1);
        assert_eq!(advisories[0].kind, "budget");
        assert_eq!(advisories[0].delay_ms, BUDGET_ALERT_DELAY_MS);
        assert!(advisories[0].message.contains("112.0%"));
    }

    #[test]
    fn test_tips_only_when_enabled_and_on_tip_pages() {
        let prefs = NotificationPreferences {
            financial_tips: true,
            ..NotificationPreferences::default()
        };
        let on_reports = for_page(Page::Reports, &prefs, &ctx(BudgetStatus::none(), &[]));
        assert_eq!(on_reports.len(), 1);
        assert_eq!(on_reports[0].kind, "tip");

        assert!(for_page(Page::Settings, &prefs, &ctx(BudgetStatus::none(), &[])).is_empty());
    }

    #[test]
    fn test_reminder_message() {
        let reminders = vec![Reminder {
            title: "Phone Bill".into(),
            due_date: NaiveDate::from_ymd_opt(2024, 4, 25).unwrap(),
            amount_cents: 4599,
        }];
        let advisories = for_page(
            Page::Expenses,
            &NotificationPreferences::default(),
            &ctx(BudgetStatus::none(), &reminders),
        );
        assert_eq!(advisories[0].message, "Upcoming: Phone Bill ($45.99) due Apr 25");
    }
}
