use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreferences {
    pub budget_alerts: bool,
    pub expense_reminders: bool,
    pub financial_tips: bool,
    pub email_notifications: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            budget_alerts: true,
            expense_reminders: true,
            financial_tips: false,
            email_notifications: true,
        }
    }
}

impl NotificationPreferences {
    pub fn get(&self, key: NotificationKey) -> bool {
        match key {
            NotificationKey::BudgetAlerts => self.budget_alerts,
            NotificationKey::ExpenseReminders => self.expense_reminders,
            NotificationKey::FinancialTips => self.financial_tips,
            NotificationKey::EmailNotifications => self.email_notifications,
        }
    }

    pub fn set(&mut self, key: NotificationKey, value: bool) {
        match key {
            NotificationKey::BudgetAlerts => self.budget_alerts = value,
            NotificationKey::ExpenseReminders => self.expense_reminders = value,
            NotificationKey::FinancialTips => self.financial_tips = value,
            NotificationKey::EmailNotifications => self.email_notifications = value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityPreferences {
    pub two_factor: bool,
}

impl SecurityPreferences {
    pub fn get(&self, key: SecurityKey) -> bool {
        match key {
            SecurityKey::TwoFactor => self.two_factor,
        }
    }

    pub fn set(&mut self, key: SecurityKey, value: bool) {
        match key {
            SecurityKey::TwoFactor => self.two_factor = value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKey {
    BudgetAlerts,
    ExpenseReminders,
    FinancialTips,
    EmailNotifications,
}

impl NotificationKey {
    pub fn all() -> &'static [NotificationKey] {
        &[
            Self::BudgetAlerts,
            Self::ExpenseReminders,
            Self::FinancialTips,
            Self::EmailNotifications,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BudgetAlerts => "budget_alerts",
            Self::ExpenseReminders => "expense_reminders",
            Self::FinancialTips => "financial_tips",
            Self::EmailNotifications => "email_notifications",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::BudgetAlerts => "Budget Alerts",
            Self::ExpenseReminders => "Expense Reminders",
            Self::FinancialTips => "Financial Tips",
            Self::EmailNotifications => "Email Notifications",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::BudgetAlerts => "Get notified when you're close to your budget limit",
            Self::ExpenseReminders => "Receive reminders about upcoming expenses",
            Self::FinancialTips => "Get personalized tips to improve your finances",
            Self::EmailNotifications => "Receive a weekly summary by email",
        }
    }
}

impl FromStr for NotificationKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "budget_alerts" | "budgetAlerts" => Ok(Self::BudgetAlerts),
            "expense_reminders" | "expenseReminders" => Ok(Self::ExpenseReminders),
            "financial_tips" | "financialTips" => Ok(Self::FinancialTips),
            "email_notifications" | "emailNotifications" => Ok(Self::EmailNotifications),
            other => Err(format!("Unknown notification preference: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityKey {
    TwoFactor,
}

impl SecurityKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TwoFactor => "two_factor",
        }
    }
}

impl FromStr for SecurityKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "two_factor" | "twoFactor" => Ok(Self::TwoFactor),
            other => Err(format!("Unknown security preference: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_defaults() {
        let prefs = NotificationPreferences::default();
        assert!(prefs.budget_alerts);
        assert!(prefs.expense_reminders);
        assert!(!prefs.financial_tips);
        assert!(prefs.email_notifications);
        assert!(!SecurityPreferences::default().two_factor);
    }

    #[test]
    fn test_storage_format_uses_camel_case_keys() {
        let json = serde_json::to_string(&NotificationPreferences::default()).unwrap();
        assert!(json.contains("\"budgetAlerts\":true"));
        assert!(json.contains("\"financialTips\":false"));
    }

    #[test]
    fn test_keys_accept_both_spellings() {
        assert_eq!(
            "expenseReminders".parse::<NotificationKey>(),
            Ok(NotificationKey::ExpenseReminders)
        );
        assert_eq!("two_factor".parse::<SecurityKey>(), Ok(SecurityKey::TwoFactor));
        assert!("dark_mode".parse::<NotificationKey>().is_err());
    }
}
