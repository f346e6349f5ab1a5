use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::filters;

/// The fixed set of spending categories an expense can be filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Food,
    Transportation,
    Entertainment,
    Shopping,
    Housing,
    Rent,
    Utilities,
    Healthcare,
    Education,
    Travel,
    Coffee,
    Groceries,
    Electronics,
    Other,
}

impl Category {
    pub fn all() -> &'static [Category] {
        &[
            Self::Food,
            Self::Transportation,
            Self::Entertainment,
            Self::Shopping,
            Self::Housing,
            Self::Rent,
            Self::Utilities,
            Self::Healthcare,
            Self::Education,
            Self::Travel,
            Self::Coffee,
            Self::Groceries,
            Self::Electronics,
            Self::Other,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Food => "Food",
            Self::Transportation => "Transportation",
            Self::Entertainment => "Entertainment",
            Self::Shopping => "Shopping",
            Self::Housing => "Housing",
            Self::Rent => "Rent",
            Self::Utilities => "Utilities",
            Self::Healthcare => "Healthcare",
            Self::Education => "Education",
            Self::Travel => "Travel",
            Self::Coffee => "Coffee",
            Self::Groceries => "Groceries",
            Self::Electronics => "Electronics",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::all()
            .iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(needle))
            .copied()
            .ok_or_else(|| format!("Unknown category: {}", needle))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub id: String,
    pub user_id: i64,
    pub title: String,
    pub amount_cents: i64,
    pub category: Category,
    pub date: NaiveDate,
    pub note: Option<String>,
    pub currency: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Expense {
    /// Currency code for display, falling back to the user's preferred one.
    pub fn currency_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.currency.as_deref().unwrap_or(fallback)
    }

    pub fn amount_formatted(&self, fallback_currency: &str) -> String {
        filters::format_money(self.amount_cents, self.currency_or(fallback_currency))
    }

    pub fn date_display(&self) -> String {
        self.date.format("%b %-d, %Y").to_string()
    }

    pub fn note_text(&self) -> &str {
        self.note.as_deref().unwrap_or("")
    }
}

/// Validated input for creating or replacing an expense.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExpense {
    pub title: String,
    pub amount_cents: i64,
    pub category: Category,
    pub date: NaiveDate,
    pub note: Option<String>,
    pub currency: Option<String>,
}
