//! Aggregations over a user's expenses: category totals, time buckets,
//! trend lines and month-over-month change.
//!
//! Everything here is pure and works in integer cents, so sums never drift.
//! Callers are expected to have filtered the input to the period they care about.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use crate::date_utils::{MonthPeriod, TrendRange};
use crate::models::{Category, Expense};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpendingSummary {
    pub total_cents: i64,
    pub transaction_count: usize,
    pub average_cents: i64,
    pub max_transaction_cents: i64,
    pub min_transaction_cents: i64,
}

impl SpendingSummary {
    pub fn from_expenses(expenses: &[Expense]) -> Self {
        if expenses.is_empty() {
            return Self {
                total_cents: 0,
                transaction_count: 0,
                average_cents: 0,
                max_transaction_cents: 0,
                min_transaction_cents: 0,
            };
        }

        let total_cents: i64 = expenses.iter().map(|e| e.amount_cents).sum();
        let transaction_count = expenses.len();

        Self {
            total_cents,
            transaction_count,
            average_cents: total_cents / transaction_count as i64,
            max_transaction_cents: expenses.iter().map(|e| e.amount_cents).max().unwrap_or(0),
            min_transaction_cents: expenses.iter().map(|e| e.amount_cents).min().unwrap_or(0),
        }
    }
}

pub fn category_totals(expenses: &[Expense]) -> HashMap<Category, i64> {
    let mut totals = HashMap::new();
    for expense in expenses {
        *totals.entry(expense.category).or_insert(0) += expense.amount_cents;
    }
    totals
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    pub category: Category,
    pub count: usize,
    pub total_cents: i64,
}

/// One summary per category, in order of each category's first appearance.
pub fn category_summaries(expenses: &[Expense]) -> Vec<CategorySummary> {
    let mut summaries: Vec<CategorySummary> = Vec::new();
    for expense in expenses {
        match summaries.iter_mut().find(|s| s.category == expense.category) {
            Some(summary) => {
                summary.count += 1;
                summary.total_cents += expense.amount_cents;
            }
            None => summaries.push(CategorySummary {
                category: expense.category,
                count: 1,
                total_cents: expense.amount_cents,
            }),
        }
    }
    summaries
}

/// Category with the largest total. Ties keep the earlier entry.
pub fn top_category(summaries: &[CategorySummary]) -> Option<&CategorySummary> {
    summaries.iter().fold(None, |best, s| match best {
        Some(b) if b.total_cents >= s.total_cents => Some(b),
        _ => Some(s),
    })
}

/// Category with the most transactions. Ties keep the earlier entry.
pub fn most_frequent_category(summaries: &[CategorySummary]) -> Option<&CategorySummary> {
    summaries.iter().fold(None, |best, s| match best {
        Some(b) if b.count >= s.count => Some(b),
        _ => Some(s),
    })
}

/// Share of `part` in `total` as a percentage; 0 when there is nothing to share.
pub fn percentage_of_total(part: i64, total: i64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryShare {
    pub category: Category,
    pub count: usize,
    pub total_cents: i64,
    pub percentage: f64,
}

/// Category shares of the overall total, largest first.
pub fn category_breakdown(expenses: &[Expense]) -> Vec<CategoryShare> {
    let summaries = category_summaries(expenses);
    let total: i64 = summaries.iter().map(|s| s.total_cents).sum();

    let mut shares: Vec<CategoryShare> = summaries
        .into_iter()
        .map(|s| CategoryShare {
            category: s.category,
            count: s.count,
            total_cents: s.total_cents,
            percentage: percentage_of_total(s.total_cents, total),
        })
        .collect();

    // stable: equal totals keep first-appearance order
    shares.sort_by(|a, b| b.total_cents.cmp(&a.total_cents));
    shares
}

/// Grouping unit for the spending bar chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bucket {
    Day,
    Week,
    #[default]
    Month,
}

impl Bucket {
    pub fn all() -> &'static [Bucket] {
        &[Self::Day, Self::Week, Self::Month]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "daily",
            Self::Week => "weekly",
            Self::Month => "monthly",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Day => "Daily",
            Self::Week => "Weekly",
            Self::Month => "Monthly",
        }
    }

    /// Chronological sort key: day of month, ISO year and week as
    /// `yyyyww`, or month number.
    fn key(&self, date: NaiveDate) -> i64 {
        match self {
            Self::Day => i64::from(date.day()),
            Self::Week => {
                let week = date.iso_week();
                i64::from(week.year()) * 100 + i64::from(week.week())
            }
            Self::Month => i64::from(date.month()),
        }
    }

    fn key_label(&self, key: i64, with_year: bool) -> String {
        match self {
            Self::Day => format!("Day {}", key),
            Self::Week if with_year => format!("Week {}, {}", key % 100, key / 100),
            Self::Week => format!("Week {}", key % 100),
            Self::Month => u32::try_from(key)
                .ok()
                .and_then(|month| MonthPeriod::new(2000, month))
                .map(|m| m.short_name())
                .unwrap_or_default(),
        }
    }
}

impl FromStr for Bucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" | "day" => Ok(Self::Day),
            "weekly" | "week" => Ok(Self::Week),
            "monthly" | "month" => Ok(Self::Month),
            other => Err(format!("Unknown period: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketTotal {
    pub key: i64,
    pub label: String,
    pub total_cents: i64,
}

/// Sums per bucket in chronological order (Day 2 before Day 10).
///
/// Week labels carry the ISO year when the buckets span more than one.
pub fn bucket_totals(expenses: &[Expense], bucket: Bucket) -> Vec<BucketTotal> {
    let mut grouped: BTreeMap<i64, i64> = BTreeMap::new();
    for expense in expenses {
        *grouped.entry(bucket.key(expense.date)).or_insert(0) += expense.amount_cents;
    }

    let first_year = grouped.keys().next().map(|k| k / 100);
    let last_year = grouped.keys().next_back().map(|k| k / 100);
    let with_year = bucket == Bucket::Week && first_year != last_year;

    grouped
        .into_iter()
        .map(|(key, total_cents)| BucketTotal {
            key,
            label: bucket.key_label(key, with_year),
            total_cents,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub total_cents: i64,
}

/// One entry per date that has spending, oldest first.
pub fn daily_totals(expenses: &[Expense]) -> Vec<DailyTotal> {
    let mut grouped: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for expense in expenses {
        *grouped.entry(expense.date).or_insert(0) += expense.amount_cents;
    }

    grouped
        .into_iter()
        .map(|(date, total_cents)| DailyTotal { date, total_cents })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub total_cents: i64,
    pub running_total_cents: i64,
}

pub fn running_totals(daily: &[DailyTotal]) -> Vec<TrendPoint> {
    let mut running = 0;
    daily
        .iter()
        .map(|d| {
            running += d.total_cents;
            TrendPoint {
                date: d.date,
                total_cents: d.total_cents,
                running_total_cents: running,
            }
        })
        .collect()
}

/// Daily totals with a cumulative sum, limited to the lookback window ending at `today`.
pub fn trend_series(expenses: &[Expense], range: TrendRange, today: NaiveDate) -> Vec<TrendPoint> {
    let cutoff = range.cutoff(today);
    let recent: Vec<Expense> = expenses
        .iter()
        .filter(|e| e.date >= cutoff && e.date <= today)
        .cloned()
        .collect();
    running_totals(&daily_totals(&recent))
}

/// Mean of the daily totals in a trend series, rounded to whole cents.
pub fn average_daily(points: &[TrendPoint]) -> i64 {
    if points.is_empty() {
        return 0;
    }
    let sum: i64 = points.iter().map(|p| p.total_cents).sum();
    (sum as f64 / points.len() as f64).round() as i64
}

/// Percentage change from `prior` to `current`, rounded to one decimal.
/// Zero when there is no prior spending to compare against.
pub fn percent_change(current: i64, prior: i64) -> f64 {
    if prior == 0 {
        return 0.0;
    }
    let change = (current - prior) as f64 / prior as f64 * 100.0;
    (change * 10.0).round() / 10.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthTotal {
    pub month: MonthPeriod,
    pub label: String,
    pub total_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthChange {
    pub from: String,
    pub to: String,
    pub percent: f64,
}

/// Totals for three consecutive months and the change between each pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyChangeSummary {
    /// Oldest first.
    pub months: Vec<MonthTotal>,
    /// Most recent comparison first.
    pub changes: Vec<MonthChange>,
}

/// Compare the three months ending at `latest`.
pub fn monthly_change_summary(expenses: &[Expense], latest: MonthPeriod) -> MonthlyChangeSummary {
    let months: Vec<MonthTotal> = (0..3)
        .rev()
        .map(|back| {
            let month = latest.shift(-back);
            MonthTotal {
                month,
                label: month.month_name(),
                total_cents: expenses
                    .iter()
                    .filter(|e| month.contains(e.date))
                    .map(|e| e.amount_cents)
                    .sum(),
            }
        })
        .collect();

    let changes = months
        .windows(2)
        .rev()
        .map(|pair| MonthChange {
            from: pair[0].label.clone(),
            to: pair[1].label.clone(),
            percent: percent_change(pair[1].total_cents, pair[0].total_cents),
        })
        .collect();

    MonthlyChangeSummary { months, changes }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expense(title: &str, cents: i64, category: Category, date: &str) -> Expense {
        Expense {
            id: title.to_string(),
            user_id: 1,
            title: title.to_string(),
            amount_cents: cents,
            category,
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            note: None,
            currency: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn scenario() -> Vec<Expense> {
        vec![
            expense("Lunch", 1000, Category::Food, "2024-03-02"),
            expense("Snack", 500, Category::Food, "2024-03-10"),
            expense("Rent", 10000, Category::Rent, "2024-03-01"),
        ]
    }

    #[test]
    fn test_category_totals_scenario() {
        let totals = category_totals(&scenario());
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[&Category::Food], 1500);
        assert_eq!(totals[&Category::Rent], 10000);
    }

    #[test]
    fn test_category_sums_equal_overall_sum() {
        let expenses = vec![
            expense("a", 1999, Category::Coffee, "2024-01-01"),
            expense("b", 1, Category::Travel, "2024-01-02"),
            expense("c", 333, Category::Coffee, "2024-01-03"),
            expense("d", 10001, Category::Other, "2024-01-04"),
        ];
        let by_category: i64 = category_totals(&expenses).values().sum();
        let overall: i64 = expenses.iter().map(|e| e.amount_cents).sum();
        assert_eq!(by_category, overall);
    }

    #[test]
    fn test_top_and_most_frequent_category() {
        let summaries = category_summaries(&scenario());
        let top = top_category(&summaries).unwrap();
        assert_eq!(top.category, Category::Rent);
        assert_eq!(top.total_cents, 10000);

        let frequent = most_frequent_category(&summaries).unwrap();
        assert_eq!(frequent.category, Category::Food);
        assert_eq!(frequent.count, 2);
    }

    #[test]
    fn test_ties_keep_first_encountered() {
        let expenses = vec![
            expense("a", 500, Category::Travel, "2024-01-01"),
            expense("b", 500, Category::Coffee, "2024-01-02"),
        ];
        let summaries = category_summaries(&expenses);
        assert_eq!(top_category(&summaries).unwrap().category, Category::Travel);
        assert_eq!(most_frequent_category(&summaries).unwrap().category, Category::Travel);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(top_category(&[]).is_none());
        assert!(category_breakdown(&[]).is_empty());
        assert_eq!(percentage_of_total(0, 0), 0.0);
        assert_eq!(SpendingSummary::from_expenses(&[]).total_cents, 0);
    }

    #[test]
    fn test_breakdown_percentages() {
        let shares = category_breakdown(&[
            expense("a", 7500, Category::Rent, "2024-01-01"),
            expense("b", 2500, Category::Food, "2024-01-02"),
        ]);
        assert_eq!(shares[0].category, Category::Rent);
        assert_eq!(shares[0].percentage, 75.0);
        assert_eq!(shares[1].percentage, 25.0);
    }

    #[test]
    fn test_day_buckets_sort_numerically() {
        let buckets = bucket_totals(
            &[
                expense("a", 100, Category::Food, "2024-03-10"),
                expense("b", 200, Category::Food, "2024-03-02"),
                expense("c", 300, Category::Food, "2024-03-10"),
            ],
            Bucket::Day,
        );
        let labels: Vec<&str> = buckets.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["Day 2", "Day 10"]);
        assert_eq!(buckets[1].total_cents, 400);
    }

    #[test]
    fn test_week_and_month_buckets() {
        let expenses = vec![
            expense("a", 100, Category::Food, "2024-02-05"),
            expense("b", 200, Category::Food, "2024-01-01"),
        ];
        let weeks = bucket_totals(&expenses, Bucket::Week);
        assert_eq!(weeks[0].label, "Week 1");
        assert_eq!(weeks[1].label, "Week 6");

        let months = bucket_totals(&expenses, Bucket::Month);
        assert_eq!(months[0].key, 1);
        assert_eq!(months[0].label, "Jan");
        assert_eq!(months[1].label, "Feb");
    }

    #[test]
    fn test_week_buckets_across_iso_year_boundary() {
        // 2021-01-01 falls in ISO week 53 of 2020.
        let weeks = bucket_totals(
            &[
                expense("a", 100, Category::Food, "2021-01-01"),
                expense("b", 200, Category::Food, "2021-01-10"),
            ],
            Bucket::Week,
        );
        let labels: Vec<&str> = weeks.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["Week 53, 2020", "Week 1, 2021"]);

        // 2019-12-30 is already ISO week 1 of 2020 and must not merge with January 2021.
        let weeks = bucket_totals(
            &[
                expense("a", 100, Category::Food, "2019-12-30"),
                expense("b", 200, Category::Food, "2020-01-02"),
                expense("c", 400, Category::Food, "2020-12-31"),
            ],
            Bucket::Week,
        );
        let labels: Vec<&str> = weeks.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["Week 1", "Week 53"]);
        assert_eq!(weeks[0].total_cents, 300);
    }

    #[test]
    fn test_trend_series_window_and_running_total() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        let expenses = vec![
            expense("old", 9999, Category::Food, "2024-01-01"),
            expense("a", 100, Category::Food, "2024-03-25"),
            expense("b", 300, Category::Food, "2024-03-30"),
            expense("c", 200, Category::Food, "2024-03-25"),
        ];
        let points = trend_series(&expenses, TrendRange::SevenDays, today);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].total_cents, 300);
        assert_eq!(points[1].running_total_cents, 600);
        assert_eq!(average_daily(&points), 300);
    }

    #[test]
    fn test_percent_change() {
        assert_eq!(percent_change(5000, 0), 0.0);
        assert_eq!(percent_change(10850, 10000), 8.5);
        assert_eq!(percent_change(9680, 10000), -3.2);
    }

    #[test]
    fn test_monthly_change_summary() {
        let expenses = vec![
            expense("apr", 10000, Category::Food, "2023-04-10"),
            expense("may", 9680, Category::Food, "2023-05-10"),
            expense("jun", 10503, Category::Food, "2023-06-10"),
        ];
        let summary = monthly_change_summary(&expenses, MonthPeriod::new(2023, 6).unwrap());
        let labels: Vec<&str> = summary.months.iter().map(|m| m.label.as_str()).collect();
        assert_eq!(labels, vec!["April", "May", "June"]);
        assert_eq!(summary.changes[0].from, "May");
        assert_eq!(summary.changes[0].to, "June");
        assert_eq!(summary.changes[0].percent, 8.5);
        assert_eq!(summary.changes[1].percent, -3.2);
    }
}
