use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, Local, NaiveDate, Weekday};
use serde::Serialize;

/// A calendar month, the unit reports and month-over-month comparisons work in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MonthPeriod {
    pub year: i32,
    pub month: u32,
}

impl MonthPeriod {
    /// Returns `None` for a month outside 1..=12.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| Self { year, month })
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn current() -> Self {
        Self::containing(Local::now().date_naive())
    }

    pub fn start(&self) -> NaiveDate {
        month_start(self.year, self.month)
    }

    pub fn end(&self) -> NaiveDate {
        month_end(self.year, self.month)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    pub fn prev(&self) -> Self {
        self.shift(-1)
    }

    pub fn next(&self) -> Self {
        self.shift(1)
    }

    pub fn shift(&self, months: i32) -> Self {
        let index = self.year * 12 + (self.month as i32 - 1) + months;
        Self {
            year: index.div_euclid(12),
            month: index.rem_euclid(12) as u32 + 1,
        }
    }

    pub fn days(&self) -> i64 {
        (self.end() - self.start()).num_days() + 1
    }

    /// Full month name, e.g. "June".
    pub fn month_name(&self) -> String {
        self.start().format("%B").to_string()
    }

    /// Abbreviated month name, e.g. "Jun".
    pub fn short_name(&self) -> String {
        self.start().format("%b").to_string()
    }

    /// "June 2023"
    pub fn label(&self) -> String {
        format!("{} {}", self.month_name(), self.year)
    }

    /// Lower-case slug used in download file names, e.g. "june-2023".
    pub fn slug(&self) -> String {
        format!("{}-{}", self.month_name().to_lowercase(), self.year)
    }

    /// Query-string form, e.g. "2023-06".
    pub fn as_param(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

impl fmt::Display for MonthPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for MonthPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("Invalid month: {} (expected YYYY-MM)", s);
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Self::new(year, month).ok_or_else(invalid)
    }
}

/// Lookback window of the spending trend chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrendRange {
    SevenDays,
    #[default]
    ThirtyDays,
    NinetyDays,
}

impl TrendRange {
    pub fn all() -> &'static [TrendRange] {
        &[Self::SevenDays, Self::ThirtyDays, Self::NinetyDays]
    }

    pub fn days(&self) -> i64 {
        match self {
            Self::SevenDays => 7,
            Self::ThirtyDays => 30,
            Self::NinetyDays => 90,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SevenDays => "7days",
            Self::ThirtyDays => "30days",
            Self::NinetyDays => "90days",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::SevenDays => "7 Days",
            Self::ThirtyDays => "30 Days",
            Self::NinetyDays => "90 Days",
        }
    }

    /// Earliest date still inside the window ending at `today`.
    pub fn cutoff(&self, today: NaiveDate) -> NaiveDate {
        today - Duration::days(self.days())
    }
}

impl FromStr for TrendRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "7days" | "7" => Ok(Self::SevenDays),
            "30days" | "30" => Ok(Self::ThirtyDays),
            "90days" | "90" => Ok(Self::NinetyDays),
            other => Err(format!("Unknown time range: {}", other)),
        }
    }
}

pub fn month_start(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or_default()
}

pub fn month_end(year: i32, month: u32) -> NaiveDate {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    month_start(next_year, next_month) - Duration::days(1)
}

/// First and last day of an ISO week-numbering year. These can spill a few
/// days into the neighbouring calendar years.
pub fn iso_year_bounds(year: i32) -> (NaiveDate, NaiveDate) {
    let start = NaiveDate::from_isoywd_opt(year, 1, Weekday::Mon).unwrap_or_else(|| month_start(year, 1));
    let end = NaiveDate::from_isoywd_opt(year + 1, 1, Weekday::Mon)
        .map(|next| next - Duration::days(1))
        .unwrap_or_else(|| month_end(year, 12));
    (start, end)
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn parse_date(input: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_month_bounds() {
        let feb = MonthPeriod::new(2024, 2).unwrap();
        assert_eq!(feb.start(), date(2024, 2, 1));
        assert_eq!(feb.end(), date(2024, 2, 29));
        assert_eq!(feb.days(), 29);
        assert!(feb.contains(date(2024, 2, 15)));
        assert!(!feb.contains(date(2024, 3, 1)));
    }

    #[test]
    fn test_month_shift_across_years() {
        let jan = MonthPeriod::new(2024, 1).unwrap();
        assert_eq!(jan.prev(), MonthPeriod::new(2023, 12).unwrap());
        assert_eq!(jan.shift(-13), MonthPeriod::new(2022, 12).unwrap());
        assert_eq!(MonthPeriod::new(2023, 12).unwrap().next(), jan);
    }

    #[test]
    fn test_month_labels() {
        let june = MonthPeriod::new(2023, 6).unwrap();
        assert_eq!(june.label(), "June 2023");
        assert_eq!(june.slug(), "june-2023");
        assert_eq!(june.as_param(), "2023-06");
        assert_eq!(june.short_name(), "Jun");
    }

    #[test]
    fn test_parse_month() {
        assert_eq!(
            "2023-06".parse::<MonthPeriod>(),
            Ok(MonthPeriod::new(2023, 6).unwrap())
        );
        assert!("2023-13".parse::<MonthPeriod>().is_err());
        assert!("June".parse::<MonthPeriod>().is_err());
    }

    #[test]
    fn test_iso_year_bounds() {
        assert_eq!(iso_year_bounds(2020), (date(2019, 12, 30), date(2021, 1, 3)));
        assert_eq!(iso_year_bounds(2021), (date(2021, 1, 4), date(2022, 1, 2)));
    }

    #[test]
    fn test_trend_range_cutoff() {
        assert_eq!(TrendRange::SevenDays.cutoff(date(2024, 3, 10)), date(2024, 3, 3));
        assert_eq!("90days".parse::<TrendRange>(), Ok(TrendRange::NinetyDays));
        assert_eq!(TrendRange::default(), TrendRange::ThirtyDays);
    }
}
