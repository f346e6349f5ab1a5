//! Monthly expense report: summary, transaction table, category breakdown
//! and a few generated observations, rendered as PDF or CSV.

use chrono::NaiveDateTime;

use crate::date_utils::MonthPeriod;
use crate::error::{AppError, AppResult};
use crate::filters::{format_money, format_percent, format_plain};
use crate::models::{Category, Expense};
use crate::services::analytics::{
    category_summaries, most_frequent_category, percent_change, percentage_of_total, top_category,
};
use crate::services::pdf::{self, Font, Page, PdfDocument, Rgb, PAGE_HEIGHT, PAGE_WIDTH};

#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub date: chrono::NaiveDate,
    pub title: String,
    pub category: Category,
    pub amount_cents: i64,
    pub note: Option<String>,
    /// Set when the expense was recorded in a currency of its own.
    pub currency: Option<String>,
}

impl ReportRow {
    fn currency_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.currency.as_deref().unwrap_or(fallback)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BreakdownLine {
    pub category: Category,
    pub total_cents: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone)]
pub struct ExpenseReport {
    pub title: String,
    pub period: MonthPeriod,
    pub generated_at: NaiveDateTime,
    pub currency: String,
    pub total_cents: i64,
    pub count: usize,
    /// Oldest first.
    pub rows: Vec<ReportRow>,
    /// In order of each category's first appearance.
    pub breakdown: Vec<BreakdownLine>,
    pub observations: Vec<String>,
}

impl ExpenseReport {
    /// Build a report over `expenses`, keeping only those dated inside `period`.
    pub fn build(
        expenses: &[Expense],
        period: MonthPeriod,
        generated_at: NaiveDateTime,
        currency: &str,
    ) -> Self {
        let mut in_period: Vec<Expense> = expenses
            .iter()
            .filter(|e| period.contains(e.date))
            .cloned()
            .collect();
        in_period.sort_by_key(|e| e.date);

        let total_cents: i64 = in_period.iter().map(|e| e.amount_cents).sum();
        let summaries = category_summaries(&in_period);

        let breakdown = summaries
            .iter()
            .map(|s| BreakdownLine {
                category: s.category,
                total_cents: s.total_cents,
                percentage: percentage_of_total(s.total_cents, total_cents),
            })
            .collect();

        let mut observations = Vec::new();
        if in_period.is_empty() {
            observations.push("No expenses were recorded for this period.".to_string());
        } else {
            if let Some(top) = top_category(&summaries) {
                observations.push(format!(
                    "Highest spending category: {} ({} total).",
                    top.category,
                    format_money(top.total_cents, currency)
                ));
            }
            if let Some(frequent) = most_frequent_category(&summaries) {
                observations.push(format!(
                    "Most frequent category: {} ({} {}).",
                    frequent.category,
                    frequent.count,
                    if frequent.count == 1 { "transaction" } else { "transactions" }
                ));
            }
            let days = period.days().max(1);
            observations.push(format!(
                "Average daily spending: {} over {} days.",
                format_money((total_cents as f64 / days as f64).round() as i64, currency),
                days
            ));
        }

        let rows = in_period
            .into_iter()
            .map(|e| ReportRow {
                date: e.date,
                title: e.title,
                category: e.category,
                amount_cents: e.amount_cents,
                note: e.note,
                currency: e.currency,
            })
            .collect::<Vec<_>>();

        Self {
            title: format!(
                "Budget Savvy: {} {} Expense Report",
                period.month_name(),
                period.year
            ),
            period,
            generated_at,
            currency: currency.to_string(),
            total_cents,
            count: rows.len(),
            rows,
            breakdown,
            observations,
        }
    }

    /// Add an observation comparing this month's total with the previous month's.
    pub fn with_prior_month_total(mut self, prior_cents: i64) -> Self {
        if prior_cents > 0 {
            let change = percent_change(self.total_cents, prior_cents);
            let prior = self.period.prev().month_name();
            let sentence = if change > 0.0 {
                format!("Spending is up {} compared to {}.", format_percent(change), prior)
            } else if change < 0.0 {
                format!("Spending is down {} compared to {}.", format_percent(-change), prior)
            } else {
                format!("Spending is unchanged compared to {}.", prior)
            };
            self.observations.push(sentence);
        }
        self
    }

    /// e.g. "budget-savvy-report-june-2023.pdf"
    pub fn filename(&self, extension: &str) -> String {
        format!("budget-savvy-report-{}.{}", self.period.slug(), extension)
    }

    pub fn generated_on(&self) -> String {
        self.generated_at.format("%-m/%-d/%Y").to_string()
    }

    pub fn breakdown_lines(&self) -> Vec<String> {
        self.breakdown
            .iter()
            .map(|b| {
                format!(
                    "{}: {} ({})",
                    b.category,
                    format_money(b.total_cents, &self.currency),
                    format_percent(b.percentage)
                )
            })
            .collect()
    }

    pub fn render_csv(&self) -> AppResult<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        let csv_err = |e: csv::Error| AppError::Internal(format!("CSV error: {}", e));

        writer
            .write_record(["Date", "Title", "Category", "Amount", "Currency", "Note"])
            .map_err(csv_err)?;
        for row in &self.rows {
            writer
                .write_record([
                    row.date.format("%Y-%m-%d").to_string(),
                    row.title.clone(),
                    row.category.to_string(),
                    format_plain(row.amount_cents),
                    row.currency_or(&self.currency).to_string(),
                    row.note.clone().unwrap_or_default(),
                ])
                .map_err(csv_err)?;
        }

        writer
            .into_inner()
            .map_err(|e| AppError::Internal(format!("CSV error: {}", e)))
    }

    pub fn render_pdf(&self) -> Vec<u8> {
        let mut layout = PdfLayout::new(&self.title);
        let gray = Rgb(0.39, 0.39, 0.39);

        layout.line(18.0, 26.0, |page, y| {
            page.text(MARGIN, y, 18.0, Font::Bold, Rgb::BLACK, &self.title)
        });
        layout.line(11.0, 16.0, |page, y| {
            page.text(
                MARGIN,
                y,
                11.0,
                Font::Regular,
                gray,
                &format!("Generated on: {}", self.generated_on()),
            )
        });
        layout.line(11.0, 16.0, |page, y| {
            page.text(
                MARGIN,
                y,
                11.0,
                Font::Regular,
                gray,
                &format!(
                    "Total Expenses: {}",
                    format_money(self.total_cents, &self.currency)
                ),
            )
        });
        layout.line(11.0, 24.0, |page, y| {
            page.text(
                MARGIN,
                y,
                11.0,
                Font::Regular,
                gray,
                &format!("Number of Transactions: {}", self.count),
            )
        });

        layout.table_header();
        for (i, row) in self.rows.iter().enumerate() {
            let amount = format_money(row.amount_cents, row.currency_or(&self.currency));
            let note = row.note.as_deref().unwrap_or("");
            layout.table_row(i % 2 == 1, |page, y| {
                page.text(COL_DATE, y, TABLE_FONT, Font::Regular, Rgb::BLACK, &row.date.format("%-m/%-d/%Y").to_string());
                page.text(COL_TITLE, y, TABLE_FONT, Font::Regular, Rgb::BLACK, &pdf::truncate(&row.title, 32));
                page.text(COL_CATEGORY, y, TABLE_FONT, Font::Regular, Rgb::BLACK, row.category.as_str());
                page.text(COL_NOTE, y, TABLE_FONT, Font::Regular, gray, &pdf::truncate(note, 26));
                page.text_right(COL_AMOUNT_RIGHT, y, TABLE_FONT, Font::Regular, Rgb::BLACK, &amount);
            });
        }
        layout.gap(20.0);

        layout.line(11.0, 18.0, |page, y| {
            page.text(MARGIN, y, 12.0, Font::Bold, Rgb::BLACK, "Expense Breakdown by Category:")
        });
        for line in self.breakdown_lines() {
            layout.line(11.0, 16.0, |page, y| {
                page.text(MARGIN + 10.0, y, 11.0, Font::Regular, Rgb::BLACK, &line)
            });
        }
        layout.gap(12.0);

        layout.line(11.0, 18.0, |page, y| {
            page.text(MARGIN, y, 12.0, Font::Bold, Rgb::BLACK, "Observations:")
        });
        for observation in &self.observations {
            layout.line(11.0, 16.0, |page, y| {
                page.text(MARGIN + 10.0, y, 11.0, Font::Regular, Rgb::BLACK, observation)
            });
        }

        layout.finish()
    }
}

const MARGIN: f32 = 40.0;
const TOP: f32 = PAGE_HEIGHT - 50.0;
const BOTTOM: f32 = 60.0;
const TABLE_FONT: f32 = 9.5;
const ROW_HEIGHT: f32 = 18.0;
const COL_DATE: f32 = MARGIN + 6.0;
const COL_TITLE: f32 = 108.0;
const COL_CATEGORY: f32 = 290.0;
const COL_NOTE: f32 = 375.0;
const COL_AMOUNT_RIGHT: f32 = PAGE_WIDTH - MARGIN - 6.0;

fn header_fill() -> Rgb {
    Rgb::from_u8(139, 92, 246)
}

fn stripe_fill() -> Rgb {
    Rgb::from_u8(245, 243, 255)
}

/// Top-to-bottom cursor over a growing document. Starts a new page whenever
/// the next element would cross the bottom margin, repeating the table
/// header while a table is open.
struct PdfLayout {
    doc: PdfDocument,
    y: f32,
    in_table: bool,
}

impl PdfLayout {
    fn new(title: &str) -> Self {
        let mut doc = PdfDocument::new(title);
        doc.add_page();
        Self {
            doc,
            y: TOP,
            in_table: false,
        }
    }

    fn page(&mut self) -> &mut Page {
        self.doc.current_page()
    }

    fn ensure_room(&mut self, height: f32) {
        if self.y - height < BOTTOM {
            self.doc.add_page();
            self.y = TOP;
            if self.in_table {
                self.draw_table_header();
            }
        }
    }

    /// A line of text of the given font size, advancing the cursor by `advance`.
    fn line(&mut self, size: f32, advance: f32, draw: impl FnOnce(&mut Page, f32)) {
        self.in_table = false;
        self.ensure_room(size);
        let y = self.y - size;
        draw(self.page(), y);
        self.y -= advance;
    }

    fn gap(&mut self, height: f32) {
        self.y -= height;
    }

    fn table_header(&mut self) {
        self.ensure_room(ROW_HEIGHT * 2.0);
        self.in_table = true;
        self.draw_table_header();
    }

    fn draw_table_header(&mut self) {
        let y = self.y - ROW_HEIGHT;
        let page = self.page();
        page.fill_rect(MARGIN, y, PAGE_WIDTH - 2.0 * MARGIN, ROW_HEIGHT, header_fill());
        let text_y = y + 5.5;
        page.text(COL_DATE, text_y, 10.0, Font::Bold, Rgb::WHITE, "Date");
        page.text(COL_TITLE, text_y, 10.0, Font::Bold, Rgb::WHITE, "Title");
        page.text(COL_CATEGORY, text_y, 10.0, Font::Bold, Rgb::WHITE, "Category");
        page.text(COL_NOTE, text_y, 10.0, Font::Bold, Rgb::WHITE, "Note");
        page.text_right(COL_AMOUNT_RIGHT, text_y, 10.0, Font::Bold, Rgb::WHITE, "Amount");
        self.y -= ROW_HEIGHT;
    }

    fn table_row(&mut self, striped: bool, draw: impl FnOnce(&mut Page, f32)) {
        self.ensure_room(ROW_HEIGHT);
        let y = self.y - ROW_HEIGHT;
        let page = self.page();
        if striped {
            page.fill_rect(MARGIN, y, PAGE_WIDTH - 2.0 * MARGIN, ROW_HEIGHT, stripe_fill());
        }
        draw(page, y + 5.5);
        self.y -= ROW_HEIGHT;
    }

    /// Stamp page numbers and serialize.
    fn finish(mut self) -> Vec<u8> {
        let total = self.doc.page_count();
        for (i, page) in self.doc.pages_mut().enumerate() {
            let label = format!("Page {} of {}", i + 1, total);
            let x = (PAGE_WIDTH - pdf::text_width(&label, 9.0)) / 2.0;
            page.text(x, 30.0, 9.0, Font::Regular, Rgb(0.5, 0.5, 0.5), &label);
        }
        self.doc.to_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn expense(title: &str, cents: i64, category: Category, date: &str) -> Expense {
        Expense {
            id: title.into(),
            user_id: 1,
            title: title.into(),
            amount_cents: cents,
            category,
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            note: None,
            currency: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn generated_at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 7, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    fn june() -> MonthPeriod {
        MonthPeriod::new(2023, 6).unwrap()
    }

    fn scenario() -> Vec<Expense> {
        vec![
            expense("Lunch", 1000, Category::Food, "2023-06-12"),
            expense("Snack", 500, Category::Food, "2023-06-14"),
            expense("Rent", 10000, Category::Rent, "2023-06-01"),
            expense("Last month", 7777, Category::Travel, "2023-05-30"),
        ]
    }

    #[test]
    fn test_report_totals_scenario() {
        let report = ExpenseReport::build(&scenario(), june(), generated_at(), "USD");
        assert_eq!(report.total_cents, 11500);
        assert_eq!(report.count, 3);
        assert_eq!(report.title, "Budget Savvy: June 2023 Expense Report");
        assert_eq!(report.filename("pdf"), "budget-savvy-report-june-2023.pdf");
        assert_eq!(report.generated_on(), "7/1/2023");
    }

    #[test]
    fn test_rows_are_chronological() {
        let report = ExpenseReport::build(&scenario(), june(), generated_at(), "USD");
        let titles: Vec<&str> = report.rows.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Rent", "Lunch", "Snack"]);
    }

    #[test]
    fn test_breakdown_lines() {
        let report = ExpenseReport::build(&scenario(), june(), generated_at(), "USD");
        assert_eq!(
            report.breakdown_lines(),
            vec!["Rent: $100.00 (87.0%)", "Food: $15.00 (13.0%)"]
        );
    }

    #[test]
    fn test_observations() {
        let report = ExpenseReport::build(&scenario(), june(), generated_at(), "USD")
            .with_prior_month_total(10000);
        assert_eq!(report.observations[0], "Highest spending category: Rent ($100.00 total).");
        assert_eq!(report.observations[1], "Most frequent category: Food (2 transactions).");
        assert_eq!(report.observations[2], "Average daily spending: $3.83 over 30 days.");
        assert_eq!(report.observations[3], "Spending is up 15.0% compared to May.");
    }

    #[test]
    fn test_empty_month() {
        let report = ExpenseReport::build(&[], june(), generated_at(), "USD")
            .with_prior_month_total(0);
        assert_eq!(report.total_cents, 0);
        assert!(report.breakdown.is_empty());
        assert_eq!(report.observations, vec!["No expenses were recorded for this period."]);
        assert!(report.render_pdf().starts_with(b"%PDF-1.4"));
    }

    #[test]
    fn test_csv_output() {
        let report = ExpenseReport::build(&scenario(), june(), generated_at(), "USD");
        let csv = String::from_utf8(report.render_csv().unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Date,Title,Category,Amount,Currency,Note");
        assert_eq!(lines[1], "2023-06-01,Rent,Rent,100.00,USD,");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_rows_keep_their_own_currency() {
        let mut paris = expense("Paris", 1000, Category::Travel, "2023-06-12");
        paris.currency = Some("EUR".into());
        let expenses = vec![expense("Rent", 10000, Category::Rent, "2023-06-01"), paris];
        let report = ExpenseReport::build(&expenses, june(), generated_at(), "USD");

        let csv = String::from_utf8(report.render_csv().unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[1], "2023-06-01,Rent,Rent,100.00,USD,");
        assert_eq!(lines[2], "2023-06-12,Paris,Travel,10.00,EUR,");

        let pdf = String::from_utf8(report.render_pdf()).unwrap();
        assert!(pdf.contains("(\\20010.00) Tj"));
        assert!(pdf.contains("($100.00) Tj"));
    }

    #[test]
    fn test_pdf_contains_summary_and_paginates() {
        let many: Vec<Expense> = (0..120)
            .map(|i| expense(&format!("Item {}", i), 100, Category::Shopping, "2023-06-10"))
            .collect();
        let report = ExpenseReport::build(&many, june(), generated_at(), "USD");
        let pdf = String::from_utf8(report.render_pdf()).unwrap();

        assert!(pdf.contains("(Total Expenses: $120.00) Tj"));
        assert!(pdf.contains("(Number of Transactions: 120) Tj"));
        assert!(!pdf.contains("/Count 1 "));
        assert!(pdf.contains("(Page 1 of "));
        // header repeated on every page
        let pages = pdf.matches("/Type /Page ").count();
        assert!(pages > 1);
        assert_eq!(pdf.matches("(Amount) Tj").count(), pages);
    }
}
