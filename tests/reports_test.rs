//! Integration tests for the reports page, downloads and chart endpoints.

mod common;

use axum::http::StatusCode;
use chrono::{Datelike, Local};
use common::TestClient;

fn today() -> String {
    Local::now().date_naive().format("%Y-%m-%d").to_string()
}

fn this_month() -> String {
    let now = Local::now().date_naive();
    format!("{:04}-{:02}", now.year(), now.month())
}

async fn client_with_expenses() -> TestClient {
    let client = TestClient::signed_in().await;
    client.add_expense("Weekly shop", "30.00", "Food", &today()).await;
    client.add_expense("Train pass", "10.00", "Transportation", &today()).await;
    client
}

#[tokio::test]
async fn test_reports_page_tabs() {
    let client = client_with_expenses().await;

    let overview = client.get("/reports").await;
    assert_eq!(overview.status, StatusCode::OK);
    let html = overview.text();
    assert!(html.contains("Spending by Category"));
    assert!(html.contains("$40.00"));

    let trends = client.get("/reports?tab=trends&range=7days").await.text();
    assert!(trends.contains("Spending Trend"));
    assert!(trends.contains("Monthly Comparison"));

    let insights = client.get("/reports?tab=insights").await.text();
    assert!(insights.contains("Food ($30.00)"));
}

#[tokio::test]
async fn test_invalid_month_is_a_bad_request() {
    let client = TestClient::signed_in().await;
    let response = client.get("/reports?month=2024-13").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_csv_download() {
    let client = client_with_expenses().await;
    let response = client
        .get(&format!("/reports/download?month={}&format=csv", this_month()))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.content_type.as_deref(), Some("text/csv; charset=utf-8"));
    let disposition = response.content_disposition.clone().unwrap();
    assert!(disposition.starts_with("attachment; filename=\"budget-savvy-report-"));
    assert!(disposition.ends_with(".csv\""));

    let csv = response.text();
    assert!(csv.starts_with("Date,Title,Category,Amount,Currency,Note"));
    assert!(csv.contains("Weekly shop"));
    assert!(csv.contains("30.00"));
}

#[tokio::test]
async fn test_csv_download_uses_each_expense_currency() {
    let client = TestClient::signed_in().await;
    let created = client
        .send_json(
            "POST",
            "/api/expenses",
            &serde_json::json!({
                "title": "Paris",
                "amount_cents": 1000,
                "category": "Travel",
                "date": today(),
                "currency": "EUR"
            }),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    client.add_expense("Taxi", "12.00", "Transportation", &today()).await;

    let csv = client
        .get(&format!("/reports/download?month={}&format=csv", this_month()))
        .await
        .text();
    assert!(csv.contains(&format!("{},Paris,Travel,10.00,EUR,", today())));
    assert!(csv.contains(&format!("{},Taxi,Transportation,12.00,USD,", today())));
}

#[tokio::test]
async fn test_pdf_download_is_default() {
    let client = client_with_expenses().await;
    let response = client.get("/reports/download").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.content_type.as_deref(), Some("application/pdf"));
    assert!(response.body.starts_with(b"%PDF-"));
}

#[tokio::test]
async fn test_unknown_download_format() {
    let client = TestClient::signed_in().await;
    let response = client.get("/reports/download?format=xlsx").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_category_breakdown_endpoint() {
    let client = client_with_expenses().await;
    let (status, shares) = client
        .get_json(&format!("/api/reports/categories?month={}", this_month()))
        .await;

    assert_eq!(status, StatusCode::OK);
    let shares = shares.as_array().unwrap();
    assert_eq!(shares.len(), 2);
    assert_eq!(shares[0]["category"], "Food");
    assert_eq!(shares[0]["total_cents"], 3000);
    assert_eq!(shares[0]["percentage"], 75.0);
}

#[tokio::test]
async fn test_trend_and_monthly_change_endpoints() {
    let client = client_with_expenses().await;

    let (_, trend) = client.get_json("/api/reports/trend?range=7days").await;
    assert_eq!(trend["range"], "7days");
    let points = trend["points"].as_array().unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0]["running_total_cents"], 4000);
    assert_eq!(trend["average_daily_cents"], 4000);

    let (_, change) = client
        .get_json(&format!("/api/reports/monthly-change?month={}", this_month()))
        .await;
    assert_eq!(change["months"].as_array().map(Vec::len), Some(3));

    let (_, buckets) = client
        .get_json(&format!("/api/reports/buckets?month={}&bucket=daily", this_month()))
        .await;
    let buckets = buckets.as_array().unwrap();
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0]["total_cents"], 4000);
}
