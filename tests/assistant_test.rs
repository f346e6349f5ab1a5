//! Integration tests for the scripted assistant.

mod common;

use axum::http::StatusCode;
use common::TestClient;
use serde_json::json;

#[tokio::test]
async fn test_chat_page_opens_with_greeting() {
    let client = TestClient::signed_in().await;
    let page = client.get("/assistant").await;
    assert_eq!(page.status, StatusCode::OK);
    let html = page.text();
    assert!(html.contains("I&#x27;m your financial assistant") || html.contains("I'm your financial assistant"));
    assert!(html.contains("Ask a question..."));
}

#[tokio::test]
async fn test_api_answers_with_matching_rule() {
    let client = TestClient::signed_in().await;
    let response = client
        .send_json("POST", "/api/assistant", &json!({ "question": "What is a budget?" }))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let reply = response.json();
    assert_eq!(reply["rule"], "define_budget");
    assert!(reply["answer"].as_str().unwrap().starts_with("A budget is a financial plan"));
}

#[tokio::test]
async fn test_api_rejects_blank_question() {
    let client = TestClient::signed_in().await;
    let response = client
        .send_json("POST", "/api/assistant", &json!({ "question": "   " }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_form_fallback_shows_exchange() {
    let client = TestClient::signed_in().await;
    let page = client
        .post_form("/assistant", &[("message", "How do I save more?")])
        .await;
    assert_eq!(page.status, StatusCode::OK);
    let html = page.text();
    assert!(html.contains("How do I save more?"));
    assert!(html.contains("opportunities to increase your savings"));
}

#[tokio::test]
async fn test_assistant_requires_session() {
    let client = TestClient::new();
    let response = client
        .send_json("POST", "/api/assistant", &json!({ "question": "hello" }))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}
