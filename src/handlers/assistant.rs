use std::time::Duration;

use askama::Template;
use axum::extract::{Query, State};
use axum::response::{Html, Json};
use axum::{Extension, Form};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AppError, AppResult, RenderHtml};
use crate::handlers::layout::{page_layout, Flash, Layout};
use crate::models::CurrentUser;
use crate::services::advisories::Page;
use crate::services::assistant::{self, GREETING};
use crate::state::AppState;

const MAX_QUESTION_CHARS: usize = 2000;

pub struct ChatMessage {
    pub from_user: bool,
    pub text: String,
}

impl ChatMessage {
    fn bot(text: &str) -> Self {
        Self {
            from_user: false,
            text: text.to_string(),
        }
    }

    fn user(text: &str) -> Self {
        Self {
            from_user: true,
            text: text.to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "pages/assistant.html")]
pub struct AssistantTemplate {
    pub layout: Layout,
    pub messages: Vec<ChatMessage>,
    pub thinking_delay_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct QuestionForm {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct QuestionPayload {
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct AnswerResponse {
    pub rule: Option<&'static str>,
    pub answer: String,
}

fn validate_question(question: &str) -> AppResult<&str> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("Please enter a question".into()));
    }
    if trimmed.chars().count() > MAX_QUESTION_CHARS {
        return Err(AppError::Validation("Question is too long".into()));
    }
    Ok(trimmed)
}

/// Pause before answering so the reply reads like a response, not a lookup.
async fn think(state: &AppState) {
    if state.config.assistant_delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(state.config.assistant_delay_ms)).await;
    }
}

fn render_page(
    state: &AppState,
    user: &CurrentUser,
    flash: Flash,
    messages: Vec<ChatMessage>,
) -> AppResult<Html<String>> {
    let conn = state.db.get()?;
    let (layout, _) = page_layout(&conn, &state.config, user, Page::Assistant, "AI Assistant", flash)?;
    AssistantTemplate {
        layout,
        messages,
        thinking_delay_ms: state.config.assistant_delay_ms,
    }
    .render_html()
}

pub async fn index(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(flash): Query<Flash>,
) -> AppResult<Html<String>> {
    render_page(&state, &user, flash, vec![ChatMessage::bot(GREETING)])
}

/// Form fallback: answer one question and show the exchange.
pub async fn ask(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Form(form): Form<QuestionForm>,
) -> AppResult<Html<String>> {
    let question = validate_question(&form.message)?;
    think(&state).await;
    let reply = assistant::respond(question);
    debug!(user_id = user.id, rule = ?reply.rule, "Assistant answered");

    render_page(
        &state,
        &user,
        Flash::default(),
        vec![
            ChatMessage::bot(GREETING),
            ChatMessage::user(question),
            ChatMessage::bot(&reply.text),
        ],
    )
}

pub async fn api_ask(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<QuestionPayload>,
) -> AppResult<Json<AnswerResponse>> {
    let question = validate_question(&payload.question)?;
    think(&state).await;
    let reply = assistant::respond(question);
    debug!(user_id = user.id, rule = ?reply.rule, "Assistant answered");

    Ok(Json(AnswerResponse {
        rule: reply.rule,
        answer: reply.text,
    }))
}
