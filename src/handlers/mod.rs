/// HTTP request handlers
use crate::domain::{DateKey, Health};
use crate::errors::{ApiError, ApiResult};
use crate::services::{HttpCredentialPrompt, Orchestrator};
use crate::view::{ViewEvent, ViewState};
use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Longest a `/view/changes` request waits for an update.
const CHANGE_WAIT: Duration = Duration::from_secs(25);

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub prompt: Arc<HttpCredentialPrompt>,
}

/// Successful response wrapper
#[derive(Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub ok: bool,
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self { ok: true, data }
    }
}

#[derive(Debug, Deserialize)]
pub struct DateSelection {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

#[derive(Debug, Deserialize)]
pub struct CredentialSubmission {
    pub api_key: String,
}

/// Health check handler
pub async fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        now: Utc::now(),
    })
}

/// Current screen state
pub async fn get_view(State(state): State<AppState>) -> Json<SuccessResponse<ViewState>> {
    Json(SuccessResponse::new(
        state.orchestrator.display().snapshot(),
    ))
}

/// Next screen state, or the current one after `CHANGE_WAIT`
pub async fn wait_view_change(State(state): State<AppState>) -> Json<SuccessResponse<ViewState>> {
    let display = state.orchestrator.display();
    let mut rx = display.subscribe();
    let _ = tokio::time::timeout(CHANGE_WAIT, rx.changed()).await;
    Json(SuccessResponse::new(display.snapshot()))
}

/// Current picture as PNG
pub async fn get_view_image(State(state): State<AppState>) -> Result<Response, ApiError> {
    let bitmap = state
        .orchestrator
        .display()
        .snapshot()
        .bitmap
        .ok_or_else(|| ApiError::NotFound("no picture on screen".to_string()))?;

    let png = bitmap
        .to_png()
        .map_err(|e| ApiError::Internal(format!("png encoding failed: {e}")))?;

    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

/// Select a calendar day and start loading it
pub async fn select_date(
    State(state): State<AppState>,
    Json(selection): Json<DateSelection>,
) -> ApiResult<Json<SuccessResponse<Value>>> {
    let date = DateKey::new(selection.year, selection.month, selection.day)?;

    // the load runs detached; the screen reports its progress
    drop(state.orchestrator.on_date_selected(date)?);

    Ok(Json(SuccessResponse::new(serde_json::json!({
        "date": date.to_string()
    }))))
}

/// Answer a pending credential prompt
pub async fn submit_credential(
    State(state): State<AppState>,
    Json(submission): Json<CredentialSubmission>,
) -> ApiResult<Json<SuccessResponse<Value>>> {
    state.prompt.submit(submission.api_key).await?;
    info!("credential submitted");

    Ok(Json(SuccessResponse::new(serde_json::json!({
        "message": "credential accepted"
    }))))
}

/// Show or hide the explanation text
pub async fn toggle_explanation(
    State(state): State<AppState>,
) -> Json<SuccessResponse<ViewState>> {
    let display = state.orchestrator.display();
    display.apply(ViewEvent::ExplanationToggled);
    Json(SuccessResponse::new(display.snapshot()))
}

/// Show or hide the calendar
pub async fn toggle_calendar(
    State(state): State<AppState>,
) -> ApiResult<Json<SuccessResponse<ViewState>>> {
    state.orchestrator.toggle_calendar()?;
    Ok(Json(SuccessResponse::new(
        state.orchestrator.display().snapshot(),
    )))
}
