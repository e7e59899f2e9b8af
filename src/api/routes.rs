use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::{ApiError, AppState};
use crate::bot::StartOutcome;
use crate::store::{LogEntry, Profile, ProfileInput, LOG_PAGE_SIZE};
use crate::types::{BotStatus, ConnectionState};

#[derive(Debug, Deserialize)]
pub struct ProfileQuery {
    pub id: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub status: BotStatus,
    pub state: ConnectionState,
}

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: state.bot.get_status(),
        state: state.bot.connection_state(),
    })
}

pub async fn start(
    State(state): State<AppState>,
    Query(query): Query<ProfileQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let profile = state
        .profiles
        .get_config(query.id)
        .ok_or_else(|| ApiError::bad_request("No bot configuration found"))?;

    match state.bot.start(profile.session_config()).await {
        StartOutcome::Started | StartOutcome::AlreadyRunning => Ok(Json(json!({ "message": "Bot starting..." }))),
        StartOutcome::Cancelled => Ok(Json(json!({ "message": "Bot start cancelled" }))),
        StartOutcome::Failed(reason) => Err(ApiError::BadRequest(reason)),
    }
}

pub async fn stop(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.bot.stop().await;
    Json(json!({ "message": "Bot stopped" }))
}

pub async fn chat(State(state): State<AppState>, body: Result<Json<ChatRequest>, JsonRejection>) -> Response {
    let message = body
        .ok()
        .and_then(|Json(request)| request.message)
        .filter(|message| !message.trim().is_empty());

    let Some(message) = message else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "success": false }))).into_response();
    };

    if !state.bot.chat(&message).await {
        debug!("Chat ignored, bot is not running");
    }
    Json(json!({ "success": true })).into_response()
}

pub async fn logs(State(state): State<AppState>) -> Json<Vec<LogEntry>> {
    Json(state.logs.recent(LOG_PAGE_SIZE))
}

pub async fn clear_logs(State(state): State<AppState>) -> StatusCode {
    state.logs.clear();
    StatusCode::NO_CONTENT
}

pub async fn get_config(
    State(state): State<AppState>,
    Query(query): Query<ProfileQuery>,
) -> Result<Json<Profile>, ApiError> {
    let profile = match query.id {
        Some(id) => state
            .profiles
            .get_config(Some(id))
            .ok_or_else(|| ApiError::NotFound(format!("Profile {id} not found")))?,
        None => state.profiles.ensure_default()?,
    };
    Ok(Json(profile))
}

pub async fn save_config(
    State(state): State<AppState>,
    body: Result<Json<ProfileInput>, JsonRejection>,
) -> Result<Json<Profile>, ApiError> {
    let Json(input) = body.map_err(|e| {
        debug!("Unreadable profile body: {}", e);
        ApiError::bad_request("Invalid config")
    })?;
    Ok(Json(state.profiles.upsert(input)?))
}

pub async fn profiles(State(state): State<AppState>) -> Json<Vec<Profile>> {
    Json(state.profiles.list())
}
