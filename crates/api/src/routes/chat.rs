//! Turn submission and chat management endpoints.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use database::models::Chat;
use orchestrator::{ChatError, TurnRequest};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ApiError, Result};
use crate::routes::stream::sse;
use crate::session::authenticate;
use crate::state::AppState;

/// Response header carrying the id a client can resume with.
pub const STREAM_ID_HEADER: &str = "x-stream-id";

#[derive(Debug, Deserialize)]
pub struct DeleteChatQuery {
    pub id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub stopped: bool,
}

#[derive(Debug, Serialize)]
pub struct DeleteTrailingResponse {
    pub deleted: u64,
}

/// `POST /api/chat`
pub async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: std::result::Result<Json<TurnRequest>, JsonRejection>,
) -> Result<Response> {
    let session = authenticate(state.sessions.as_ref(), &headers).await?;
    let Json(request) = payload.map_err(|rejection| ApiError::InvalidRequest(rejection.body_text()))?;

    let turn = state.service.submit_turn(&session, request).await?;
    info!(chat_id = %turn.chat_id, stream_id = %turn.stream_id, "Streaming turn");

    let stream_id = HeaderValue::from_str(&turn.stream_id).ok();
    let mut response = sse(turn.events, 0).into_response();
    if let Some(stream_id) = stream_id {
        response.headers_mut().insert(STREAM_ID_HEADER, stream_id);
    }
    Ok(response)
}

/// `DELETE /api/chat?id=`
pub async fn delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: std::result::Result<Query<DeleteChatQuery>, QueryRejection>,
) -> Result<Json<Chat>> {
    let session = authenticate(state.sessions.as_ref(), &headers).await?;
    let Query(query) = query.map_err(|rejection| ApiError::InvalidRequest(rejection.body_text()))?;
    let chat_id = query
        .id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ChatError::BadRequest("parameter id is required".to_string()))?;

    let chat = state.service.delete_chat(&session, &chat_id).await?;
    Ok(Json(chat))
}

/// `POST /api/chat/:chat_id/stop`
pub async fn stop(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<StopResponse>> {
    let session = authenticate(state.sessions.as_ref(), &headers).await?;
    let stopped = state.service.stop(&session, &chat_id).await?;
    Ok(Json(StopResponse { stopped }))
}

/// `DELETE /api/messages/:message_id/trailing`
pub async fn delete_trailing(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<DeleteTrailingResponse>> {
    let session = authenticate(state.sessions.as_ref(), &headers).await?;
    let deleted = state
        .service
        .delete_trailing_messages(&session, &message_id)
        .await?;
    Ok(Json(DeleteTrailingResponse { deleted }))
}
