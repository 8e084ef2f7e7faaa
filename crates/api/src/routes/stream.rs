//! SSE encoding and stream resume endpoints.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::{stream, Stream, StreamExt};
use orchestrator::EventStream;
use serde::Deserialize;

use crate::error::{ApiError, Result};
use crate::session::authenticate;
use crate::state::AppState;

/// Final SSE payload after the last event.
pub const DONE: &str = "[DONE]";

/// Header a reconnecting client sends with the id of the last event it saw.
pub const LAST_EVENT_ID: &str = "last-event-id";

#[derive(Debug, Default, Deserialize)]
pub struct ResumeQuery {
    pub offset: Option<usize>,
}

/// Where to resume: after `Last-Event-ID`, else `?offset=`, else the start.
pub fn resume_offset(headers: &HeaderMap, query: &ResumeQuery) -> usize {
    headers
        .get(LAST_EVENT_ID)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<usize>().ok())
        .map(|last| last + 1)
        .or(query.offset)
        .unwrap_or(0)
}

/// Encode events as `data: <json>` with their buffer offset as the event id,
/// followed by `data: [DONE]`.
pub fn sse(
    events: EventStream,
    offset: usize,
) -> Sse<impl Stream<Item = std::result::Result<Event, axum::Error>>> {
    let events = events.enumerate().map(move |(index, event)| {
        Event::default()
            .id((offset + index).to_string())
            .json_data(&event)
    });
    let done = stream::once(async { Ok(Event::default().data(DONE)) });

    Sse::new(events.chain(done)).keep_alive(KeepAlive::default())
}

fn resumed(events: Option<EventStream>, offset: usize) -> Response {
    match events {
        Some(events) => sse(events, offset).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// `GET /api/chat/:chat_id/stream`
pub async fn resume_chat(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    headers: HeaderMap,
    query: std::result::Result<Query<ResumeQuery>, QueryRejection>,
) -> Result<Response> {
    let session = authenticate(state.sessions.as_ref(), &headers).await?;
    let Query(query) = query.map_err(|rejection| ApiError::InvalidRequest(rejection.body_text()))?;
    let offset = resume_offset(&headers, &query);

    let events = state.service.resume_chat(&session, &chat_id, offset).await?;
    Ok(resumed(events, offset))
}

/// `GET /api/stream/:stream_id`
pub async fn resume_stream(
    State(state): State<AppState>,
    Path(stream_id): Path<String>,
    headers: HeaderMap,
    query: std::result::Result<Query<ResumeQuery>, QueryRejection>,
) -> Result<Response> {
    let session = authenticate(state.sessions.as_ref(), &headers).await?;
    let Query(query) = query.map_err(|rejection| ApiError::InvalidRequest(rejection.body_text()))?;
    let offset = resume_offset(&headers, &query);

    let events = state.service.resume_stream(&session, &stream_id, offset).await?;
    Ok(resumed(events, offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_resume_offset() {
        let mut headers = HeaderMap::new();
        assert_eq!(resume_offset(&headers, &ResumeQuery::default()), 0);
        assert_eq!(resume_offset(&headers, &ResumeQuery { offset: Some(3) }), 3);

        headers.insert(LAST_EVENT_ID, HeaderValue::from_static("7"));
        assert_eq!(resume_offset(&headers, &ResumeQuery { offset: Some(3) }), 8);

        headers.insert(LAST_EVENT_ID, HeaderValue::from_static("garbage"));
        assert_eq!(resume_offset(&headers, &ResumeQuery::default()), 0);
    }
}
