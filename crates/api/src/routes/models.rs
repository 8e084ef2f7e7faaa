//! Model listing.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use orchestrator::{ModelInfo, DEFAULT_CHAT_MODEL};
use serde::Serialize;

use crate::error::Result;
use crate::session::authenticate;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelList {
    pub default_model: &'static str,
    pub models: Vec<ModelInfo>,
}

/// `GET /api/models`
pub async fn list_models(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<ModelList>> {
    let session = authenticate(state.sessions.as_ref(), &headers).await?;
    Ok(Json(ModelList {
        default_model: DEFAULT_CHAT_MODEL,
        models: state.service.models_for(&session),
    }))
}
