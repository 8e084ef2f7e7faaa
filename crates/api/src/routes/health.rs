//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::error::Result;
use crate::state::AppState;

#[derive(Serialize)]
pub struct Health {
    pub status: String,
}

/// Health check endpoint. Fails with `offline:chat` when storage is unreachable.
pub async fn health(State(state): State<AppState>) -> Result<Json<Health>> {
    state.service.health().await?;
    Ok(Json(Health {
        status: "ok".to_string(),
    }))
}
