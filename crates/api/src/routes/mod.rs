//! Route handlers for the chat API.

pub mod chat;
pub mod health;
pub mod models;
pub mod stream;

use axum::routing::{delete, get, post};
use axum::Router;

use crate::state::AppState;

/// Build the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        // Turns
        .route("/api/chat", post(chat::submit).delete(chat::delete))
        .route("/api/chat/:chat_id/stop", post(chat::stop))
        // Resume
        .route("/api/chat/:chat_id/stream", get(stream::resume_chat))
        .route("/api/stream/:stream_id", get(stream::resume_stream))
        // History
        .route("/api/messages/:message_id/trailing", delete(chat::delete_trailing))
        .route("/api/models", get(models::list_models))
        // Health check
        .route("/api/health", get(health::health))
}
