//! HTTP surface of the Parley chat server.
//!
//! Turns are streamed as server-sent events, one `data: <json>` line per
//! event, ending with `data: [DONE]`. Every event carries its buffer offset
//! as the SSE id so a reconnecting client can resume with `Last-Event-ID`.

pub mod config;
pub mod error;
pub mod routes;
pub mod session;
pub mod state;

use axum::Router;

pub use config::{AppConfig, ConfigError};
pub use error::ApiError;
pub use session::{SessionResolver, StaticTokens};
pub use state::AppState;

/// Build the application router.
pub fn app(state: AppState) -> Router {
    routes::router().with_state(state)
}
