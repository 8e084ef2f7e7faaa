//! Application state shared across handlers.

use std::sync::Arc;

use orchestrator::ChatService;

use crate::session::SessionResolver;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub service: ChatService,
    pub sessions: Arc<dyn SessionResolver>,
}

impl AppState {
    pub fn new(service: ChatService, sessions: Arc<dyn SessionResolver>) -> Self {
        Self { service, sessions }
    }
}
