//! Parley chat API server.

use std::sync::Arc;

use agent_tools::{default_registry, ToolsConfig};
use api::{app, AppConfig, AppState, StaticTokens};
use brain_core::{Brain, DEFAULT_SYSTEM_PROMPT};
use database::Database;
use mistral_brain::MistralBrain;
use mock_brain::EchoBrain;
use orchestrator::{
    AccountCredentials, ChatService, ChatServiceConfig, ModelCatalog, ResumableStreams, MAX_STEPS,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;
    info!(addr = %config.addr, "Starting Parley API");

    // Connect to database
    let db = Database::connect(&config.database_url).await?;
    db.migrate().await?;

    // Model backend
    let (brain, chat_model, title_model): (Arc<dyn Brain>, String, String) =
        match MistralBrain::from_env() {
            Ok(brain) => {
                let chat_model = brain.config().chat_model.clone();
                let title_model = brain.config().title_model.clone();
                info!(chat_model = %chat_model, title_model = %title_model, "Using Mistral backend");
                (Arc::new(brain), chat_model, title_model)
            }
            Err(err) => {
                warn!(error = %err, "Mistral backend not configured, falling back to echo");
                (
                    Arc::new(EchoBrain::with_prefix("Echo: ")),
                    "echo".to_string(),
                    "echo".to_string(),
                )
            }
        };
    let catalog = ModelCatalog::standard(brain, chat_model, title_model);

    let registry = default_registry(&ToolsConfig::from_env());
    info!(tools = ?registry.list_tools(), "Tools registered");

    let mut service = ChatService::new(Arc::new(db.clone()), catalog, registry)
        .with_credentials(Arc::new(AccountCredentials::new(db)))
        .with_config(ChatServiceConfig {
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            turn_timeout: config.turn_timeout,
            max_steps: MAX_STEPS,
        });
    if config.resumable_streams {
        service = service.with_resumable_streams(Arc::new(ResumableStreams::with_ttl(config.stream_ttl)));
    } else {
        info!("Resumable streams disabled");
    }

    let sessions = StaticTokens::parse(&config.api_tokens);
    if sessions.is_empty() {
        warn!("PARLEY_API_TOKENS is empty, every request will be rejected");
    }

    let app = app(AppState::new(service, Arc::new(sessions)));

    // Start server
    info!(addr = %config.addr, "Parley API listening");
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
