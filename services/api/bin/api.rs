//! Main Entrypoint for the Describe API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Building the Gemini-backed tutor, with optional prompt overrides.
//! 3. Constructing the Axum router and applying middleware.
//! 4. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use describe_api::{config::Config, router::create_router, state::AppState};
use describe_core::{
    gemini::{GeminiClient, GeminiConfig},
    prompts::PromptSet,
    topic::TopicCatalog,
    tutor::{ModelConfig, Tutor},
};
use std::{collections::HashMap, fs, net::SocketAddr, path::Path, sync::Arc, time::Duration};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

/// Loads every `<key>.md` file in a directory as a prompt template.
fn load_prompts(prompts_path: &Path) -> anyhow::Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();
    for entry in fs::read_dir(prompts_path)
        .with_context(|| format!("Failed to read prompts directory {}", prompts_path.display()))?
    {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            let content = fs::read_to_string(&path)?;
            prompts.insert(prompt_key, content);
        }
    }
    Ok(prompts)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Shared Services ---
    let prompts = match &config.prompts_path {
        Some(path) => {
            let templates = load_prompts(path)?;
            info!(path = %path.display(), templates = templates.len(), "Loaded prompt overrides");
            PromptSet::from_templates(templates)
        }
        None => PromptSet::default(),
    };

    let gemini_config = GeminiConfig::builder(config.gemini_api_key.clone())
        .with_base_url(&config.gemini_base_url)
        .with_timeout(config.http_timeout)
        .build();
    let backend =
        Arc::new(GeminiClient::new(gemini_config).context("Failed to build Gemini client")?);

    let models = ModelConfig {
        image_model: config.image_model.clone(),
        tutor_model: config.tutor_model.clone(),
    };
    let tutor = Arc::new(Tutor::new(backend, models, prompts));

    let app_state = Arc::new(AppState::new(tutor, TopicCatalog::default()));
    let _sweeper = app_state.sessions.spawn_sweeper(
        config.session_idle_timeout,
        config.session_idle_timeout.min(SWEEP_INTERVAL),
    );

    // --- 4. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 5. Start Server ---
    info!(
        image_model = %config.image_model,
        tutor_model = %config.tutor_model,
        session_idle_secs = config.session_idle_timeout.as_secs(),
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
