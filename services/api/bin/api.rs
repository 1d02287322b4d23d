//! Main Entrypoint for the Chiron API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing the lesson generator, command forwarder and speech gateway.
//! 3. Optionally starting the mock downstream executor.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use chiron_api::{
    config::{Config, Provider},
    mock_executor::MockExecutor,
    router::create_router,
    state::AppState,
};
use chiron_core::{
    forwarder::{CommandForwarder, HttpCommandForwarder},
    generator::{LessonGenerator, LlmLessonGenerator, MockLessonGenerator},
    llm_client::OpenAICompatibleModel,
    speech::{GoogleTtsEngine, SpeechGateway},
};
use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install Ctrl+C handler");
        return;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

/// Builds the lesson generator for the configured provider.
fn build_lesson_generator(config: &Config) -> anyhow::Result<Arc<dyn LessonGenerator>> {
    let (api_key, api_base) = match config.provider {
        Provider::Mock => {
            warn!("Using mock lesson generator. Lessons are canned.");
            return Ok(Arc::new(MockLessonGenerator));
        }
        Provider::OpenAI => (
            config.openai_api_key.as_deref(),
            "https://api.openai.com/v1/",
        ),
        Provider::Gemini => (
            config.gemini_api_key.as_deref(),
            "https://generativelanguage.googleapis.com/v1beta/openai",
        ),
    };
    let api_key = api_key.context("API key missing for the configured provider")?;
    info!(provider = ?config.provider, "Using hosted lesson generator.");

    let openai_config = OpenAIConfig::new()
        .with_api_key(api_key)
        .with_api_base(api_base);
    let model = OpenAICompatibleModel::new(openai_config, config.chat_model.clone());
    Ok(Arc::new(LlmLessonGenerator::new(Arc::new(model))))
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

    // --- 3. Initialize Gateways ---
    let lesson_generator = build_lesson_generator(&config)?;

    let forwarder: Arc<dyn CommandForwarder> = Arc::new(
        HttpCommandForwarder::new(&config.executor).context("Invalid executor endpoint")?,
    );
    if config.executor.auth_token.is_none() {
        info!("No MCP_AUTH_TOKEN set. Executor requests are unauthenticated.");
    }

    if config.tts_api_key.is_none() {
        warn!("GOOGLE_TTS_API_KEY is not set. /api/tts/audio will fail.");
    }
    if config.signing.key.is_none() && config.signing.required {
        warn!("TTS_SIGNING_KEY is not set. /api/tts/audio will refuse to release audio.");
    }
    let tts_engine = GoogleTtsEngine::new(config.tts_api_key.clone())
        .context("Failed to initialize text-to-speech engine")?;
    let speech = Arc::new(SpeechGateway::new(
        Arc::new(tts_engine),
        forwarder.clone(),
        &config.signing,
    ));

    // --- 4. Optional Mock Executor ---
    if config.use_mock_executor {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, config.mock_executor_port));
        MockExecutor::new()
            .spawn(addr, &config.executor)
            .await
            .context("Failed to start mock executor")?;
    }

    let app_state = Arc::new(AppState {
        config: Arc::new(config.clone()),
        lesson_generator,
        forwarder,
        speech,
    });

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        provider = ?config.provider,
        model = %config.chat_model,
        executor = %config.executor.base_url,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server has shut down.");
    Ok(())
}
