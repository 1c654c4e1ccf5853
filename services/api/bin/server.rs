//! Main Entrypoint for the Aldea API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Selecting the session store backend (Redis or in-memory).
//! 3. Initializing the speech, language-model, and telephony clients.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use aldea_api::{
    config::Config,
    router::create_router,
    state::AppState,
    store::connect_store,
    stt::DeepgramRecognizer,
    telephony::TwilioClient,
    tts::CartesiaSynthesizer,
};
use aldea_core::llm::OpenAiGenerator;
use anyhow::Context;
use async_openai::config::OpenAIConfig;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    let store = connect_store(&config).await;

    let openai_config = OpenAIConfig::new().with_api_key(&config.openai_api_key);
    let generator = Arc::new(OpenAiGenerator::new(
        openai_config,
        config.chat_model.clone(),
    ));

    let recognizer = Arc::new(DeepgramRecognizer::new(
        config.deepgram_api_key.clone(),
        config.deepgram_base_url.clone(),
    ));
    let synthesizer = Arc::new(CartesiaSynthesizer::new(
        config.cartesia_api_key.clone(),
        config.cartesia_base_url.clone(),
        config.cartesia_voice_id.clone(),
        config.cartesia_voice_id_spanish.clone(),
    ));
    let telephony = Arc::new(TwilioClient::new(&config));

    let state = AppState {
        store,
        recognizer,
        synthesizer,
        generator,
        telephony,
        config: Arc::new(config.clone()),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state).layer(cors);

    info!(
        model = %config.chat_model,
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
