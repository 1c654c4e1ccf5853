//! Axum Router Configuration

use crate::{handlers, state::AppState, ws::media_stream_handler};
use axum::{
    Router,
    routing::{get, post},
};

/// Creates the main Axum router for the application.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/calls", post(handlers::start_call))
        .route(
            "/api/twilio/voice/{session_id}",
            post(handlers::voice_webhook),
        )
        .route(
            "/api/twilio/status/{session_id}",
            post(handlers::status_callback),
        )
        .route(
            "/api/twilio/media-stream/{session_id}",
            get(media_stream_handler),
        )
        .with_state(state)
}
