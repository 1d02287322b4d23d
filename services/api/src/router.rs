//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API and OpenAPI documentation.

use crate::{
    handlers,
    models::{
        ErrorResponse, ForwardPayload, ForwardResponse, GenerateLessonPayload,
        GenerateLessonResponse, HealthErrorResponse, HealthResponse, LessonErrorResponse,
        TtsAudioPayload, TtsAudioResponse, TtsPayload, TtsResponse,
    },
    state::AppState,
};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::generate_lesson,
        handlers::forward_lesson,
        handlers::executor_health,
        handlers::tts,
        handlers::tts_audio,
    ),
    components(
        schemas(
            GenerateLessonPayload, GenerateLessonResponse, LessonErrorResponse,
            ForwardPayload, ForwardResponse, HealthResponse, HealthErrorResponse,
            TtsPayload, TtsResponse, TtsAudioPayload, TtsAudioResponse, ErrorResponse
        )
    ),
    tags(
        (name = "Chiron API", description = "Lesson generation, command forwarding and speech synthesis for the Blender tutor")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Group all routes that require AppState into their own router.
    let api_router = Router::new()
        .route("/generate-lesson", post(handlers::generate_lesson))
        .route("/mcp/forward", post(handlers::forward_lesson))
        .route("/mcp/health", get(handlers::executor_health))
        .route("/tts", post(handlers::tts))
        .route("/tts/audio", post(handlers::tts_audio))
        .with_state(app_state);

    Router::new()
        .route("/", get(handlers::index))
        .nest("/api", api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
}
