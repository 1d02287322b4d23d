//! Axum Handlers for the REST API
//!
//! Every failure is turned into a structured JSON body here: 400 for bad
//! client input, 500 for this service's own failures (including the model and
//! speech engine), and 502 when the downstream executor is at fault.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chiron_core::{
    error::{ForwardError, LessonError, SpeechError},
    lesson::{EnvelopeError, ForwardEnvelope},
    speech::AudioFormat,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, warn};

use crate::{
    models::{
        ErrorResponse, ForwardPayload, ForwardResponse, GenerateLessonPayload, GenerateLessonResponse,
        HealthErrorResponse, HealthResponse, LessonErrorResponse, TtsAudioPayload,
        TtsAudioResponse, TtsPayload, TtsResponse,
    },
    state::AppState,
};

const LESSON_FAILURE: &str = "Failed to generate lesson content";
const FORWARD_FAILURE: &str = "failed to forward to executor";
const NO_CANDIDATES: &str =
    "No candidates returned. Safety filters might have blocked the response.";

#[derive(Debug)]
pub enum ApiError {
    /// 400 with `{ error }`.
    BadRequest(String),
    /// 500 with `{ error, detail? }`.
    Internal { error: String, detail: Option<String> },
    /// 502 with `{ error, detail }`.
    BadGateway { error: String, detail: String },
    /// Lesson generation failures use the `{ success: false, ... }` envelope.
    Lesson {
        status: StatusCode,
        body: LessonErrorResponse,
    },
    /// 502 with `{ success: false, error }`.
    HealthUnavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(error) => {
                warn!(error = %error, "Rejected request");
                (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse {
                        error,
                        detail: None,
                    }),
                )
                    .into_response()
            }
            ApiError::Internal { error, detail } => {
                error!(error = %error, detail = ?detail, "Internal Server Error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { error, detail }),
                )
                    .into_response()
            }
            ApiError::BadGateway { error, detail } => {
                error!(error = %error, detail = %detail, "Downstream executor failure");
                (
                    StatusCode::BAD_GATEWAY,
                    Json(ErrorResponse {
                        error,
                        detail: Some(detail),
                    }),
                )
                    .into_response()
            }
            ApiError::Lesson { status, body } => {
                if status.is_server_error() {
                    error!(error = %body.error, message = ?body.message, "Lesson generation failed");
                } else {
                    warn!(error = %body.error, "Rejected lesson request");
                }
                (status, Json(body)).into_response()
            }
            ApiError::HealthUnavailable(error) => {
                warn!(error = %error, "Executor health check failed");
                (
                    StatusCode::BAD_GATEWAY,
                    Json(HealthErrorResponse {
                        success: false,
                        error,
                    }),
                )
                    .into_response()
            }
        }
    }
}

impl ApiError {
    fn lesson(
        status: StatusCode,
        error: impl Into<String>,
        message: Option<String>,
        details: Option<Value>,
        stack: Option<String>,
    ) -> Self {
        ApiError::Lesson {
            status,
            body: LessonErrorResponse {
                success: false,
                error: error.into(),
                message,
                details,
                stack,
            },
        }
    }

    fn from_lesson_error(err: LessonError, expose_stack: bool) -> Self {
        let stack = expose_stack.then(|| format!("{:?}", err));
        match err {
            LessonError::InvalidInput(message) => {
                Self::lesson(StatusCode::BAD_REQUEST, message, None, None, None)
            }
            LessonError::NoCandidates { raw } => Self::lesson(
                StatusCode::INTERNAL_SERVER_ERROR,
                NO_CANDIDATES,
                None,
                Some(raw),
                None,
            ),
            other => Self::lesson(
                StatusCode::INTERNAL_SERVER_ERROR,
                LESSON_FAILURE,
                Some(other.to_string()),
                None,
                stack,
            ),
        }
    }

    fn from_forward_error(err: ForwardError) -> Self {
        ApiError::BadGateway {
            error: FORWARD_FAILURE.to_string(),
            detail: err.to_string(),
        }
    }
}

/// Maps speech failures for both `/tts` and `/tts/audio`.
impl From<SpeechError> for ApiError {
    fn from(err: SpeechError) -> Self {
        match err {
            SpeechError::InvalidInput(message) => ApiError::BadRequest(message),
            SpeechError::InputTooLarge { .. } => ApiError::BadRequest("text too long".to_string()),
            SpeechError::SigningKeyMissing => ApiError::Internal {
                error: "signing_key_missing".to_string(),
                detail: None,
            },
            SpeechError::SynthesisEmptyResult => ApiError::Internal {
                error: "tts_failed".to_string(),
                detail: Some("no audio content returned".to_string()),
            },
            SpeechError::Engine(source) => ApiError::Internal {
                error: "tts_error".to_string(),
                detail: Some(format!("{:#}", source)),
            },
            SpeechError::Forward(source) => ApiError::Internal {
                error: "forward failed".to_string(),
                detail: Some(source.to_string()),
            },
        }
    }
}

/// Decodes a JSON body, treating an empty body as the default value.
fn decode_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, serde_json::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
}

fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    decode_body(body).map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {}", e)))
}

/// Plain-text listing of the available endpoints.
pub async fn index() -> &'static str {
    "Chiron backend running. Available endpoints:\n\
     - POST /api/generate-lesson\n\
     - POST /api/mcp/forward\n\
     - GET  /api/mcp/health\n\
     - POST /api/tts\n\
     - POST /api/tts/audio\n"
}

/// Generate a step-by-step lesson for a chapter title or a free-form request.
#[utoipa::path(
    post,
    path = "/api/generate-lesson",
    request_body = GenerateLessonPayload,
    responses(
        (status = 200, description = "Lesson generated", body = GenerateLessonResponse),
        (status = 400, description = "No topic given", body = LessonErrorResponse),
        (status = 500, description = "Model failed or returned an unusable lesson", body = LessonErrorResponse),
        (status = 502, description = "Lesson generated but forwarding failed", body = LessonErrorResponse)
    )
)]
pub async fn generate_lesson(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<GenerateLessonResponse>, ApiError> {
    let payload: GenerateLessonPayload = decode_body(&body).map_err(|e| {
        ApiError::lesson(
            StatusCode::BAD_REQUEST,
            "invalid JSON body",
            Some(e.to_string()),
            None,
            None,
        )
    })?;
    let Some((topic, is_custom_request)) = payload.topic() else {
        return Err(ApiError::lesson(
            StatusCode::BAD_REQUEST,
            "chapterTitle or userRequest is required",
            None,
            None,
            None,
        ));
    };

    let lesson = state
        .lesson_generator
        .generate_lesson(topic, is_custom_request)
        .await
        .map_err(|e| ApiError::from_lesson_error(e, state.config.expose_error_stack))?;

    let upstream = if payload.forward {
        let ack = state
            .forwarder
            .forward(&lesson.to_envelope())
            .await
            .map_err(|e| {
                ApiError::lesson(
                    StatusCode::BAD_GATEWAY,
                    FORWARD_FAILURE,
                    Some(e.to_string()),
                    None,
                    None,
                )
            })?;
        Some(ack)
    } else {
        None
    };

    Ok(Json(GenerateLessonResponse {
        success: true,
        chapter: lesson.chapter,
        steps: lesson.steps,
        upstream,
    }))
}

/// Relay a lesson (or a single command) to the downstream executor.
#[utoipa::path(
    post,
    path = "/api/mcp/forward",
    request_body = ForwardPayload,
    responses(
        (status = 200, description = "Executor accepted the lesson", body = ForwardResponse),
        (status = 400, description = "Missing or malformed lesson payload", body = ErrorResponse),
        (status = 502, description = "Executor unreachable or rejected the lesson", body = ErrorResponse)
    )
)]
pub async fn forward_lesson(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ForwardResponse>, ApiError> {
    let payload: Value = parse_body(&body)?;
    let envelope = ForwardEnvelope::from_payload(payload).map_err(|e| match e {
        EnvelopeError::Missing => ApiError::BadRequest("missing lesson payload".to_string()),
        other => ApiError::BadRequest(other.to_string()),
    })?;

    let upstream = state
        .forwarder
        .forward(&envelope)
        .await
        .map_err(ApiError::from_forward_error)?;

    Ok(Json(ForwardResponse {
        success: true,
        upstream,
    }))
}

/// Report the downstream executor's health.
#[utoipa::path(
    get,
    path = "/api/mcp/health",
    responses(
        (status = 200, description = "Executor health body", body = HealthResponse),
        (status = 502, description = "Executor unreachable", body = HealthErrorResponse)
    )
)]
pub async fn executor_health(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HealthResponse>, ApiError> {
    let health = state
        .forwarder
        .health()
        .await
        .map_err(|e| ApiError::HealthUnavailable(e.to_string()))?;

    Ok(Json(HealthResponse {
        success: true,
        health,
    }))
}

/// Speak text on the executor (`target: blender`) or echo it back (`target: web`).
#[utoipa::path(
    post,
    path = "/api/tts",
    request_body = TtsPayload,
    responses(
        (status = 200, description = "Forwarded or echoed", body = TtsResponse),
        (status = 400, description = "Missing text", body = ErrorResponse),
        (status = 500, description = "Forwarding failed", body = ErrorResponse)
    )
)]
pub async fn tts(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<TtsResponse>, ApiError> {
    let payload: TtsPayload = parse_body(&body)?;
    let text = payload
        .text
        .as_deref()
        .filter(|text| !text.is_empty())
        .ok_or_else(|| ApiError::BadRequest("text required".to_string()))?;

    if payload.targets_executor() {
        state
            .speech
            .speak(text, payload.voice.as_deref(), payload.lang.as_deref())
            .await?;
        return Ok(Json(TtsResponse::Forwarded {
            status: "forwarded".to_string(),
            target: "blender".to_string(),
        }));
    }

    Ok(Json(TtsResponse::Echo {
        status: "ok".to_string(),
        text: text.to_string(),
        voice: payload.voice.clone(),
        lang: payload.lang.clone(),
    }))
}

/// Synthesize signed audio for the given text.
#[utoipa::path(
    post,
    path = "/api/tts/audio",
    request_body = TtsAudioPayload,
    responses(
        (status = 200, description = "Signed audio", body = TtsAudioResponse),
        (status = 400, description = "Missing or oversized text", body = ErrorResponse),
        (status = 500, description = "Signing key missing or synthesis failed", body = ErrorResponse)
    )
)]
pub async fn tts_audio(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<TtsAudioResponse>, ApiError> {
    let payload: TtsAudioPayload = parse_body(&body)?;
    let result = state
        .speech
        .synthesize(
            payload.text.as_deref().unwrap_or_default(),
            payload.voice.as_deref(),
            payload.lang.as_deref(),
            AudioFormat::from_name(payload.format.as_deref()),
        )
        .await?;

    Ok(Json(result.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::json;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_speech_error_mapping() {
        let cases = [
            (
                SpeechError::InvalidInput("text required".to_string()),
                StatusCode::BAD_REQUEST,
                "text required",
            ),
            (
                SpeechError::InputTooLarge { len: 6000, limit: 5000 },
                StatusCode::BAD_REQUEST,
                "text too long",
            ),
            (
                SpeechError::SigningKeyMissing,
                StatusCode::INTERNAL_SERVER_ERROR,
                "signing_key_missing",
            ),
            (
                SpeechError::SynthesisEmptyResult,
                StatusCode::INTERNAL_SERVER_ERROR,
                "tts_failed",
            ),
            (
                SpeechError::Engine(anyhow::anyhow!("quota")),
                StatusCode::INTERNAL_SERVER_ERROR,
                "tts_error",
            ),
        ];

        for (err, status, code) in cases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), status);
            assert_eq!(body_json(response).await["error"], code);
        }
    }

    #[tokio::test]
    async fn test_no_candidates_body_carries_raw_response() {
        let raw = json!({ "choices": [] });
        let response =
            ApiError::from_lesson_error(LessonError::NoCandidates { raw: raw.clone() }, false)
                .into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["details"], raw);
        assert!(body["error"].as_str().unwrap().contains("No candidates"));
    }

    #[tokio::test]
    async fn test_stack_only_when_exposed() {
        let parse_error = || {
            LessonError::GenerationParse(serde_json::from_str::<Value>("nope").unwrap_err())
        };

        let hidden = body_json(ApiError::from_lesson_error(parse_error(), false).into_response()).await;
        assert_eq!(hidden["error"], LESSON_FAILURE);
        assert!(hidden["message"].is_string());
        assert!(hidden.get("stack").is_none());

        let exposed = body_json(ApiError::from_lesson_error(parse_error(), true).into_response()).await;
        assert!(exposed["stack"].as_str().unwrap().contains("GenerationParse"));
    }

    #[tokio::test]
    async fn test_forward_error_is_bad_gateway() {
        let response = ApiError::from_forward_error(ForwardError::Rejected {
            status: 500,
            detail: "boom".to_string(),
        })
        .into_response();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert_eq!(body["error"], FORWARD_FAILURE);
        assert!(body["detail"].as_str().unwrap().contains("boom"));
    }

    #[test]
    fn test_parse_body_defaults_on_empty() {
        let payload: TtsPayload = parse_body(&Bytes::from_static(b"  \n")).unwrap();
        assert!(payload.text.is_none());

        let err = parse_body::<TtsPayload>(&Bytes::from_static(b"{not json")).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
