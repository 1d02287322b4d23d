//! API Request and Response Models
//!
//! Wire shapes for every endpoint, annotated with `utoipa` so the OpenAPI
//! document stays in step with the handlers.

use chiron_core::{lesson::LessonStep, speech::SpeechResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateLessonPayload {
    /// A chapter title picked from the lesson map.
    #[schema(example = "Extrude Tool")]
    pub chapter_title: Option<String>,
    /// A free-form request typed by the user. Takes precedence over `chapterTitle`.
    #[schema(example = "How do I model a coffee mug?")]
    pub user_request: Option<String>,
    /// Also relay the generated lesson to the downstream executor.
    #[serde(default)]
    pub forward: bool,
}

impl GenerateLessonPayload {
    /// The topic to generate for, and whether it is a free-form request.
    pub fn topic(&self) -> Option<(&str, bool)> {
        non_blank(&self.user_request)
            .map(|request| (request, true))
            .or_else(|| non_blank(&self.chapter_title).map(|title| (title, false)))
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

#[derive(Serialize, ToSchema, Debug)]
pub struct GenerateLessonResponse {
    pub success: bool,
    #[schema(example = "Extrude Tool")]
    pub chapter: String,
    #[schema(value_type = Vec<Object>)]
    pub steps: Vec<LessonStep>,
    /// Executor acknowledgement, present when `forward` was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub upstream: Option<Value>,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct LessonErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Raw model response, present when no candidates were returned.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// `{ lesson: [...] }`. Any other JSON value is treated as the lesson itself.
#[derive(Deserialize, ToSchema, Debug)]
pub struct ForwardPayload {
    #[schema(value_type = Vec<Object>)]
    pub lesson: Vec<Value>,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct ForwardResponse {
    pub success: bool,
    #[schema(value_type = Object)]
    pub upstream: Value,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct HealthResponse {
    pub success: bool,
    #[schema(value_type = Object)]
    pub health: Value,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct HealthErrorResponse {
    pub success: bool,
    pub error: String,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Deserialize, ToSchema, Debug, Default)]
pub struct TtsPayload {
    #[schema(example = "Press E to extrude the selected face.")]
    pub text: Option<String>,
    pub voice: Option<String>,
    #[schema(example = "en-US")]
    pub lang: Option<String>,
    /// `blender` (default) forwards a SPEAK command; `web` echoes the text back.
    #[schema(example = "blender")]
    pub target: Option<String>,
}

impl TtsPayload {
    pub fn targets_executor(&self) -> bool {
        self.target
            .as_deref()
            .is_none_or(|target| target.eq_ignore_ascii_case("blender"))
    }
}

#[derive(Serialize, ToSchema, Debug, PartialEq)]
#[serde(untagged)]
pub enum TtsResponse {
    Forwarded {
        status: String,
        target: String,
    },
    Echo {
        status: String,
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        voice: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        lang: Option<String>,
    },
}

#[derive(Deserialize, ToSchema, Debug, Default)]
pub struct TtsAudioPayload {
    pub text: Option<String>,
    pub voice: Option<String>,
    pub lang: Option<String>,
    /// `mp3` (default) or `wav`.
    #[schema(example = "mp3")]
    pub format: Option<String>,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct TtsAudioResponse {
    pub success: bool,
    #[schema(example = "audio/mpeg")]
    pub mime: String,
    /// Base64-encoded audio.
    pub audio: String,
    /// Hex HMAC-SHA256 over the raw audio bytes.
    pub signature: Option<String>,
    #[schema(example = "HMAC-SHA256")]
    pub algorithm: Option<String>,
    pub key_id: Option<String>,
    pub created_at: String,
}

impl From<SpeechResult> for TtsAudioResponse {
    fn from(result: SpeechResult) -> Self {
        Self {
            success: true,
            mime: result.mime,
            audio: result.audio,
            signature: result.signature,
            algorithm: result.algorithm,
            key_id: result.key_id,
            created_at: result.created_at,
        }
    }
}
