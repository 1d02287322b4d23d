//! Error types for the three gateways.
//!
//! Each gateway reports its own enum so the HTTP layer can map a failure to
//! a status code without inspecting message strings.

use serde_json::Value;

/// Failures of the lesson generation path.
#[derive(Debug, thiserror::Error)]
pub enum LessonError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The model answered but produced no candidate text (e.g. safety filtering).
    #[error("No candidates returned. Safety filters might have blocked the response.")]
    NoCandidates { raw: Value },
    #[error("model output is not valid JSON: {0}")]
    GenerationParse(#[from] serde_json::Error),
    #[error("step {index} does not match the lesson schema: {reason}")]
    SchemaViolation { index: usize, reason: String },
    #[error("generation model call failed: {0}")]
    Model(#[source] anyhow::Error),
}

/// Failures talking to the downstream executor.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("invalid executor endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("executor unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),
    #[error("executor responded with status {status}: {detail}")]
    Rejected { status: u16, detail: String },
}

/// Failures of the speech synthesis path, in both audio and forward mode.
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("text too long: {len} characters exceeds the limit of {limit}")]
    InputTooLarge { len: usize, limit: usize },
    #[error("no audio content returned")]
    SynthesisEmptyResult,
    #[error("signing_key_missing")]
    SigningKeyMissing,
    #[error("synthesis engine call failed: {0}")]
    Engine(#[source] anyhow::Error),
    #[error(transparent)]
    Forward(#[from] ForwardError),
}
