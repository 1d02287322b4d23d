//! Speech Synthesis Service
//!
//! Produces signed audio for web clients, or hands the text to the downstream
//! executor as a `SPEAK` command so it is spoken on the executor's side.

use anyhow::{Context, bail};
use async_trait::async_trait;
use base64::Engine;
use chrono::{SecondsFormat, Utc};
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

use crate::{
    error::SpeechError,
    forwarder::CommandForwarder,
    lesson::ForwardEnvelope,
    signing::{SIGNATURE_ALGORITHM, sign_audio},
};

/// Longest text, in characters, accepted for audio synthesis.
pub const MAX_TEXT_CHARS: usize = 5000;
pub const DEFAULT_LANGUAGE: &str = "en-US";
pub const GOOGLE_TTS_BASE_URL: &str = "https://texttospeech.googleapis.com";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Mp3,
    Wav,
}

impl AudioFormat {
    /// `"wav"` selects WAV; anything else, including nothing, selects MP3.
    pub fn from_name(name: Option<&str>) -> Self {
        match name {
            Some(name) if name.eq_ignore_ascii_case("wav") => AudioFormat::Wav,
            _ => AudioFormat::Mp3,
        }
    }

    /// The synthesis engine's encoding enum value.
    pub fn encoding(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "MP3",
            AudioFormat::Wav => "LINEAR16",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Wav => "audio/wav",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice: Option<String>,
    pub language_code: String,
    pub format: AudioFormat,
}

/// A hosted text-to-speech engine.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Synthesizes `request` once. `Ok(None)` means the engine answered
    /// without any audio.
    async fn synthesize(&self, request: &SynthesisRequest) -> anyhow::Result<Option<Vec<u8>>>;
}

/// Google Cloud Text-to-Speech over its REST API.
pub struct GoogleTtsEngine {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl GoogleTtsEngine {
    pub fn new(api_key: Option<String>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build text-to-speech HTTP client")?;
        Ok(Self {
            client,
            api_key,
            base_url: GOOGLE_TTS_BASE_URL.to_string(),
        })
    }

    /// Points the engine at a different host, e.g. a regional endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

// Wire types for `v1/text:synthesize`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeBody<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    audio_config: AudioConfig,
}

#[derive(Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig {
    audio_encoding: &'static str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    #[serde(default)]
    audio_content: Option<String>,
}

#[async_trait]
impl SpeechEngine for GoogleTtsEngine {
    async fn synthesize(&self, request: &SynthesisRequest) -> anyhow::Result<Option<Vec<u8>>> {
        let Some(api_key) = self.api_key.as_deref() else {
            bail!("GOOGLE_TTS_API_KEY is not configured");
        };

        let body = SynthesizeBody {
            input: SynthesisInput {
                text: &request.text,
            },
            voice: VoiceSelection {
                language_code: &request.language_code,
                name: request.voice.as_deref(),
            },
            audio_config: AudioConfig {
                audio_encoding: request.format.encoding(),
            },
        };

        let response = self
            .client
            .post(format!(
                "{}/v1/text:synthesize",
                self.base_url.trim_end_matches('/')
            ))
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await
            .context("text-to-speech request failed")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            bail!("text-to-speech returned {}: {}", status, detail);
        }

        let parsed: SynthesizeResponse = response
            .json()
            .await
            .context("text-to-speech response was not valid JSON")?;

        match parsed.audio_content.filter(|content| !content.is_empty()) {
            Some(content) => Ok(Some(
                base64::engine::general_purpose::STANDARD
                    .decode(content)
                    .context("audioContent is not valid base64")?,
            )),
            None => Ok(None),
        }
    }
}

/// How synthesized audio is signed.
#[derive(Clone, Debug, Default)]
pub struct SigningConfig {
    pub key: Option<String>,
    pub key_id: Option<String>,
    /// Refuse to release audio when no key is configured.
    pub required: bool,
}

/// Signed audio returned to web clients.
#[derive(Debug, Clone, Serialize)]
pub struct SpeechResult {
    pub mime: String,
    /// Base64-encoded audio bytes.
    pub audio: String,
    /// Hex HMAC-SHA256 over the raw audio bytes.
    pub signature: Option<String>,
    pub algorithm: Option<String>,
    pub key_id: Option<String>,
    pub created_at: String,
}

/// Mediates the speech engine (audio mode) and the executor (forward mode).
pub struct SpeechGateway {
    engine: Arc<dyn SpeechEngine>,
    forwarder: Arc<dyn CommandForwarder>,
    signing: SigningConfig,
}

impl SpeechGateway {
    pub fn new(
        engine: Arc<dyn SpeechEngine>,
        forwarder: Arc<dyn CommandForwarder>,
        signing: &SigningConfig,
    ) -> Self {
        Self {
            engine,
            forwarder,
            signing: signing.clone(),
        }
    }

    /// Synthesizes `text` into signed audio.
    ///
    /// Input limits and the signing key are checked before the engine is
    /// called, so a rejected request never costs a synthesis call.
    pub async fn synthesize(
        &self,
        text: &str,
        voice: Option<&str>,
        lang: Option<&str>,
        format: AudioFormat,
    ) -> Result<SpeechResult, SpeechError> {
        if text.is_empty() {
            return Err(SpeechError::InvalidInput("text required".to_string()));
        }
        let len = text.chars().count();
        if len > MAX_TEXT_CHARS {
            return Err(SpeechError::InputTooLarge {
                len,
                limit: MAX_TEXT_CHARS,
            });
        }

        let key = self.signing.key.as_deref().filter(|k| !k.is_empty());
        if key.is_none() && self.signing.required {
            return Err(SpeechError::SigningKeyMissing);
        }

        let request = SynthesisRequest {
            text: text.to_string(),
            voice: voice.map(str::to_string),
            language_code: lang.unwrap_or(DEFAULT_LANGUAGE).to_string(),
            format,
        };
        let audio = self
            .engine
            .synthesize(&request)
            .await
            .map_err(SpeechError::Engine)?
            .filter(|bytes| !bytes.is_empty())
            .ok_or(SpeechError::SynthesisEmptyResult)?;

        let signature = key.map(|key| sign_audio(key, &audio));
        if signature.is_none() {
            warn!("Releasing unsigned audio: no signing key configured");
        }
        info!(bytes = audio.len(), format = ?format, "Synthesized speech audio");

        Ok(SpeechResult {
            mime: format.mime().to_string(),
            audio: base64::engine::general_purpose::STANDARD.encode(&audio),
            algorithm: signature.as_ref().map(|_| SIGNATURE_ALGORITHM.to_string()),
            signature,
            key_id: self.signing.key_id.clone(),
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        })
    }

    /// Asks the downstream executor to speak `text` and returns its acknowledgement.
    pub async fn speak(
        &self,
        text: &str,
        voice: Option<&str>,
        lang: Option<&str>,
    ) -> Result<Value, SpeechError> {
        if text.is_empty() {
            return Err(SpeechError::InvalidInput("text required".to_string()));
        }
        let envelope = ForwardEnvelope::speak(text, voice, lang);
        Ok(self.forwarder.forward(&envelope).await?)
    }
}
