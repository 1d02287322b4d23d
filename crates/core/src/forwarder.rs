//! Command Forwarder
//!
//! Relays envelopes to the downstream executor over plain JSON-over-HTTP.
//! Every call is a single attempt bounded by a fixed timeout; forwarding the
//! same envelope twice produces two executor side effects.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::{Client, Response, Url};
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};

use crate::{error::ForwardError, lesson::ForwardEnvelope};

pub const DEFAULT_FORWARD_PATH: &str = "/lesson";
pub const DEFAULT_HEALTH_PATH: &str = "/health";
pub const DEFAULT_FORWARD_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(4);

/// Where and how to reach the downstream executor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutorEndpoint {
    pub base_url: String,
    pub forward_path: String,
    pub health_path: String,
    /// Sent as a bearer token when present. `None` means unauthenticated calls.
    pub auth_token: Option<String>,
    pub forward_timeout: Duration,
    pub health_timeout: Duration,
}

impl ExecutorEndpoint {
    /// An endpoint at `base_url` with the default paths and timeouts.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            forward_path: DEFAULT_FORWARD_PATH.to_string(),
            health_path: DEFAULT_HEALTH_PATH.to_string(),
            auth_token: None,
            forward_timeout: DEFAULT_FORWARD_TIMEOUT,
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
        }
    }

    pub fn forward_url(&self) -> String {
        join_url(&self.base_url, &self.forward_path)
    }

    pub fn health_url(&self) -> String {
        join_url(&self.base_url, &self.health_path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Relays commands to, and probes the health of, the downstream executor.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CommandForwarder: Send + Sync {
    /// Posts `envelope` once and returns the executor's acknowledgement body.
    async fn forward(&self, envelope: &ForwardEnvelope) -> Result<Value, ForwardError>;

    /// Returns the executor's health body verbatim.
    async fn health(&self) -> Result<Value, ForwardError>;
}

/// A `CommandForwarder` that talks HTTP via `reqwest`.
pub struct HttpCommandForwarder {
    client: Client,
    endpoint: ExecutorEndpoint,
    forward_url: Url,
    health_url: Url,
}

impl HttpCommandForwarder {
    pub fn new(endpoint: &ExecutorEndpoint) -> Result<Self, ForwardError> {
        let parse = |url: String| {
            Url::parse(&url).map_err(|e| ForwardError::InvalidEndpoint(format!("{url}: {e}")))
        };
        Ok(Self {
            client: Client::new(),
            forward_url: parse(endpoint.forward_url())?,
            health_url: parse(endpoint.health_url())?,
            endpoint: endpoint.clone(),
        })
    }
}

#[async_trait]
impl CommandForwarder for HttpCommandForwarder {
    async fn forward(&self, envelope: &ForwardEnvelope) -> Result<Value, ForwardError> {
        info!(
            url = %self.forward_url,
            commands = envelope.lesson.len(),
            "Forwarding lesson to executor"
        );

        let mut request = self
            .client
            .post(self.forward_url.clone())
            .timeout(self.endpoint.forward_timeout)
            .json(envelope);
        if let Some(token) = self.endpoint.auth_token.as_deref().filter(|t| !t.is_empty()) {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            warn!(url = %self.forward_url, error = %e, "Executor unreachable");
            ForwardError::Unreachable(e)
        })?;
        read_body(response).await
    }

    async fn health(&self) -> Result<Value, ForwardError> {
        let response = self
            .client
            .get(self.health_url.clone())
            .timeout(self.endpoint.health_timeout)
            .send()
            .await
            .map_err(ForwardError::Unreachable)?;
        read_body(response).await
    }
}

/// Returns a 2xx body as JSON (or as a JSON string when it is not JSON).
async fn read_body(response: Response) -> Result<Value, ForwardError> {
    let status = response.status();
    let text = response.text().await.map_err(ForwardError::Unreachable)?;

    if !status.is_success() {
        warn!(status = status.as_u16(), body = %text, "Executor rejected request");
        return Err(ForwardError::Rejected {
            status: status.as_u16(),
            detail: text,
        });
    }

    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    match serde_json::from_str::<Value>(&text) {
        Ok(body) => Ok(body),
        Err(_) => Ok(Value::String(text)),
    }
}
