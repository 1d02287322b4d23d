//! Mock Downstream Executor
//!
//! A stand-in for the Blender-side control server, used for local runs
//! (`USE_MOCK_MCP=true`) and by the integration tests. It acknowledges every
//! lesson and keeps the received payloads in memory.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    routing::{get, post},
};
use chiron_core::forwarder::ExecutorEndpoint;
use serde_json::{Value, json};
use std::{net::SocketAddr, sync::Arc};
use tokio::{net::TcpListener, sync::Mutex, task::JoinHandle};
use tracing::{info, warn};

#[derive(Clone, Default)]
pub struct MockExecutor {
    received: Arc<Mutex<Vec<Value>>>,
    auth_token: Option<Arc<String>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects lesson posts that do not carry `Authorization: Bearer <token>`.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(Arc::new(token.into()));
        self
    }

    /// Every payload accepted so far, oldest first.
    pub async fn received(&self) -> Vec<Value> {
        self.received.lock().await.clone()
    }

    /// Serves the forward and health paths of `endpoint`.
    pub fn router(&self, endpoint: &ExecutorEndpoint) -> Router {
        Router::new()
            .route(&route_path(&endpoint.health_path), get(health))
            .route(&route_path(&endpoint.forward_path), post(receive_lesson))
            .with_state(self.clone())
    }

    /// Binds `addr` and serves in a background task. Returns the bound address.
    pub async fn spawn(
        &self,
        addr: SocketAddr,
        endpoint: &ExecutorEndpoint,
    ) -> anyhow::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let app = self.router(endpoint);

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                warn!(error = %e, "Mock executor stopped");
            }
        });
        info!(address = %local_addr, "Mock executor listening");

        Ok((local_addr, handle))
    }
}

fn route_path(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "server": "mock-executor" }))
}

async fn receive_lesson(
    State(executor): State<MockExecutor>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    if let Some(token) = &executor.auth_token {
        let expected = format!("Bearer {}", token);
        let given = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
        if given != Some(expected.as_str()) {
            return Err(StatusCode::UNAUTHORIZED);
        }
    }

    let preview: String = payload.to_string().chars().take(1000).collect();
    info!(payload = %preview, "Mock executor received lesson");

    let received = payload
        .get("lesson")
        .and_then(Value::as_array)
        .map_or(0, Vec::len);
    executor.received.lock().await.push(payload);

    Ok(Json(json!({ "success": true, "received": received })))
}
