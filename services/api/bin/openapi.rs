//! Dumps the Chiron REST contract (lesson, executor and speech routes) as
//! OpenAPI JSON, so clients can be generated without starting the server.
//!
//! Usage: `openapi [OUTPUT]`, defaulting to `openapi.json`.

use anyhow::Context;
use chiron_api::router::ApiDoc;
use utoipa::OpenApi;

fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "openapi.json".to_string());

    let api = ApiDoc::openapi();
    let doc = api
        .to_pretty_json()
        .context("Failed to serialize the Chiron API document")?;
    std::fs::write(&path, doc).with_context(|| format!("Failed to write {}", path))?;

    println!("Wrote {} routes to {}", api.paths.paths.len(), path);
    Ok(())
}
