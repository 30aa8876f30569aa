//! `conduit ingest <FILE>` - run one ingest request without the HTTP layer.

use anyhow::Context;
use conduit_core::ConduitConfig;
use conduit_server::AppState;
use std::path::Path;

pub async fn run(config: &ConduitConfig, file: &Path) -> anyhow::Result<()> {
    let raw = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let filename = file
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();

    let state = AppState::init(config)?;
    let result = state.dispatcher.handle_ingest(&raw, filename).await;
    state.shutdown().await;

    let response = match result {
        Ok(response) => response,
        Err(e) => {
            let step = e.failed_step();
            return Err(anyhow::Error::new(e).context(format!("Ingest failed during {}", step)));
        }
    };

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
