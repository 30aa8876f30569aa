//! `conduit serve` - run the HTTP service.

use conduit_core::{ConduitConfig, MemoryBackend};

pub async fn run(config: &ConduitConfig) -> anyhow::Result<()> {
    if config.memory.backend == MemoryBackend::Memory {
        tracing::warn!("Event log is in-process only; events are lost on shutdown");
    }
    conduit_server::serve(config).await
}
