//! `conduit audit` - print events from the configured event log.

use clap::{Args, ValueEnum};
use conduit_core::{ConduitConfig, MemoryBackend};
use conduit_memory::{EventFilter, EventLog};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One JSON object per line
    Json,
    /// `[timestamp] source/key payload`
    Text,
}

#[derive(Args, Debug)]
pub struct AuditArgs {
    /// Only events from this source (e.g. "router")
    #[arg(long)]
    pub source: Option<String>,

    /// Only events with this key (e.g. "action")
    #[arg(long)]
    pub key: Option<String>,

    /// Only events whose payload `action` matches (e.g. "escalate")
    #[arg(long)]
    pub action: Option<String>,

    /// Maximum number of events to print
    #[arg(long)]
    pub limit: Option<usize>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,
}

impl AuditArgs {
    pub fn filter(&self) -> EventFilter {
        EventFilter {
            source: self.source.clone(),
            key: self.key.clone(),
            action: self.action.clone(),
            limit: self.limit,
            offset: None,
        }
    }
}

pub async fn run(config: &ConduitConfig, args: &AuditArgs) -> anyhow::Result<()> {
    if config.memory.backend == MemoryBackend::Memory {
        tracing::warn!("Event log backend is `memory`; nothing persists between runs");
    }

    let memory = EventLog::from_config(&config.memory)?;
    let events = memory.query(args.filter()).await?;

    for event in &events {
        match args.format {
            OutputFormat::Json => println!("{}", serde_json::to_string(event)?),
            OutputFormat::Text => println!("{}", event.to_log_line()),
        }
    }

    memory.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::MemoryConfig;
    use serde_json::json;

    #[tokio::test]
    async fn test_filter_reads_persisted_events() {
        let dir = tempfile::tempdir().unwrap();
        let memory = MemoryConfig {
            backend: MemoryBackend::File,
            path: dir.path().join("events.jsonl").display().to_string(),
        };

        let log = EventLog::from_config(&memory).unwrap();
        for action in ["store", "escalate"] {
            log.append_serialized("router", "action", &json!({ "action": action }))
                .await
                .unwrap();
        }
        log.close().await;

        let args = AuditArgs {
            source: None,
            key: Some("action".to_string()),
            action: Some("escalate".to_string()),
            limit: None,
            format: OutputFormat::Json,
        };
        let reopened = EventLog::from_config(&memory).unwrap();
        let events = reopened.query(args.filter()).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action(), Some("escalate"));
    }
}
