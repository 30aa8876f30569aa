use conduit_agents::{HeuristicClassifier, default_extractors};
use conduit_core::{ConduitConfig, ServerConfig};
use conduit_memory::EventLog;
use conduit_runtime::{ActionRouter, Dispatcher};
use std::sync::Arc;

/// Shared application state.
///
/// The event log and the router are held twice: once inside the dispatcher
/// and once here, for audit reads and shutdown.
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub memory: Arc<EventLog>,
    pub router: Arc<ActionRouter>,
    /// Body limit applied to `/upload`.
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Wire the built-in agents, the configured event log and the router.
    pub fn init(cfg: &ConduitConfig) -> anyhow::Result<Self> {
        let memory = Arc::new(EventLog::from_config(&cfg.memory)?);
        let router = Arc::new(ActionRouter::from_config(&cfg.router)?);
        Ok(Self::new(memory, router).with_upload_limit(cfg.server.max_upload_bytes))
    }

    pub fn new(memory: Arc<EventLog>, router: Arc<ActionRouter>) -> Self {
        let dispatcher = Dispatcher::new(
            Arc::new(HeuristicClassifier::new()),
            default_extractors(),
            router.clone(),
            memory.clone(),
        );
        Self {
            dispatcher,
            memory,
            router,
            max_upload_bytes: ServerConfig::default().max_upload_bytes,
        }
    }

    pub fn with_upload_limit(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    /// Release the router's connection pool, then close the log.
    /// In-flight requests must have drained.
    pub async fn shutdown(&self) {
        self.router.shutdown().await;
        self.memory.close().await;
        tracing::info!("Conduit state shut down");
    }
}
