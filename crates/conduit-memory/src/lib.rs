//! # conduit-memory
//!
//! The append-only event log ("memory") of the Conduit ingest pipeline.
//!
//! Every pipeline step records an [`Event`] with:
//! - `timestamp`: when it was recorded (non-decreasing across appends)
//! - `source`: the producer (`classifier`, `email_agent`, `router`, ...)
//! - `key`: a category tag (`metadata`, `extraction`, `action`)
//! - `value`: an opaque JSON object
//!
//! Events are never mutated or deleted. Reads return events oldest first,
//! optionally filtered by source, key or the payload's `action` field.
//!
//! ## Storage
//!
//! | Backend | Description |
//! |---------|-------------|
//! | `MemoryStorage` | In-process list, lost on exit |
//! | `FileStorage` | JSON Lines file, reloaded on open |
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use conduit_memory::EventLog;
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let log = EventLog::in_memory();
//!
//! log.append_serialized("classifier", "metadata", &json!({
//!     "format": "JSON",
//!     "intent": "RFQ",
//! })).await?;
//!
//! let actions = log.read_by_key("action").await?;
//! assert!(actions.is_empty());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod event;
pub mod log;
pub mod storage;

pub use error::MemoryError;
pub use event::{Event, keys, sources};
pub use log::{EventFilter, EventLog};
pub use storage::{EventStorage, FileStorage, MemoryStorage, create_storage};
