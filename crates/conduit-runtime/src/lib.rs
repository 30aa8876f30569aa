//! # conduit-runtime
//!
//! The ingest pipeline proper:
//!
//! - [`capability`]: the `Classifier` / `Extractor` traits the pipeline
//!   consumes, and the registry selecting an extractor by format
//! - [`transport`]: the HTTP transport used to deliver actions
//! - [`router`]: `ActionRouter`, turning an action suggestion into an
//!   outcome with bounded retries
//! - [`dispatcher`]: `Dispatcher`, sequencing one ingest request end to end

pub mod capability;
pub mod dispatcher;
pub mod error;
pub mod router;
pub mod transport;

pub use capability::{Classifier, Extractor, ExtractorRegistry};
pub use dispatcher::{Dispatcher, IngestStage};
pub use error::DispatchError;
pub use router::{ActionRouter, RetryPolicy};
pub use transport::{HttpTransport, Transport, TransportError, TransportResponse};
