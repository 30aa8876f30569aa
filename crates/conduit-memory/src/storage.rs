//! Event storage backends.

use crate::error::MemoryError;
use crate::event::Event;
use crate::log::EventFilter;
use async_trait::async_trait;
use conduit_core::config::{MemoryBackend, MemoryConfig};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

/// Trait for event storage backends.
///
/// Implementations serialize individual appends themselves; the log never
/// needs cross-event transactions.
#[async_trait]
pub trait EventStorage: Send + Sync {
    /// Append an event to the tail. Returns the event as stored, whose
    /// timestamp may have been clamped to keep the log non-decreasing.
    async fn store(&self, event: Event) -> Result<Event, MemoryError>;

    /// Read events in append order, filtered.
    async fn query(&self, filter: &EventFilter) -> Result<Vec<Event>, MemoryError>;

    /// Release underlying resources. Further appends fail with `Closed`.
    async fn close(&self) -> Result<(), MemoryError>;
}

/// Create a storage backend based on configuration.
pub fn create_storage(config: &MemoryConfig) -> Result<Arc<dyn EventStorage>, MemoryError> {
    match config.backend {
        MemoryBackend::Memory => Ok(Arc::new(MemoryStorage::new())),
        MemoryBackend::File => Ok(Arc::new(FileStorage::open(&config.path)?)),
    }
}

/// Keep the tail non-decreasing even if the wall clock steps back.
fn stamp(mut event: Event, tail: Option<&Event>) -> Event {
    if let Some(last) = tail {
        if event.timestamp < last.timestamp {
            event.timestamp = last.timestamp;
        }
    }
    event
}

fn select(events: &[Event], filter: &EventFilter) -> Vec<Event> {
    events
        .iter()
        .filter(|e| filter.matches(e))
        .skip(filter.offset.unwrap_or(0))
        .take(filter.limit.unwrap_or(usize::MAX))
        .cloned()
        .collect()
}

fn lock_error<E: std::fmt::Display>(e: E) -> MemoryError {
    MemoryError::StorageError(format!("Failed to acquire lock: {}", e))
}

/// In-process storage.
pub struct MemoryStorage {
    state: RwLock<MemoryState>,
}

struct MemoryState {
    events: Vec<Event>,
    closed: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState {
                events: Vec::new(),
                closed: false,
            }),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStorage for MemoryStorage {
    async fn store(&self, event: Event) -> Result<Event, MemoryError> {
        let mut state = self.state.write().map_err(lock_error)?;
        if state.closed {
            return Err(MemoryError::Closed);
        }
        let event = stamp(event, state.events.last());
        state.events.push(event.clone());
        Ok(event)
    }

    async fn query(&self, filter: &EventFilter) -> Result<Vec<Event>, MemoryError> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(select(&state.events, filter))
    }

    async fn close(&self) -> Result<(), MemoryError> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.closed = true;
        Ok(())
    }
}

/// JSON Lines storage: one event per line, oldest first.
///
/// Existing lines are loaded on open so the log survives restarts. Reads are
/// served from the in-memory copy.
pub struct FileStorage {
    path: PathBuf,
    state: Mutex<FileState>,
}

struct FileState {
    file: Option<File>,
    events: Vec<Event>,
}

impl FileStorage {
    /// Open (or create) the log file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let events = if path.exists() {
            Self::load(&path)?
        } else {
            Vec::new()
        };

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        tracing::debug!(path = %path.display(), events = events.len(), "Opened event log file");

        Ok(Self {
            path,
            state: Mutex::new(FileState {
                file: Some(file),
                events,
            }),
        })
    }

    fn load(path: &Path) -> Result<Vec<Event>, MemoryError> {
        let reader = BufReader::new(File::open(path)?);
        let mut events = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Event>(&line) {
                Ok(event) => events.push(event),
                Err(e) => tracing::warn!(
                    path = %path.display(),
                    line = index + 1,
                    error = %e,
                    "Skipping unreadable event log line"
                ),
            }
        }
        Ok(events)
    }
}

#[async_trait]
impl EventStorage for FileStorage {
    async fn store(&self, event: Event) -> Result<Event, MemoryError> {
        let mut state = self.state.lock().map_err(lock_error)?;
        let event = stamp(event, state.events.last());
        let json = serde_json::to_string(&event)?;

        let file = state.file.as_mut().ok_or(MemoryError::Closed)?;
        writeln!(file, "{}", json)?;
        file.flush()?;

        state.events.push(event.clone());
        Ok(event)
    }

    async fn query(&self, filter: &EventFilter) -> Result<Vec<Event>, MemoryError> {
        let state = self.state.lock().map_err(lock_error)?;
        Ok(select(&state.events, filter))
    }

    async fn close(&self) -> Result<(), MemoryError> {
        let mut state = self.state.lock().map_err(lock_error)?;
        if let Some(file) = state.file.take() {
            file.sync_all()?;
            tracing::debug!(path = %self.path.display(), "Closed event log file");
        }
        Ok(())
    }
}
