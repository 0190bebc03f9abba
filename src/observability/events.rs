//! Structured event stream for resolution runs.
//!
//! Events are serialized as newline-delimited JSON (JSONL) with a
//! monotonically increasing sequence number.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::resolver::{LockingMode, TransactionMode};

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete event emitted while resolving a container.
///
/// Each variant is tagged with `"type"` when serialized to JSON.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A cache's transaction configuration was resolved.
    CacheResolved {
        /// When the cache was resolved.
        timestamp: DateTime<Utc>,
        /// Owning container.
        container: String,
        /// Cache name.
        cache: String,
        /// Requested transaction mode.
        mode: TransactionMode,
        /// Resolved locking mode.
        locking: LockingMode,
        /// Resolved stop timeout in milliseconds.
        stop_timeout_ms: u64,
        /// Whether the cache is transactional.
        transactional: bool,
        /// Whether transactions enlist through a synchronization.
        use_synchronization: bool,
        /// Whether XA recovery is enabled.
        recovery_enabled: bool,
    },

    /// A cache could not be resolved.
    ResolutionFailed {
        /// When the failure occurred.
        timestamp: DateTime<Utc>,
        /// Owning container.
        container: String,
        /// Cache name.
        cache: String,
        /// Error kind (`invalid_configuration`, `missing_collaborator`).
        kind: String,
        /// Human-readable error.
        error: String,
    },

    /// Every cache of a container has been processed.
    ContainerResolved {
        /// When the run finished.
        timestamp: DateTime<Utc>,
        /// Container name.
        container: String,
        /// Caches resolved successfully.
        resolved: usize,
        /// Caches that failed.
        failed: usize,
    },
}

/// Wraps an [`Event`] with a sequence number.
#[derive(Debug, Serialize)]
struct EventEnvelope {
    sequence: u64,
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe, buffered JSONL event writer.
///
/// Serialization or I/O failures are dropped; a broken event sink never
/// fails a resolution.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter that discards all events.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Creates an emitter that writes to a file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Emits an event as a single JSONL line.
    pub fn emit(&self, event: Event) {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope { sequence, event };

        if let Ok(mut w) = self.writer.lock() {
            if let Ok(line) = serde_json::to_string(&envelope) {
                let _ = writeln!(w, "{line}");
                let _ = w.flush();
            }
        }
    }

    /// Number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
