//! Structured event stream.
//!
//! Discrete, typed events describing trigger activity, serialized as
//! newline-delimited JSON (JSONL) with a monotonically increasing sequence
//! number. [`EventPublisher`] adapts the stream to the orchestrator's
//! [`StatusPublisher`] interface.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::trigger::{
    CaptureTargetId, PhaseCounters, StatusPublisher, StatusTarget, TriggerInput, TriggerStatus,
};

/// A discrete trigger event.
///
/// Tagged with `"type"` when serialized so consumers can dispatch on it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// The orchestrator and monitor loop are running.
    Started {
        /// When the run started.
        timestamp: DateTime<Utc>,
        /// Hardware backend name.
        hardware: String,
        /// Configuration file, if one was loaded.
        config: Option<String>,
    },

    /// The run has ended.
    Stopped {
        /// When the run ended.
        timestamp: DateTime<Utc>,
        /// Human-readable stop reason.
        reason: String,
    },

    /// A target's reported status changed.
    StatusChanged {
        /// When the change was observed.
        timestamp: DateTime<Utc>,
        /// Target whose status changed.
        target: StatusTarget,
        /// New status.
        status: TriggerStatus,
    },

    /// A capture target's hit vector was reset or read back.
    HitsUpdated {
        /// When the hits were published.
        timestamp: DateTime<Utc>,
        /// Owning capture target.
        target: CaptureTargetId,
        /// Inputs that caused the last trigger (empty after a reset).
        inputs: Vec<TriggerInput>,
    },

    /// The set of inputs seen since the previous poll changed.
    InputsUpdated {
        /// When the inputs were polled.
        timestamp: DateTime<Utc>,
        /// Inputs with activity.
        inputs: Vec<TriggerInput>,
    },

    /// A trigger phase was latched, or the counters were reset.
    PhaseUpdated {
        /// When the counters changed.
        timestamp: DateTime<Utc>,
        /// Counter snapshot.
        #[serde(flatten)]
        counters: PhaseCounters,
    },
}

/// Wraps an [`Event`] with a monotonically increasing sequence number.
#[derive(Debug, Serialize)]
struct EventEnvelope {
    sequence: u64,
    #[serde(flatten)]
    event: Event,
}

/// Thread-safe, buffered JSONL event writer.
///
/// Each [`emit`](Self::emit) serializes one event as a single line and
/// flushes. Serialization or I/O failures are dropped; the event stream
/// must never stall the monitor loop.
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

    /// Creates an emitter that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
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
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope {
            sequence: seq,
            event,
        };

        if let Ok(mut w) = self.writer.lock() {
            if let Ok(line) = serde_json::to_string(&envelope) {
                let _ = writeln!(w, "{line}");
                let _ = w.flush();
            }
        }
    }

    /// Returns the number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
struct Published {
    status: [Option<TriggerStatus>; 3],
    inputs: Option<Vec<bool>>,
}

/// [`StatusPublisher`] writing to an [`EventEmitter`].
///
/// The monitor republishes every status on every tick; only changes become
/// events. The same holds for the input presence vector.
#[derive(Debug)]
pub struct EventPublisher {
    emitter: Arc<EventEmitter>,
    published: Mutex<Published>,
}

impl EventPublisher {
    /// Creates a publisher over `emitter`.
    #[must_use]
    pub fn new(emitter: Arc<EventEmitter>) -> Self {
        Self {
            emitter,
            published: Mutex::new(Published::default()),
        }
    }

    fn published(&self) -> std::sync::MutexGuard<'_, Published> {
        self.published.lock().expect("publisher state lock poisoned")
    }
}

const fn status_slot(target: StatusTarget) -> usize {
    match target {
        StatusTarget::Ddr => 0,
        StatusTarget::Buf => 1,
        StatusTarget::Seq => 2,
    }
}

impl StatusPublisher for EventPublisher {
    fn publish_status(&self, target: StatusTarget, status: TriggerStatus) {
        let previous = self.published().status[status_slot(target)].replace(status);
        if previous == Some(status) {
            return;
        }
        self.emitter.emit(Event::StatusChanged {
            timestamp: Utc::now(),
            target,
            status,
        });
    }

    fn publish_hits(&self, target: CaptureTargetId, hits: &[bool]) {
        self.emitter.emit(Event::HitsUpdated {
            timestamp: Utc::now(),
            target,
            inputs: TriggerInput::select(TriggerInput::for_target(target), hits),
        });
    }

    fn publish_inputs(&self, inputs: &[bool]) {
        {
            let mut published = self.published();
            if published.inputs.as_deref() == Some(inputs) {
                return;
            }
            published.inputs = Some(inputs.to_vec());
        }
        self.emitter.emit(Event::InputsUpdated {
            timestamp: Utc::now(),
            inputs: TriggerInput::select(&TriggerInput::DDR, inputs),
        });
    }

    fn publish_phase(&self, counters: &PhaseCounters) {
        self.emitter.emit(Event::PhaseUpdated {
            timestamp: Utc::now(),
            counters: *counters,
        });
    }
}
