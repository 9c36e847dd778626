//! Collaborator interfaces.
//!
//! The orchestrator calls out to two external layers: the capture
//! processing chain, which prepares an engine for arming and consumes its
//! data once a capture completes, and the notification layer, which
//! publishes status to clients. Both are called with the orchestrator lock
//! held and must not call back into the orchestrator.

use std::sync::Mutex;
use std::sync::mpsc::{Receiver, SyncSender};

use tracing::{debug, warn};

use super::phase::PhaseCounters;
use super::target::{CaptureTargetId, StatusTarget, TriggerStatus};

/// Capture preparation and processing hooks.
///
/// The `process_*` hooks run inside the monitor loop's critical section and
/// may block until downstream consumers acknowledge the captured data.
/// While they run, the target still reads as armed to the orchestrator and
/// no other request can be served, so they are the main latency source of
/// the monitor loop.
pub trait CaptureProcessor: Send + Sync {
    /// Called before the DDR is fired.
    fn arming_ddr_buffer(&self) {}

    /// Called before the BUF is fired.
    fn arming_fast_buffer(&self) {}

    /// Called on a DDR ready edge.
    fn process_ddr_buffer(&self);

    /// Called on a BUF ready edge.
    fn process_fast_buffer(&self);
}

/// Status publication hooks.
pub trait StatusPublisher: Send + Sync {
    /// Publishes the status of one target.
    fn publish_status(&self, target: StatusTarget, status: TriggerStatus);

    /// Publishes the hit vector of a capture target's input bank.
    fn publish_hits(&self, target: CaptureTargetId, hits: &[bool]);

    /// Publishes the trigger inputs seen since the previous poll.
    fn publish_inputs(&self, inputs: &[bool]);

    /// Publishes the phase telemetry counters.
    fn publish_phase(&self, counters: &PhaseCounters);
}

/// Publisher that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPublisher;

impl StatusPublisher for NullPublisher {
    fn publish_status(&self, _target: StatusTarget, _status: TriggerStatus) {}
    fn publish_hits(&self, _target: CaptureTargetId, _hits: &[bool]) {}
    fn publish_inputs(&self, _inputs: &[bool]) {}
    fn publish_phase(&self, _counters: &PhaseCounters) {}
}

/// Capture processor that only logs completions.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingCapture;

impl CaptureProcessor for LoggingCapture {
    fn arming_ddr_buffer(&self) {
        debug!("preparing DDR capture");
    }

    fn arming_fast_buffer(&self) {
        debug!("preparing fast buffer capture");
    }

    fn process_ddr_buffer(&self) {
        debug!("DDR capture complete");
    }

    fn process_fast_buffer(&self) {
        debug!("fast buffer capture complete");
    }
}

/// Notice sent to the downstream consumer of a completed capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureReady {
    /// Engine whose capture completed.
    pub target: CaptureTargetId,
}

/// Capture processor that hands each completion to a downstream consumer
/// and waits for its acknowledgement.
///
/// The wait is unbounded: the monitor loop stays blocked until the consumer
/// sends on the acknowledgement channel. If the consumer has gone away the
/// handshake is skipped with a warning.
#[derive(Debug)]
pub struct HandshakeCapture {
    notify: SyncSender<CaptureReady>,
    ack: Mutex<Receiver<()>>,
}

/// Consumer side of a [`HandshakeCapture`].
#[derive(Debug)]
pub struct HandshakeConsumer {
    /// Completed captures, in order.
    pub ready: Receiver<CaptureReady>,
    /// Acknowledgements, one per received notice.
    pub ack: SyncSender<()>,
}

impl HandshakeCapture {
    /// Creates a connected processor/consumer pair.
    #[must_use]
    pub fn channel() -> (Self, HandshakeConsumer) {
        let (notify, ready) = std::sync::mpsc::sync_channel(1);
        let (ack_tx, ack_rx) = std::sync::mpsc::sync_channel(1);
        (
            Self {
                notify,
                ack: Mutex::new(ack_rx),
            },
            HandshakeConsumer { ready, ack: ack_tx },
        )
    }

    fn handshake(&self, target: CaptureTargetId) {
        if self.notify.send(CaptureReady { target }).is_err() {
            warn!(%target, "capture consumer disconnected; skipping handshake");
            return;
        }
        let ack = self.ack.lock().expect("handshake ack lock poisoned");
        if ack.recv().is_err() {
            warn!(%target, "capture consumer dropped before acknowledging");
        }
    }
}

impl CaptureProcessor for HandshakeCapture {
    fn process_ddr_buffer(&self) {
        self.handshake(CaptureTargetId::Ddr);
    }

    fn process_fast_buffer(&self) {
        self.handshake(CaptureTargetId::Buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_blocks_until_acknowledged() {
        let (capture, consumer) = HandshakeCapture::channel();
        let worker = std::thread::spawn(move || {
            let notice = consumer.ready.recv().unwrap();
            consumer.ack.send(()).unwrap();
            notice
        });

        capture.process_fast_buffer();
        assert_eq!(
            worker.join().unwrap(),
            CaptureReady {
                target: CaptureTargetId::Buf
            }
        );
    }

    #[test]
    fn handshake_skipped_when_consumer_gone() {
        let (capture, consumer) = HandshakeCapture::channel();
        drop(consumer);
        // must not block
        capture.process_ddr_buffer();
    }
}
