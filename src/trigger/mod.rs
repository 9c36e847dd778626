//! Trigger orchestration for the DDR, BUF and sequencer capture targets.
//!
//! The [`Orchestrator`] serves user requests (arm, stop, source selection)
//! and the [`Monitor`] reconciles its expectations against the hardware on a
//! fixed tick, rearming targets as their capture completes.

pub mod collaborators;
pub mod decision;
pub mod monitor;
pub mod orchestrator;
pub mod phase;
pub mod settings;
pub mod source;
pub mod state;
pub mod status;
pub mod target;

pub use collaborators::{
    CaptureProcessor, CaptureReady, HandshakeCapture, HandshakeConsumer, LoggingCapture,
    NullPublisher, StatusPublisher,
};
pub use decision::ArmPlan;
pub use monitor::{IntervalTicker, Monitor, ReadyEdges, TickReport, Ticker};
pub use orchestrator::{ArmOutcome, Orchestrator};
pub use phase::{PhaseCounters, PhaseMonitor};
pub use settings::{BlankingSettings, SequencerSettings, SourceKind, TargetSettings, TriggerSettings};
pub use source::{BufBank, DdrBank, SourceBank, TriggerInput, TriggerSourceConfig};
pub use state::OrchestratorState;
pub use status::DecodedStatus;
pub use target::{
    AutoArmState, CaptureTarget, CaptureTargetId, SeqTriggerSource, SequencerTarget, StatusTarget,
    SyncMode, TriggerStatus,
};
