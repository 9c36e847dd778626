//! Capture target state.
//!
//! The orchestrator's own model of the three trigger targets. None of the
//! flags here are hardware reads: `armed` records what the orchestrator
//! expects the hardware to be doing, and is reconciled against the polled
//! hardware status by the monitor loop.

use serde::{Deserialize, Serialize};

/// One of the two physical capture engines sharing the trigger line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureTargetId {
    /// Large ring buffer, half pre-trigger and half post-trigger.
    Ddr,
    /// Short fast circular buffer.
    Buf,
}

impl CaptureTargetId {
    /// Both capture targets, DDR first.
    pub const ALL: [Self; 2] = [Self::Ddr, Self::Buf];

    /// Lower-case name used in logs, metrics labels and events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ddr => "ddr",
            Self::Buf => "buf",
        }
    }

    /// The other capture target.
    #[must_use]
    pub const fn peer(self) -> Self {
        match self {
            Self::Ddr => Self::Buf,
            Self::Buf => Self::Ddr,
        }
    }
}

impl std::fmt::Display for CaptureTargetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CaptureTargetId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ddr" => Ok(Self::Ddr),
            "buf" => Ok(Self::Buf),
            other => Err(format!("unknown capture target '{other}' (expected ddr or buf)")),
        }
    }
}

/// Any target with a published status, including the sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusTarget {
    /// DDR capture engine.
    Ddr,
    /// Fast buffer capture engine.
    Buf,
    /// Frequency-sweep sequencer.
    Seq,
}

impl StatusTarget {
    /// Publication order used by the monitor loop.
    pub const ALL: [Self; 3] = [Self::Ddr, Self::Buf, Self::Seq];

    /// Lower-case name used in logs, metrics labels and events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ddr => "ddr",
            Self::Buf => "buf",
            Self::Seq => "seq",
        }
    }
}

impl From<CaptureTargetId> for StatusTarget {
    fn from(id: CaptureTargetId) -> Self {
        match id {
            CaptureTargetId::Ddr => Self::Ddr,
            CaptureTargetId::Buf => Self::Buf,
        }
    }
}

impl std::fmt::Display for StatusTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Externally reported trigger status of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerStatus {
    /// Idle and eligible to be armed.
    #[default]
    Ready,
    /// Armed and waiting for the trigger.
    Armed,
    /// Triggered and capturing.
    Busy,
}

impl TriggerStatus {
    /// Numeric encoding used for the status gauge.
    #[must_use]
    pub const fn as_gauge(self) -> f64 {
        match self {
            Self::Ready => 0.0,
            Self::Armed => 1.0,
            Self::Busy => 2.0,
        }
    }
}

/// Internal rearm policy state of a capture target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoArmState {
    /// Rearm on completion if auto-rearm is enabled.
    #[default]
    Normal,
    /// Explicitly stopped; never rearmed until the user arms again.
    Stopped,
    /// Wanted to arm while a peer was busy; retried on the next ready edge.
    PendingArm,
}

/// Orchestrator-side state of one capture target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureTarget {
    /// Which physical engine this is.
    pub id: CaptureTargetId,
    /// Fire from the shared external trigger rather than a soft trigger.
    pub uses_external_source: bool,
    /// Rearm automatically after each completed capture.
    pub auto_rearm_enabled: bool,
    /// Orchestrator expectation that the target is armed or capturing.
    pub armed: bool,
    /// Rearm policy state.
    pub auto_arm_state: AutoArmState,
}

impl CaptureTarget {
    /// Creates an unarmed target on the internal (soft) source.
    #[must_use]
    pub const fn new(id: CaptureTargetId) -> Self {
        Self {
            id,
            uses_external_source: false,
            auto_rearm_enabled: false,
            armed: false,
            auto_arm_state: AutoArmState::Normal,
        }
    }

    /// Records a successful fire.
    pub const fn mark_armed(&mut self) {
        self.armed = true;
        self.auto_arm_state = AutoArmState::Normal;
    }

    /// Records an explicit stop. Blocks auto-rearm until the next user arm.
    pub const fn mark_stopped(&mut self) {
        self.armed = false;
        self.auto_arm_state = AutoArmState::Stopped;
    }

    /// Records an arm request deferred because a peer is busy.
    pub const fn mark_pending(&mut self) {
        self.armed = false;
        self.auto_arm_state = AutoArmState::PendingArm;
    }
}

/// Which capture engine feeds the sequencer its trigger and busy signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SeqTriggerSource {
    /// Sequencer follows the fast buffer.
    #[default]
    #[serde(rename = "buf")]
    FollowBuf,
    /// Sequencer follows the DDR buffer.
    #[serde(rename = "ddr")]
    FollowDdr,
}

impl SeqTriggerSource {
    /// Returns whether the sequencer follows the given capture target.
    #[must_use]
    pub const fn follows(self, id: CaptureTargetId) -> bool {
        matches!(
            (self, id),
            (Self::FollowBuf, CaptureTargetId::Buf) | (Self::FollowDdr, CaptureTargetId::Ddr)
        )
    }

    /// Register encoding written to the sequencer trigger select.
    #[must_use]
    pub const fn register_value(self) -> u32 {
        match self {
            Self::FollowBuf => 0,
            Self::FollowDdr => 1,
        }
    }

    /// Decodes the sequencer trigger select register.
    ///
    /// # Panics
    ///
    /// Panics on a value the hardware cannot produce.
    #[must_use]
    pub fn from_register(value: u32) -> Self {
        match value {
            0 => Self::FollowBuf,
            1 => Self::FollowDdr,
            other => panic!("invalid sequencer trigger source register value {other}"),
        }
    }
}

impl std::str::FromStr for SeqTriggerSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<CaptureTargetId>()? {
            CaptureTargetId::Ddr => Ok(Self::FollowDdr),
            CaptureTargetId::Buf => Ok(Self::FollowBuf),
        }
    }
}

/// Orchestrator-side state of the sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SequencerTarget {
    /// Capture engine the sequencer follows.
    pub trigger_source: SeqTriggerSource,
    /// Orchestrator expectation that the sequencer is armed or running.
    pub armed: bool,
}

/// Global synchronisation flag for joint DDR+BUF arming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncMode {
    /// Arm, fire and rearm DDR and BUF together when their sources agree.
    pub synchronise: bool,
}
