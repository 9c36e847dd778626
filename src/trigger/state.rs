//! Orchestrator state.
//!
//! Everything the orchestrator knows lives in one [`OrchestratorState`],
//! owned by the orchestrator's single lock. It is created once with
//! defaults and mutated only through the orchestrator and its monitor.

use serde::Serialize;

use crate::hardware::BlankingSource;

use super::phase::PhaseMonitor;
use super::source::TriggerSourceConfig;
use super::status::DecodedStatus;
use super::target::{CaptureTarget, CaptureTargetId, SequencerTarget, SyncMode};

/// All mutable orchestrator state.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorState {
    /// DDR target.
    pub ddr: CaptureTarget,
    /// BUF target.
    pub buf: CaptureTarget,
    /// Sequencer target.
    pub seq: SequencerTarget,
    /// Joint arming flag.
    pub sync: SyncMode,
    /// DDR trigger input bank.
    pub ddr_sources: TriggerSourceConfig,
    /// BUF trigger input bank.
    pub buf_sources: TriggerSourceConfig,
    /// DDR trigger delay in turns.
    pub ddr_delay: u32,
    /// BUF trigger delay in turns.
    pub buf_delay: u32,
    /// Blanking window length in turns.
    pub blanking_window: u16,
    /// Signal opening the blanking window.
    pub blanking_source: BlankingSource,
    /// Trigger inputs seen since the previous presence poll, in DDR order.
    pub inputs_seen: Vec<bool>,
    /// Trigger phase telemetry.
    pub phase: PhaseMonitor,
    /// Status decoded on the most recent hardware read.
    pub last_status: DecodedStatus,
}

impl Default for OrchestratorState {
    fn default() -> Self {
        Self::new()
    }
}

impl OrchestratorState {
    /// Creates the initial state: unarmed, `Normal`, internal source.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ddr: CaptureTarget::new(CaptureTargetId::Ddr),
            buf: CaptureTarget::new(CaptureTargetId::Buf),
            seq: SequencerTarget::default(),
            sync: SyncMode::default(),
            ddr_sources: TriggerSourceConfig::new(CaptureTargetId::Ddr),
            buf_sources: TriggerSourceConfig::new(CaptureTargetId::Buf),
            ddr_delay: 0,
            buf_delay: 0,
            blanking_window: 0,
            blanking_source: BlankingSource::default(),
            inputs_seen: vec![false; crate::hardware::DDR_SOURCE_COUNT],
            phase: PhaseMonitor::new(),
            last_status: DecodedStatus::default(),
        }
    }

    /// Returns a capture target.
    #[must_use]
    pub const fn target(&self, id: CaptureTargetId) -> &CaptureTarget {
        match id {
            CaptureTargetId::Ddr => &self.ddr,
            CaptureTargetId::Buf => &self.buf,
        }
    }

    /// Returns a capture target mutably.
    pub const fn target_mut(&mut self, id: CaptureTargetId) -> &mut CaptureTarget {
        match id {
            CaptureTargetId::Ddr => &mut self.ddr,
            CaptureTargetId::Buf => &mut self.buf,
        }
    }

    /// Returns a trigger input bank.
    #[must_use]
    pub const fn sources(&self, id: CaptureTargetId) -> &TriggerSourceConfig {
        match id {
            CaptureTargetId::Ddr => &self.ddr_sources,
            CaptureTargetId::Buf => &self.buf_sources,
        }
    }

    /// Returns a trigger input bank mutably.
    pub const fn sources_mut(&mut self, id: CaptureTargetId) -> &mut TriggerSourceConfig {
        match id {
            CaptureTargetId::Ddr => &mut self.ddr_sources,
            CaptureTargetId::Buf => &mut self.buf_sources,
        }
    }

    /// Returns the trigger delay of a capture target.
    #[must_use]
    pub const fn delay(&self, id: CaptureTargetId) -> u32 {
        match id {
            CaptureTargetId::Ddr => self.ddr_delay,
            CaptureTargetId::Buf => self.buf_delay,
        }
    }
}
