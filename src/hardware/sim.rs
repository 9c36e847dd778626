//! Simulated capture hardware.
//!
//! An in-memory register model of the DDR, BUF and sequencer trigger
//! blocks, used by the `run` command when no instrument is attached and by
//! the test suites. Every write is recorded in a call log so tests can
//! assert exactly which hardware operations the orchestrator issued.
//!
//! Captures can complete in two ways: manually through [`SimHardware::complete`],
//! or automatically after a fixed number of status polls when the model is
//! built with [`SimHardware::with_capture_polls`].

use super::{
    BUF_SOURCE_COUNT, BlankingSource, DDR_SOURCE_COUNT, HardwarePort, RawCaptureStatus,
    RawSeqStatus,
};
use crate::trigger::target::{CaptureTargetId, SeqTriggerSource};

/// Position of the external trigger input in both source vectors.
const EXTERNAL_INPUT: usize = 0;

/// Most calls kept in the log; the oldest half is dropped when full.
pub const CALL_LOG_CAPACITY: usize = 4096;

/// A hardware write (or side-effecting read) issued against the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HwCall {
    /// `arm(ddr, buf)`
    Arm { ddr: bool, buf: bool },
    /// `soft_trigger(ddr, buf)`
    SoftTrigger { ddr: bool, buf: bool },
    /// `disarm(ddr, buf)`
    Disarm { ddr: bool, buf: bool },
    /// `ddr_enable()`
    DdrEnable,
    /// `ddr_disable()`
    DdrDisable,
    /// `rearm_raw_phase()`
    RearmRawPhase,
    /// Source enable vector written for a target.
    WriteEnables { target: CaptureTargetId, bits: Vec<bool> },
    /// Blanking vector written for a target.
    WriteBlanking { target: CaptureTargetId, bits: Vec<bool> },
    /// Sequencer trigger select written.
    WriteSeqSource(SeqTriggerSource),
    /// Trigger delay written for a target.
    WriteDelay { target: CaptureTargetId, turns: u32 },
    /// Blanking window length written.
    WriteBlankingWindow(u16),
    /// Blanking source written.
    WriteBlankingSource(BlankingSource),
}

impl HwCall {
    /// Returns whether this call fires the trigger hardware.
    #[must_use]
    pub const fn is_fire(&self) -> bool {
        matches!(self, Self::Arm { .. } | Self::SoftTrigger { .. })
    }
}

#[derive(Debug, Clone)]
struct SimEngine {
    armed: bool,
    busy: bool,
    iq_mode: bool,
    enable: Vec<bool>,
    blanking: Vec<bool>,
    hits: Vec<bool>,
    delay: u32,
    polls_remaining: Option<u32>,
}

impl SimEngine {
    fn new(inputs: usize) -> Self {
        Self {
            armed: false,
            busy: false,
            iq_mode: false,
            enable: vec![false; inputs],
            blanking: vec![false; inputs],
            hits: vec![false; inputs],
            delay: 0,
            polls_remaining: None,
        }
    }

    fn start_capture(&mut self, hits: Vec<bool>, capture_polls: Option<u32>) {
        self.armed = false;
        self.busy = true;
        self.hits = hits;
        self.polls_remaining = capture_polls;
    }

    fn poll(&mut self) -> RawCaptureStatus {
        if self.busy {
            match self.polls_remaining {
                Some(0) => {
                    self.busy = false;
                    self.polls_remaining = None;
                }
                Some(n) => self.polls_remaining = Some(n - 1),
                None => {}
            }
        }
        RawCaptureStatus {
            armed: self.armed,
            busy: self.busy,
            iq_mode: self.iq_mode,
        }
    }
}

/// In-memory model of the trigger and capture registers.
#[derive(Debug, Clone)]
pub struct SimHardware {
    ddr: SimEngine,
    buf: SimEngine,
    ddr_enabled: bool,
    seq_busy: bool,
    seq_source: SeqTriggerSource,
    raw_phase: u32,
    next_phase: u32,
    inputs_seen: Vec<bool>,
    blanking_window: u16,
    blanking_source: BlankingSource,
    capture_polls: Option<u32>,
    ddr_status_reads: u64,
    calls: Vec<HwCall>,
}

impl Default for SimHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl SimHardware {
    /// Creates an idle model whose captures only finish via [`Self::complete`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            ddr: SimEngine::new(DDR_SOURCE_COUNT),
            buf: SimEngine::new(BUF_SOURCE_COUNT),
            ddr_enabled: false,
            seq_busy: false,
            seq_source: SeqTriggerSource::default(),
            raw_phase: 0,
            next_phase: 1,
            inputs_seen: vec![false; DDR_SOURCE_COUNT],
            blanking_window: 0,
            blanking_source: BlankingSource::default(),
            capture_polls: None,
            ddr_status_reads: 0,
            calls: Vec::new(),
        }
    }

    /// Creates a model whose captures finish after `polls` status reads.
    #[must_use]
    pub fn with_capture_polls(polls: u32) -> Self {
        Self {
            capture_polls: Some(polls),
            ..Self::new()
        }
    }

    fn engine(&self, target: CaptureTargetId) -> &SimEngine {
        match target {
            CaptureTargetId::Ddr => &self.ddr,
            CaptureTargetId::Buf => &self.buf,
        }
    }

    fn engine_mut(&mut self, target: CaptureTargetId) -> &mut SimEngine {
        match target {
            CaptureTargetId::Ddr => &mut self.ddr,
            CaptureTargetId::Buf => &mut self.buf,
        }
    }

    fn latch_phase(&mut self) {
        if self.raw_phase == 0 {
            self.raw_phase = self.next_phase;
        }
    }

    /// Delivers a pulse on the external trigger input.
    ///
    /// Every engine armed with the external input enabled starts capturing.
    pub fn fire_external(&mut self) {
        self.inputs_seen[EXTERNAL_INPUT] = true;
        let capture_polls = self.capture_polls;
        let mut fired = false;
        for target in CaptureTargetId::ALL {
            let engine = self.engine_mut(target);
            if engine.armed && engine.enable[EXTERNAL_INPUT] {
                let mut hits = vec![false; engine.enable.len()];
                hits[EXTERNAL_INPUT] = true;
                engine.start_capture(hits, capture_polls);
                fired = true;
            }
        }
        if fired {
            self.latch_phase();
        }
    }

    /// Finishes the capture running on `target`.
    pub fn complete(&mut self, target: CaptureTargetId) {
        let engine = self.engine_mut(target);
        engine.busy = false;
        engine.polls_remaining = None;
    }

    /// Forces the raw armed/busy flags of an engine.
    pub fn set_flags(&mut self, target: CaptureTargetId, armed: bool, busy: bool) {
        let engine = self.engine_mut(target);
        engine.armed = armed;
        engine.busy = busy;
    }

    /// Switches an engine between bunch and IQ capture.
    pub fn set_iq_mode(&mut self, target: CaptureTargetId, iq_mode: bool) {
        self.engine_mut(target).iq_mode = iq_mode;
    }

    /// Forces the sequencer busy flag.
    pub const fn set_seq_busy(&mut self, busy: bool) {
        self.seq_busy = busy;
    }

    /// Sets the phase bits latched by the next trigger.
    pub const fn set_next_phase(&mut self, phase: u32) {
        self.next_phase = phase;
    }

    /// Marks a trigger input as seen, in DDR input order.
    pub fn set_input_seen(&mut self, index: usize) {
        self.inputs_seen[index] = true;
    }

    /// Returns whether DDR capture is enabled.
    #[must_use]
    pub const fn ddr_enabled(&self) -> bool {
        self.ddr_enabled
    }

    /// Number of DDR status register reads so far.
    #[must_use]
    pub const fn ddr_status_reads(&self) -> u64 {
        self.ddr_status_reads
    }

    /// Returns the raw armed flag of an engine.
    #[must_use]
    pub fn is_armed(&self, target: CaptureTargetId) -> bool {
        self.engine(target).armed
    }

    /// Returns the raw busy flag of an engine.
    #[must_use]
    pub fn is_busy(&self, target: CaptureTargetId) -> bool {
        self.engine(target).busy
    }

    /// Returns the last written source enable vector of an engine.
    #[must_use]
    pub fn enables(&self, target: CaptureTargetId) -> &[bool] {
        &self.engine(target).enable
    }

    /// Returns the last written blanking vector of an engine.
    #[must_use]
    pub fn blanking_bits(&self, target: CaptureTargetId) -> &[bool] {
        &self.engine(target).blanking
    }

    /// Returns the last written trigger delay of an engine.
    #[must_use]
    pub fn delay(&self, target: CaptureTargetId) -> u32 {
        self.engine(target).delay
    }

    /// Returns the configured sequencer source.
    #[must_use]
    pub const fn seq_source(&self) -> SeqTriggerSource {
        self.seq_source
    }

    /// Returns the configured blanking window and source.
    #[must_use]
    pub const fn blanking(&self) -> (u16, BlankingSource) {
        (self.blanking_window, self.blanking_source)
    }

    fn record(&mut self, call: HwCall) {
        if self.calls.len() >= CALL_LOG_CAPACITY {
            self.calls.drain(..CALL_LOG_CAPACITY / 2);
        }
        self.calls.push(call);
    }

    /// Returns the recorded calls, oldest first. At most
    /// [`CALL_LOG_CAPACITY`] of the most recent calls are kept.
    #[must_use]
    pub fn calls(&self) -> &[HwCall] {
        &self.calls
    }

    /// Returns only the recorded fire calls.
    #[must_use]
    pub fn fire_calls(&self) -> Vec<HwCall> {
        self.calls.iter().filter(|c| c.is_fire()).cloned().collect()
    }

    /// Clears the call log.
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }
}

impl HardwarePort for SimHardware {
    fn read_ddr_status(&mut self) -> RawCaptureStatus {
        self.ddr_status_reads += 1;
        self.ddr.poll()
    }

    fn read_buf_status(&mut self) -> RawCaptureStatus {
        self.buf.poll()
    }

    fn read_seq_status(&mut self) -> RawSeqStatus {
        RawSeqStatus {
            busy: self.seq_busy,
            source: self.seq_source,
        }
    }

    fn arm(&mut self, ddr: bool, buf: bool) {
        self.record(HwCall::Arm { ddr, buf });
        if ddr {
            self.ddr.armed = true;
        }
        if buf {
            self.buf.armed = true;
        }
    }

    fn soft_trigger(&mut self, ddr: bool, buf: bool) {
        self.record(HwCall::SoftTrigger { ddr, buf });
        let capture_polls = self.capture_polls;
        if ddr {
            self.ddr.start_capture(vec![false; DDR_SOURCE_COUNT], capture_polls);
        }
        if buf {
            self.buf.start_capture(vec![false; BUF_SOURCE_COUNT], capture_polls);
        }
        if ddr || buf {
            self.latch_phase();
        }
    }

    fn disarm(&mut self, ddr: bool, buf: bool) {
        self.record(HwCall::Disarm { ddr, buf });
        if ddr {
            self.ddr.armed = false;
        }
        if buf {
            self.buf.armed = false;
        }
    }

    fn ddr_enable(&mut self) {
        self.record(HwCall::DdrEnable);
        self.ddr_enabled = true;
    }

    fn ddr_disable(&mut self) {
        self.record(HwCall::DdrDisable);
        self.ddr_enabled = false;
    }

    fn read_raw_phase(&mut self) -> u32 {
        self.raw_phase
    }

    fn rearm_raw_phase(&mut self) {
        self.record(HwCall::RearmRawPhase);
        self.raw_phase = 0;
    }

    fn write_ddr_source_enables(&mut self, enable: &[bool]) {
        self.record(HwCall::WriteEnables {
            target: CaptureTargetId::Ddr,
            bits: enable.to_vec(),
        });
        self.ddr.enable = enable.to_vec();
    }

    fn write_ddr_source_blanking(&mut self, blanking: &[bool]) {
        self.record(HwCall::WriteBlanking {
            target: CaptureTargetId::Ddr,
            bits: blanking.to_vec(),
        });
        self.ddr.blanking = blanking.to_vec();
    }

    fn read_ddr_source_hits(&mut self) -> Vec<bool> {
        self.ddr.hits.clone()
    }

    fn write_buf_source_enables(&mut self, enable: &[bool]) {
        self.record(HwCall::WriteEnables {
            target: CaptureTargetId::Buf,
            bits: enable.to_vec(),
        });
        self.buf.enable = enable.to_vec();
    }

    fn write_buf_source_blanking(&mut self, blanking: &[bool]) {
        self.record(HwCall::WriteBlanking {
            target: CaptureTargetId::Buf,
            bits: blanking.to_vec(),
        });
        self.buf.blanking = blanking.to_vec();
    }

    fn read_buf_source_hits(&mut self) -> Vec<bool> {
        self.buf.hits.clone()
    }

    fn write_seq_trigger_source(&mut self, source: SeqTriggerSource) {
        self.record(HwCall::WriteSeqSource(source));
        self.seq_source = source;
    }

    fn write_trigger_delay(&mut self, target: CaptureTargetId, turns: u32) {
        self.record(HwCall::WriteDelay { target, turns });
        self.engine_mut(target).delay = turns;
    }

    fn write_blanking_window(&mut self, turns: u16) {
        self.record(HwCall::WriteBlankingWindow(turns));
        self.blanking_window = turns;
    }

    fn write_blanking_source(&mut self, source: BlankingSource) {
        self.record(HwCall::WriteBlankingSource(source));
        self.blanking_source = source;
    }

    fn read_trigger_inputs(&mut self) -> Vec<bool> {
        std::mem::replace(&mut self.inputs_seen, vec![false; DDR_SOURCE_COUNT])
    }
}
