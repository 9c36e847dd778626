//! Hardware status port.
//!
//! The register-level interface the trigger orchestrator drives. Register
//! bit-packing lives behind this trait; at this layer every read and write
//! is assumed to succeed, so none of the methods return `Result`.
//!
//! Reads take `&mut self` because several status registers are pulsed
//! (reading them clears the latched bits).

pub mod sim;

use serde::{Deserialize, Serialize};

use crate::trigger::target::{CaptureTargetId, SeqTriggerSource};

pub use sim::{CALL_LOG_CAPACITY, HwCall, SimHardware};

/// Number of trigger inputs wired to the DDR trigger.
pub const DDR_SOURCE_COUNT: usize = 5;

/// Number of trigger inputs wired to the BUF trigger.
pub const BUF_SOURCE_COUNT: usize = 3;

/// Largest trigger delay the delay registers can hold, in machine turns.
pub const MAX_TRIGGER_DELAY: u32 = (1 << 24) - 1;

/// Raw trigger and capture flags of one capture engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawCaptureStatus {
    /// Armed and waiting for a trigger.
    pub armed: bool,
    /// Capturing (or, in IQ mode, owned by a running sweep).
    pub busy: bool,
    /// Capturing IQ detector output rather than raw bunch data.
    pub iq_mode: bool,
}

/// Raw sequencer flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawSeqStatus {
    /// Waiting for trigger or running a sweep.
    pub busy: bool,
    /// Capture engine currently feeding the sequencer.
    pub source: SeqTriggerSource,
}

/// Signal that opens the trigger blanking window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlankingSource {
    /// Window opens on each trigger.
    #[default]
    Trigger,
    /// Window opens on the SCLK connector input.
    Sclk,
}

/// Register access used by the trigger orchestrator.
///
/// Source vectors are passed in hardware input order; the DDR vectors have
/// [`DDR_SOURCE_COUNT`] entries and the BUF vectors [`BUF_SOURCE_COUNT`].
pub trait HardwarePort: Send {
    /// Reads DDR trigger and capture status.
    fn read_ddr_status(&mut self) -> RawCaptureStatus;

    /// Reads BUF trigger and capture status.
    fn read_buf_status(&mut self) -> RawCaptureStatus;

    /// Reads sequencer busy flag and its configured trigger source.
    fn read_seq_status(&mut self) -> RawSeqStatus;

    /// Simultaneously arms one or both engines on the external trigger.
    fn arm(&mut self, ddr: bool, buf: bool);

    /// Simultaneously soft triggers one or both engines.
    fn soft_trigger(&mut self, ddr: bool, buf: bool);

    /// Disarms a pending trigger. No effect if already triggered or not armed.
    fn disarm(&mut self, ddr: bool, buf: bool);

    /// Starts DDR data capture; must precede triggering the DDR.
    fn ddr_enable(&mut self);

    /// Stops DDR data capture.
    fn ddr_disable(&mut self);

    /// Returns zero until a trigger has been seen, then the sub-turn phase bits.
    fn read_raw_phase(&mut self) -> u32;

    /// Arms capture of the next trigger phase.
    fn rearm_raw_phase(&mut self);

    /// Configures which inputs can trigger the DDR.
    fn write_ddr_source_enables(&mut self, enable: &[bool]);

    /// Configures which DDR inputs respect the blanking window.
    fn write_ddr_source_blanking(&mut self, blanking: &[bool]);

    /// Reads back which inputs caused the last DDR trigger.
    fn read_ddr_source_hits(&mut self) -> Vec<bool>;

    /// Configures which inputs can trigger the BUF.
    fn write_buf_source_enables(&mut self, enable: &[bool]);

    /// Configures which BUF inputs respect the blanking window.
    fn write_buf_source_blanking(&mut self, blanking: &[bool]);

    /// Reads back which inputs caused the last BUF trigger.
    fn read_buf_source_hits(&mut self) -> Vec<bool>;

    /// Selects which capture engine feeds the sequencer.
    fn write_seq_trigger_source(&mut self, source: SeqTriggerSource);

    /// Configures the trigger delay of one engine, in turns.
    fn write_trigger_delay(&mut self, target: CaptureTargetId, turns: u32);

    /// Configures the blanking window length after a trigger, in turns.
    fn write_blanking_window(&mut self, turns: u16);

    /// Selects the signal that opens the blanking window.
    fn write_blanking_source(&mut self, source: BlankingSource);

    /// Reads which trigger inputs have been seen since the last read, in DDR
    /// input order.
    fn read_trigger_inputs(&mut self) -> Vec<bool>;
}
