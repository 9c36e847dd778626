//! Hardware status reconciliation.
//!
//! Turns the raw armed/busy/IQ flags of the three trigger blocks into the
//! status reported for each target. In IQ capture the sequencer owns the
//! busy/ready semantics of whichever buffer feeds it, so a naive per-engine
//! read would report a buffer as ready while a sweep is still writing to it.

use serde::Serialize;

use crate::hardware::{HardwarePort, RawCaptureStatus, RawSeqStatus};

use super::target::{CaptureTargetId, SeqTriggerSource, StatusTarget, TriggerStatus};

/// Reported status of all three targets at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DecodedStatus {
    /// DDR status.
    pub ddr: TriggerStatus,
    /// BUF status.
    pub buf: TriggerStatus,
    /// Sequencer status.
    pub seq: TriggerStatus,
}

impl DecodedStatus {
    /// Status of any target.
    #[must_use]
    pub const fn get(&self, target: StatusTarget) -> TriggerStatus {
        match target {
            StatusTarget::Ddr => self.ddr,
            StatusTarget::Buf => self.buf,
            StatusTarget::Seq => self.seq,
        }
    }

    /// Status of a capture target.
    #[must_use]
    pub const fn capture(&self, target: CaptureTargetId) -> TriggerStatus {
        match target {
            CaptureTargetId::Ddr => self.ddr,
            CaptureTargetId::Buf => self.buf,
        }
    }
}

const fn to_status(armed: bool, busy: bool) -> TriggerStatus {
    if armed {
        TriggerStatus::Armed
    } else if busy {
        TriggerStatus::Busy
    } else {
        TriggerStatus::Ready
    }
}

/// Derives the reported status from raw register flags.
#[must_use]
pub const fn decode(ddr: RawCaptureStatus, buf: RawCaptureStatus, seq: RawSeqStatus) -> DecodedStatus {
    let seq_on_buf = matches!(seq.source, SeqTriggerSource::FollowBuf);
    let seq_on_ddr = matches!(seq.source, SeqTriggerSource::FollowDdr);

    let buf_busy = (buf.busy && !buf.iq_mode)
        || (buf.busy && buf.iq_mode && seq.busy)
        || (seq.busy && seq_on_buf);
    let ddr_busy = (ddr.busy && !ddr.iq_mode) || (seq.busy && seq_on_ddr);
    let seq_armed = (seq_on_buf && buf.armed) || (seq_on_ddr && ddr.armed);

    DecodedStatus {
        ddr: to_status(ddr.armed, ddr_busy),
        buf: to_status(buf.armed, buf_busy),
        seq: to_status(seq_armed, seq.busy),
    }
}

/// Reads the three status registers and decodes them.
pub fn decode_hardware_status<H: HardwarePort + ?Sized>(hw: &mut H) -> DecodedStatus {
    let ddr = hw.read_ddr_status();
    let buf = hw.read_buf_status();
    let seq = hw.read_seq_status();
    decode(ddr, buf, seq)
}
