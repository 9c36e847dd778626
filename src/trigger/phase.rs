//! Trigger phase telemetry.
//!
//! Counts triggers and phase discrepancies from the raw trigger-phase latch.
//! The latch holds the sub-turn phase bits of the first trigger after it was
//! re-armed, so every non-zero read is one trigger. A reading that differs
//! from the previous one means the trigger moved relative to the machine
//! clock, which is counted as jitter. This has no effect on arming.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::hardware::HardwarePort;

/// Snapshot of the phase counters, as published.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PhaseCounters {
    /// Raw phase bits of the last trigger.
    pub raw_phase: u32,
    /// Triggers seen since the last reset.
    pub trigger_count: u64,
    /// Triggers whose phase differed from the previous one.
    pub jitter_count: u64,
    /// Jitter as a percentage of all triggers.
    pub jitter_percent: f64,
}

/// Phase latch poller and counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PhaseMonitor {
    last_phase: Option<u32>,
    trigger_count: u64,
    jitter_count: u64,
    #[serde(skip)]
    last_trigger: Option<Instant>,
}

impl PhaseMonitor {
    /// Creates a monitor with zeroed counters and no previous reading.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_phase: None,
            trigger_count: 0,
            jitter_count: 0,
            last_trigger: None,
        }
    }

    /// Polls the phase latch once.
    ///
    /// Returns the updated counters when a trigger was seen.
    pub fn poll<H: HardwarePort + ?Sized>(&mut self, hw: &mut H) -> Option<PhaseCounters> {
        let phase = hw.read_raw_phase();
        if phase == 0 {
            return None;
        }
        hw.rearm_raw_phase();
        Some(self.record(phase, Instant::now()))
    }

    /// Records one latched trigger phase.
    pub fn record(&mut self, phase: u32, at: Instant) -> PhaseCounters {
        if self.last_phase.is_some_and(|last| last != phase) {
            self.jitter_count += 1;
        }
        self.last_phase = Some(phase);
        self.trigger_count += 1;
        self.last_trigger = Some(at);
        self.counters()
    }

    /// Zeroes the trigger and jitter counters.
    ///
    /// The last reading is kept so the next trigger is still compared
    /// against it.
    pub fn reset(&mut self) -> PhaseCounters {
        self.trigger_count = 0;
        self.jitter_count = 0;
        self.counters()
    }

    /// Current counter values.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn counters(&self) -> PhaseCounters {
        let jitter_percent = if self.trigger_count == 0 {
            0.0
        } else {
            100.0 * self.jitter_count as f64 / self.trigger_count as f64
        };
        PhaseCounters {
            raw_phase: self.last_phase.unwrap_or(0),
            trigger_count: self.trigger_count,
            jitter_count: self.jitter_count,
            jitter_percent,
        }
    }

    /// Time since the last trigger, if any has been seen.
    #[must_use]
    pub fn since_last_trigger(&self, now: Instant) -> Option<Duration> {
        self.last_trigger.map(|at| now.saturating_duration_since(at))
    }
}
