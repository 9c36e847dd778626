//! Monitor loop.
//!
//! A dedicated thread polls the hardware once per tick, detects ready
//! edges (a target the orchestrator expects armed that the hardware now
//! reports ready), hands completed captures to the capture processor and
//! rearms targets whose policy allows it. Each tick runs entirely under the
//! orchestrator lock.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info};

use crate::hardware::HardwarePort;
use crate::observability::metrics;

use super::decision::targets_busy;
use super::orchestrator::{ArmOutcome, Inner, Locked, Orchestrator};
use super::phase::PhaseCounters;
use super::status::DecodedStatus;
use super::target::{AutoArmState, CaptureTargetId, StatusTarget, TriggerStatus};

/// Default tick period.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(10);

/// Default number of ticks between input presence polls (5 Hz at 100 Hz).
pub const DEFAULT_INPUT_POLL_TICKS: NonZeroU32 = match NonZeroU32::new(20) {
    Some(n) => n,
    None => unreachable!(),
};

/// Paces the monitor loop.
pub trait Ticker: Send {
    /// Waits for the next tick. Returning `false` ends the loop.
    fn tick(&mut self) -> bool;
}

/// Fixed-period ticker. Never ends the loop.
#[derive(Debug, Clone)]
pub struct IntervalTicker {
    interval: Duration,
    next: Instant,
}

impl IntervalTicker {
    /// Creates a ticker whose first tick is one `interval` from now.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now() + interval,
        }
    }
}

impl Default for IntervalTicker {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

impl Ticker for IntervalTicker {
    fn tick(&mut self) -> bool {
        let now = Instant::now();
        if let Some(wait) = self.next.checked_duration_since(now) {
            std::thread::sleep(wait);
            self.next += self.interval;
        } else {
            // Overran; skip missed ticks rather than bursting.
            self.next = now + self.interval;
        }
        true
    }
}

/// Targets that completed on one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ReadyEdges {
    /// DDR capture finished.
    pub ddr: bool,
    /// BUF capture finished.
    pub buf: bool,
    /// Sequencer sweep finished.
    pub seq: bool,
}

impl ReadyEdges {
    fn detect(expect: [bool; 3], status: &DecodedStatus) -> Self {
        let ready = |armed: bool, target| armed && status.get(target) == TriggerStatus::Ready;
        Self {
            ddr: ready(expect[0], StatusTarget::Ddr),
            buf: ready(expect[1], StatusTarget::Buf),
            seq: ready(expect[2], StatusTarget::Seq),
        }
    }

    /// Edge flag of any target.
    #[must_use]
    pub const fn get(&self, target: StatusTarget) -> bool {
        match target {
            StatusTarget::Ddr => self.ddr,
            StatusTarget::Buf => self.buf,
            StatusTarget::Seq => self.seq,
        }
    }

    /// Returns whether anything completed.
    #[must_use]
    pub const fn any(&self) -> bool {
        self.ddr || self.buf || self.seq
    }
}

/// What one monitor tick observed and did.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// Status decoded at the start of the tick.
    pub status: DecodedStatus,
    /// Ready edges detected.
    pub edges: ReadyEdges,
    /// Automatic rearm attempts: one per capture edge, plus deferred
    /// requests retried once their targets went idle.
    pub rearmed: Vec<(CaptureTargetId, ArmOutcome)>,
    /// Phase counters, when a trigger was latched.
    pub phase: Option<PhaseCounters>,
    /// Input presence vector, on ticks that polled it.
    pub inputs: Option<Vec<bool>>,
}

/// Monitor loop driver.
pub struct Monitor<H: HardwarePort> {
    orchestrator: Arc<Orchestrator<H>>,
    input_poll_ticks: NonZeroU32,
    ticks: u64,
}

impl<H: HardwarePort> std::fmt::Debug for Monitor<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("input_poll_ticks", &self.input_poll_ticks)
            .field("ticks", &self.ticks)
            .finish_non_exhaustive()
    }
}

impl<H: HardwarePort> Monitor<H> {
    /// Creates a monitor polling input presence every `input_poll_ticks`.
    #[must_use]
    pub const fn new(orchestrator: Arc<Orchestrator<H>>, input_poll_ticks: NonZeroU32) -> Self {
        Self {
            orchestrator,
            input_poll_ticks,
            ticks: 0,
        }
    }

    /// Ticks completed so far.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Runs one tick.
    pub fn poll(&mut self) -> TickReport {
        let poll_inputs = self.ticks % u64::from(self.input_poll_ticks.get()) == 0;
        self.ticks += 1;
        self.orchestrator.locked().monitor_tick(poll_inputs)
    }

    /// Ticks until `ticker` ends the loop.
    pub fn run(mut self, mut ticker: impl Ticker) {
        info!(input_poll_ticks = self.input_poll_ticks.get(), "trigger monitor started");
        loop {
            self.poll();
            if !ticker.tick() {
                break;
            }
        }
        info!(ticks = self.ticks, "trigger monitor stopped");
    }

    /// Runs the loop on a dedicated thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn<T>(self, ticker: T) -> std::io::Result<JoinHandle<()>>
    where
        H: 'static,
        T: Ticker + 'static,
    {
        std::thread::Builder::new()
            .name("trigger-monitor".to_owned())
            .spawn(move || self.run(ticker))
    }
}

impl<H: HardwarePort> Locked<'_, H> {
    fn monitor_tick(&mut self, poll_inputs: bool) -> TickReport {
        let status = self.decode_status();
        let state = &self.guard.state;
        let edges = ReadyEdges::detect([state.ddr.armed, state.buf.armed, state.seq.armed], &status);

        if edges.ddr {
            self.refresh_hits(CaptureTargetId::Ddr);
            self.capture.process_ddr_buffer();
        }
        if edges.buf {
            self.refresh_hits(CaptureTargetId::Buf);
            self.capture.process_fast_buffer();
        }

        for target in StatusTarget::ALL {
            self.publisher.publish_status(target, status.get(target));
            metrics::set_status(target, status.get(target));
        }

        let state = &mut self.guard.state;
        for target in StatusTarget::ALL.into_iter().filter(|t| edges.get(*t)) {
            match target {
                StatusTarget::Ddr => state.ddr.armed = false,
                StatusTarget::Buf => state.buf.armed = false,
                StatusTarget::Seq => state.seq.armed = false,
            }
            debug!(%target, "ready edge");
            metrics::record_ready_edge(target);
        }

        let mut rearmed = Vec::new();
        for id in CaptureTargetId::ALL {
            if edges.get(id.into()) {
                rearmed.push((id, self.arm_target(id, true)));
            }
        }
        // A request deferred on its own busy flag never sees an edge of its
        // own; retry it once every participant reads idle.
        for id in CaptureTargetId::ALL {
            let state = &self.guard.state;
            if state.target(id).auto_arm_state == AutoArmState::PendingArm
                && !targets_busy(state, id, &status)
            {
                rearmed.push((id, self.arm_target(id, true)));
            }
        }

        let Inner { state, hw } = &mut *self.guard;
        let phase = state.phase.poll(hw);
        if let Some(counters) = &phase {
            self.publisher.publish_phase(counters);
            metrics::set_phase_counters(counters);
        }

        let inputs = poll_inputs.then(|| {
            let inputs = hw.read_trigger_inputs();
            state.inputs_seen.clone_from(&inputs);
            self.publisher.publish_inputs(&inputs);
            inputs
        });

        TickReport {
            status,
            edges,
            rearmed,
            phase,
            inputs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{HwCall, SimHardware};
    use crate::trigger::collaborators::{LoggingCapture, NullPublisher};

    fn monitor(poll_ticks: u32) -> (Arc<Orchestrator<SimHardware>>, Monitor<SimHardware>) {
        let orch = Arc::new(Orchestrator::new(
            SimHardware::new(),
            Arc::new(LoggingCapture),
            Arc::new(NullPublisher),
        ));
        let monitor = Monitor::new(Arc::clone(&orch), NonZeroU32::new(poll_ticks).unwrap());
        (orch, monitor)
    }

    struct Counted(u32);

    impl Ticker for Counted {
        fn tick(&mut self) -> bool {
            self.0 = self.0.saturating_sub(1);
            self.0 > 0
        }
    }

    #[test]
    fn idle_tick_has_no_edges() {
        let (_orch, mut monitor) = monitor(20);
        let report = monitor.poll();
        assert!(!report.edges.any());
        assert!(report.rearmed.is_empty());
        assert!(report.phase.is_none());
    }

    #[test]
    fn completion_clears_armed_once() {
        let (orch, mut monitor) = monitor(20);
        orch.arm(CaptureTargetId::Buf);
        orch.with_hardware(|hw| hw.set_seq_busy(true));
        assert!(!monitor.poll().edges.any());

        orch.with_hardware(|hw| {
            hw.complete(CaptureTargetId::Buf);
            hw.set_seq_busy(false);
        });
        let report = monitor.poll();
        assert!(report.edges.buf);
        assert!(report.edges.seq);
        assert_eq!(
            report.rearmed,
            vec![(CaptureTargetId::Buf, ArmOutcome::Skipped)]
        );
        assert!(!orch.snapshot().buf.armed);

        assert!(!monitor.poll().edges.any());
    }

    #[test]
    fn auto_rearm_fires_again_on_edge() {
        let (orch, mut monitor) = monitor(20);
        orch.set_auto_rearm(CaptureTargetId::Ddr, true);
        orch.arm(CaptureTargetId::Ddr);
        orch.with_hardware(|hw| hw.complete(CaptureTargetId::Ddr));

        let report = monitor.poll();
        assert!(matches!(report.rearmed[0], (CaptureTargetId::Ddr, ArmOutcome::Fired(_))));
        assert!(orch.snapshot().ddr.armed);
        orch.with_hardware(|hw| assert_eq!(hw.fire_calls().len(), 2));
    }

    #[test]
    fn phase_latch_counted_by_tick() {
        let (orch, mut monitor) = monitor(20);
        orch.with_hardware(|hw| hw.set_next_phase(6));
        orch.arm(CaptureTargetId::Buf);
        let counters = monitor.poll().phase.unwrap();
        assert_eq!(counters.trigger_count, 1);
        assert_eq!(counters.raw_phase, 6);
        orch.with_hardware(|hw| assert!(hw.calls().contains(&HwCall::RearmRawPhase)));
    }

    #[test]
    fn inputs_polled_every_n_ticks() {
        let (orch, mut monitor) = monitor(3);
        orch.with_hardware(|hw| hw.set_input_seen(4));
        let polled: Vec<bool> = (0..6).map(|_| monitor.poll().inputs.is_some()).collect();
        assert_eq!(polled, vec![true, false, false, true, false, false]);
        assert!(!orch.snapshot().inputs_seen[4]);
    }

    #[test]
    fn first_poll_reports_seen_inputs() {
        let (orch, mut monitor) = monitor(20);
        orch.with_hardware(|hw| hw.set_input_seen(1));
        let inputs = monitor.poll().inputs.unwrap();
        assert_eq!(inputs, vec![false, true, false, false, false]);
        assert_eq!(orch.snapshot().inputs_seen, inputs);
    }

    #[test]
    fn run_stops_when_ticker_ends() {
        let (orch, monitor) = monitor(20);
        orch.arm(CaptureTargetId::Buf);
        orch.with_hardware(|hw| hw.complete(CaptureTargetId::Buf));
        monitor.spawn(Counted(3)).unwrap().join().unwrap();
        assert!(!orch.snapshot().buf.armed);
    }
}
