//! Orchestrator core.
//!
//! [`Orchestrator`] owns the trigger state and the hardware port behind a
//! single mutex. Every user request and every monitor tick takes that lock
//! for its whole duration, so state updates and the register accesses they
//! imply are never interleaved.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};

use crate::hardware::{BlankingSource, HardwarePort, MAX_TRIGGER_DELAY};
use crate::observability::metrics;

use super::collaborators::{CaptureProcessor, StatusPublisher};
use super::decision::{ArmPlan, plan_arm, targets_busy};
use super::settings::{
    BlankingSettings, SequencerSettings, SourceKind, TargetSettings, TriggerSettings,
};
use super::source::{BufBank, DdrBank, TriggerInput};
use super::state::OrchestratorState;
use super::status::{DecodedStatus, decode, decode_hardware_status};
use super::target::{CaptureTargetId, SeqTriggerSource, StatusTarget, TriggerStatus};

/// Result of an arm request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmOutcome {
    /// No target was eligible; nothing changed.
    Skipped,
    /// A participating target was busy; the planned targets are now pending.
    Deferred(ArmPlan),
    /// The planned targets were armed and the trigger fired.
    Fired(ArmPlan),
}

/// State and hardware guarded by the orchestrator lock.
pub(super) struct Inner<H> {
    pub(super) state: OrchestratorState,
    pub(super) hw: H,
}

/// The orchestrator lock, held, together with the collaborators.
pub(super) struct Locked<'a, H: HardwarePort> {
    pub(super) guard: MutexGuard<'a, Inner<H>>,
    pub(super) capture: &'a dyn CaptureProcessor,
    pub(super) publisher: &'a dyn StatusPublisher,
}

/// Trigger orchestrator for the DDR, BUF and sequencer targets.
pub struct Orchestrator<H: HardwarePort> {
    inner: Mutex<Inner<H>>,
    capture: Arc<dyn CaptureProcessor>,
    publisher: Arc<dyn StatusPublisher>,
}

impl<H: HardwarePort> Orchestrator<H> {
    /// Creates an orchestrator with default state: every target unarmed,
    /// `Normal`, on the internal source, auto-rearm off.
    #[must_use]
    pub fn new(
        hw: H,
        capture: Arc<dyn CaptureProcessor>,
        publisher: Arc<dyn StatusPublisher>,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: OrchestratorState::new(),
                hw,
            }),
            capture,
            publisher,
        }
    }

    pub(super) fn locked(&self) -> Locked<'_, H> {
        Locked {
            guard: self.inner.lock().expect("orchestrator lock poisoned"),
            capture: self.capture.as_ref(),
            publisher: self.publisher.as_ref(),
        }
    }

    /// Arms `target` on explicit user request.
    ///
    /// Synchronised peers on the same source are armed in the same fire.
    /// If a participating target is still busy the request is deferred and
    /// retried on its next ready edge.
    pub fn arm(&self, target: CaptureTargetId) -> ArmOutcome {
        self.locked().arm_target(target, false)
    }

    /// Stops `target` and blocks auto-rearm until the next explicit arm.
    pub fn stop(&self, target: CaptureTargetId) {
        self.locked().stop_target(target);
    }

    /// Selects the trigger source of `target`, stopping it first.
    pub fn set_source(&self, target: CaptureTargetId, external: bool) {
        self.locked().set_source(target, external);
    }

    /// Turns synchronised DDR+BUF arming on or off.
    pub fn set_sync_mode(&self, synchronise: bool) {
        let mut locked = self.locked();
        locked.guard.state.sync.synchronise = synchronise;
        info!(synchronise, "sync mode changed");
    }

    /// Enables or disables auto-rearm of `target`.
    pub fn set_auto_rearm(&self, target: CaptureTargetId, enabled: bool) {
        let mut locked = self.locked();
        locked.guard.state.target_mut(target).auto_rearm_enabled = enabled;
        debug!(%target, enabled, "auto-rearm changed");
    }

    /// Selects which capture engine feeds the sequencer.
    pub fn set_seq_source(&self, source: SeqTriggerSource) {
        self.locked().set_seq_source(source);
    }

    /// Writes the input enable vector of `target`.
    ///
    /// # Panics
    ///
    /// Panics if `enable` does not have one entry per input of the target.
    pub fn set_source_enables(&self, target: CaptureTargetId, enable: &[bool]) {
        self.locked().set_source_enables(target, enable);
    }

    /// Writes the input blanking vector of `target`.
    ///
    /// # Panics
    ///
    /// Panics if `blanking` does not have one entry per input of the target.
    pub fn set_source_blanking(&self, target: CaptureTargetId, blanking: &[bool]) {
        self.locked().set_source_blanking(target, blanking);
    }

    /// Writes the trigger delay of `target`, in turns.
    ///
    /// # Panics
    ///
    /// Panics if `turns` exceeds [`MAX_TRIGGER_DELAY`].
    pub fn set_trigger_delay(&self, target: CaptureTargetId, turns: u32) {
        self.locked().set_trigger_delay(target, turns);
    }

    /// Writes the blanking window length, in turns.
    pub fn set_blanking_window(&self, turns: u16) {
        let mut locked = self.locked();
        let Inner { state, hw } = &mut *locked.guard;
        state.blanking_window = turns;
        hw.write_blanking_window(turns);
    }

    /// Selects the signal opening the blanking window.
    pub fn set_blanking_source(&self, source: BlankingSource) {
        let mut locked = self.locked();
        let Inner { state, hw } = &mut *locked.guard;
        state.blanking_source = source;
        hw.write_blanking_source(source);
    }

    /// Zeroes the trigger and jitter counters.
    pub fn reset_trigger_count(&self) {
        let mut locked = self.locked();
        let counters = locked.guard.state.phase.reset();
        locked.publisher.publish_phase(&counters);
        metrics::set_phase_counters(&counters);
    }

    /// Returns a copy of the full orchestrator state.
    #[must_use]
    pub fn snapshot(&self) -> OrchestratorState {
        self.locked().guard.state.clone()
    }

    /// Exports the persistable settings.
    #[must_use]
    pub fn settings(&self) -> TriggerSettings {
        let locked = self.locked();
        let state = &locked.guard.state;
        let target_settings = |id: CaptureTargetId| {
            let target = state.target(id);
            let bank = state.sources(id);
            TargetSettings {
                source: SourceKind::from_external(target.uses_external_source),
                auto_rearm: target.auto_rearm_enabled,
                delay: state.delay(id),
                enable: bank.selected(&bank.enable),
                blanking: bank.selected(&bank.blanking),
            }
        };
        TriggerSettings {
            synchronise: state.sync.synchronise,
            ddr: target_settings(CaptureTargetId::Ddr),
            buf: target_settings(CaptureTargetId::Buf),
            sequencer: SequencerSettings {
                source: state.seq.trigger_source,
            },
            blanking: BlankingSettings {
                window: state.blanking_window,
                source: state.blanking_source,
            },
        }
    }

    /// Applies persisted settings, writing every register they cover.
    ///
    /// A target whose source selection changes is stopped first.
    ///
    /// # Panics
    ///
    /// Panics if a target lists an input it is not wired to, or a delay
    /// exceeds [`MAX_TRIGGER_DELAY`]. The configuration loader rejects both.
    pub fn apply_settings(&self, settings: &TriggerSettings) {
        let mut locked = self.locked();
        for (id, target) in [
            (CaptureTargetId::Ddr, &settings.ddr),
            (CaptureTargetId::Buf, &settings.buf),
        ] {
            let external = target.source.is_external();
            if locked.guard.state.target(id).uses_external_source != external {
                locked.set_source(id, external);
            }
            locked.guard.state.target_mut(id).auto_rearm_enabled = target.auto_rearm;
            locked.set_trigger_delay(id, target.delay);
            let enable = locked.guard.state.sources(id).mask(&target.enable);
            locked.set_source_enables(id, &enable);
            let blanking = locked.guard.state.sources(id).mask(&target.blanking);
            locked.set_source_blanking(id, &blanking);
        }
        locked.set_seq_source(settings.sequencer.source);

        let Inner { state, hw } = &mut *locked.guard;
        state.sync.synchronise = settings.synchronise;
        state.blanking_window = settings.blanking.window;
        state.blanking_source = settings.blanking.source;
        hw.write_blanking_window(settings.blanking.window);
        hw.write_blanking_source(settings.blanking.source);
        info!(synchronise = settings.synchronise, "trigger settings applied");
    }

    /// Runs `f` with exclusive access to the hardware port.
    pub fn with_hardware<R>(&self, f: impl FnOnce(&mut H) -> R) -> R {
        f(&mut self.locked().guard.hw)
    }
}

impl<H: HardwarePort> std::fmt::Debug for Orchestrator<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator").finish_non_exhaustive()
    }
}

impl<H: HardwarePort> Locked<'_, H> {
    /// Reads and decodes hardware status, remembering the result.
    pub(super) fn decode_status(&mut self) -> DecodedStatus {
        let Inner { state, hw } = &mut *self.guard;
        let status = decode_hardware_status(hw);
        state.last_status = status;
        status
    }

    pub(super) fn arm_target(&mut self, target: CaptureTargetId, auto_arm: bool) -> ArmOutcome {
        let plan = plan_arm(&self.guard.state, target, auto_arm);
        if !plan.any() {
            debug!(%target, auto_arm, "no eligible targets; arm skipped");
            return ArmOutcome::Skipped;
        }

        let status = self.decode_status();
        if targets_busy(&self.guard.state, target, &status) {
            for id in CaptureTargetId::ALL {
                if plan.includes(id) {
                    self.guard.state.target_mut(id).mark_pending();
                    metrics::record_deferred(id);
                }
            }
            debug!(%target, auto_arm, ?status, "participating target busy; arm deferred");
            return ArmOutcome::Deferred(plan);
        }

        let external = self.guard.state.target(target).uses_external_source;
        self.arm_and_fire(plan, external);
        ArmOutcome::Fired(plan)
    }

    fn arm_and_fire(&mut self, plan: ArmPlan, external: bool) {
        let Inner { state, hw } = &mut *self.guard;

        for id in CaptureTargetId::ALL.into_iter().filter(|id| plan.includes(*id)) {
            match id {
                CaptureTargetId::Ddr => {
                    hw.ddr_enable();
                    self.capture.arming_ddr_buffer();
                }
                CaptureTargetId::Buf => self.capture.arming_fast_buffer(),
            }
            state.target_mut(id).mark_armed();
            self.publisher.publish_status(id.into(), TriggerStatus::Armed);
        }
        if plan.seq {
            state.seq.armed = true;
            self.publisher
                .publish_status(StatusTarget::Seq, TriggerStatus::Armed);
        }

        if external {
            hw.arm(plan.ddr, plan.buf);
        } else {
            hw.soft_trigger(plan.ddr, plan.buf);
        }

        for id in CaptureTargetId::ALL.into_iter().filter(|id| plan.includes(*id)) {
            let bank = state.sources_mut(id);
            bank.reset_hits();
            self.publisher.publish_hits(id, &bank.hit);
        }

        info!(
            ddr = plan.ddr,
            buf = plan.buf,
            seq = plan.seq,
            external,
            "trigger armed"
        );
        metrics::record_fire(plan.ddr, plan.buf, external);
    }

    pub(super) fn stop_target(&mut self, target: CaptureTargetId) {
        let Inner { state, hw } = &mut *self.guard;
        let is_ddr = target == CaptureTargetId::Ddr;
        hw.disarm(is_ddr, !is_ddr);
        // Status registers are pulsed: read each once.
        let ddr = hw.read_ddr_status();
        let buf = hw.read_buf_status();
        let seq = hw.read_seq_status();
        // IQ captures are owned by the sequencer; leave the DDR running.
        if is_ddr && !ddr.iq_mode {
            hw.ddr_disable();
        }
        state.target_mut(target).mark_stopped();

        let status = decode(ddr, buf, seq);
        state.last_status = status;
        self.publisher
            .publish_status(target.into(), status.capture(target));
        info!(%target, "trigger target stopped");
        metrics::record_stop(target);
    }

    fn set_source(&mut self, target: CaptureTargetId, external: bool) {
        self.stop_target(target);
        self.guard.state.target_mut(target).uses_external_source = external;
        info!(%target, external, "trigger source changed");
    }

    fn set_seq_source(&mut self, source: SeqTriggerSource) {
        let Inner { state, hw } = &mut *self.guard;
        state.seq.trigger_source = source;
        hw.write_seq_trigger_source(source);
    }

    fn set_source_enables(&mut self, target: CaptureTargetId, enable: &[bool]) {
        let Inner { state, hw } = &mut *self.guard;
        match target {
            CaptureTargetId::Ddr => state.ddr_sources.set_enables::<DdrBank, _>(hw, enable),
            CaptureTargetId::Buf => state.buf_sources.set_enables::<BufBank, _>(hw, enable),
        }
    }

    fn set_source_blanking(&mut self, target: CaptureTargetId, blanking: &[bool]) {
        let Inner { state, hw } = &mut *self.guard;
        match target {
            CaptureTargetId::Ddr => state.ddr_sources.set_blanking::<DdrBank, _>(hw, blanking),
            CaptureTargetId::Buf => state.buf_sources.set_blanking::<BufBank, _>(hw, blanking),
        }
    }

    fn set_trigger_delay(&mut self, target: CaptureTargetId, turns: u32) {
        assert!(
            turns <= MAX_TRIGGER_DELAY,
            "trigger delay {turns} exceeds {MAX_TRIGGER_DELAY} turns"
        );
        let Inner { state, hw } = &mut *self.guard;
        match target {
            CaptureTargetId::Ddr => state.ddr_delay = turns,
            CaptureTargetId::Buf => state.buf_delay = turns,
        }
        hw.write_trigger_delay(target, turns);
    }

    /// Reads back and publishes the hit vector of `target`.
    pub(super) fn refresh_hits(&mut self, target: CaptureTargetId) {
        let Inner { state, hw } = &mut *self.guard;
        let hits = match target {
            CaptureTargetId::Ddr => state.ddr_sources.refresh_hits::<DdrBank, _>(hw),
            CaptureTargetId::Buf => state.buf_sources.refresh_hits::<BufBank, _>(hw),
        };
        self.publisher.publish_hits(target, hits);
        let fired: Vec<TriggerInput> = state.sources(target).selected(&state.sources(target).hit);
        debug!(%target, ?fired, "trigger hits");
    }
}
