//! Arm decision engine.
//!
//! Pure functions deciding which targets an arm request reaches. Nothing
//! here touches hardware or mutates state; the orchestrator acts on the
//! returned [`ArmPlan`].

use serde::Serialize;

use super::state::OrchestratorState;
use super::status::DecodedStatus;
use super::target::{AutoArmState, CaptureTarget, CaptureTargetId, SyncMode, TriggerStatus};

/// Targets reached by one arm request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ArmPlan {
    /// Arm the DDR.
    pub ddr: bool,
    /// Arm the BUF.
    pub buf: bool,
    /// Arm the sequencer alongside the buffer it follows.
    pub seq: bool,
}

impl ArmPlan {
    /// Returns whether any capture engine is reached.
    #[must_use]
    pub const fn any(&self) -> bool {
        self.ddr || self.buf
    }

    /// Returns whether the given capture engine is reached.
    #[must_use]
    pub const fn includes(&self, id: CaptureTargetId) -> bool {
        match id {
            CaptureTargetId::Ddr => self.ddr,
            CaptureTargetId::Buf => self.buf,
        }
    }
}

/// Decides whether `peer` joins an arm request made for `requested`.
///
/// A peer joins when it is on the requested source, is not already armed,
/// and either is the requested target or synchronised arming is on. An
/// automatic (post-completion) request is further limited by the peer's
/// rearm policy: `Normal` needs auto-rearm enabled, `Stopped` never joins,
/// and `PendingArm` always joins so that a deferred request is retried.
#[must_use]
pub const fn check_arm_target(
    requested: CaptureTargetId,
    peer: &CaptureTarget,
    sync: SyncMode,
    external: bool,
    auto_arm: bool,
) -> bool {
    let same_target = matches!(
        (requested, peer.id),
        (CaptureTargetId::Ddr, CaptureTargetId::Ddr) | (CaptureTargetId::Buf, CaptureTargetId::Buf)
    );
    let eligible = peer.uses_external_source == external
        && !peer.armed
        && (sync.synchronise || same_target);
    if !auto_arm {
        return eligible;
    }
    eligible
        && match peer.auto_arm_state {
            AutoArmState::Normal => peer.auto_rearm_enabled,
            AutoArmState::Stopped => false,
            AutoArmState::PendingArm => true,
        }
}

/// Computes which targets an arm request for `requested` reaches.
#[must_use]
pub const fn plan_arm(state: &OrchestratorState, requested: CaptureTargetId, auto_arm: bool) -> ArmPlan {
    let external = state.target(requested).uses_external_source;
    let ddr = check_arm_target(requested, &state.ddr, state.sync, external, auto_arm);
    let buf = check_arm_target(requested, &state.buf, state.sync, external, auto_arm);
    let seq = (ddr && state.seq.trigger_source.follows(CaptureTargetId::Ddr))
        || (buf && state.seq.trigger_source.follows(CaptureTargetId::Buf));
    ArmPlan { ddr, buf, seq }
}

/// Returns whether a target taking part in a request for `requested` is
/// still busy.
///
/// A capture target takes part when it shares the requested source and is
/// either the requested target or synchronised with it. It counts as busy
/// while the orchestrator still expects it armed or the hardware reports it
/// as anything other than ready.
#[must_use]
pub fn targets_busy(state: &OrchestratorState, requested: CaptureTargetId, status: &DecodedStatus) -> bool {
    let external = state.target(requested).uses_external_source;
    CaptureTargetId::ALL.into_iter().any(|id| {
        let target = state.target(id);
        let takes_part = target.uses_external_source == external
            && (id == requested || state.sync.synchronise);
        takes_part && (target.armed || status.capture(id) != TriggerStatus::Ready)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::target::SeqTriggerSource;
    use proptest::prelude::*;

    fn state(sync: bool) -> OrchestratorState {
        let mut state = OrchestratorState::new();
        state.sync.synchronise = sync;
        state
    }

    #[test]
    fn explicit_arm_reaches_only_requested_without_sync() {
        let state = state(false);
        let plan = plan_arm(&state, CaptureTargetId::Buf, false);
        assert_eq!(plan, ArmPlan { ddr: false, buf: true, seq: true });
    }

    #[test]
    fn sync_reaches_both_when_sources_agree() {
        let mut state = state(true);
        state.ddr.uses_external_source = true;
        state.buf.uses_external_source = true;
        let plan = plan_arm(&state, CaptureTargetId::Buf, false);
        assert!(plan.ddr && plan.buf);
    }

    #[test]
    fn sync_skips_peer_on_other_source() {
        let mut state = state(true);
        state.ddr.uses_external_source = true;
        let plan = plan_arm(&state, CaptureTargetId::Buf, false);
        assert!(!plan.ddr);
        assert!(plan.buf);
    }

    #[test]
    fn armed_peer_never_joins() {
        let mut state = state(true);
        state.ddr.armed = true;
        let plan = plan_arm(&state, CaptureTargetId::Ddr, false);
        assert!(!plan.ddr);
        assert!(plan.buf);
    }

    #[test]
    fn auto_arm_follows_rearm_policy() {
        let mut peer = CaptureTarget::new(CaptureTargetId::Ddr);
        let sync = SyncMode::default();
        let req = CaptureTargetId::Ddr;

        assert!(!check_arm_target(req, &peer, sync, false, true));
        peer.auto_rearm_enabled = true;
        assert!(check_arm_target(req, &peer, sync, false, true));

        peer.auto_arm_state = AutoArmState::Stopped;
        assert!(!check_arm_target(req, &peer, sync, false, true));
        // an explicit request still arms a stopped target
        assert!(check_arm_target(req, &peer, sync, false, false));

        peer.auto_rearm_enabled = false;
        peer.auto_arm_state = AutoArmState::PendingArm;
        assert!(check_arm_target(req, &peer, sync, false, true));
    }

    #[test]
    fn sequencer_follows_planned_buffer() {
        let mut state = state(false);
        state.seq.trigger_source = SeqTriggerSource::FollowDdr;
        assert!(!plan_arm(&state, CaptureTargetId::Buf, false).seq);
        assert!(plan_arm(&state, CaptureTargetId::Ddr, false).seq);
    }

    #[test]
    fn busy_when_synchronised_peer_armed() {
        let mut state = state(true);
        state.buf.armed = true;
        assert!(targets_busy(&state, CaptureTargetId::Ddr, &DecodedStatus::default()));
    }

    #[test]
    fn not_busy_when_unsynchronised_peer_armed() {
        let mut state = state(false);
        state.buf.armed = true;
        assert!(!targets_busy(&state, CaptureTargetId::Ddr, &DecodedStatus::default()));
    }

    #[test]
    fn busy_when_hardware_reports_requested_busy() {
        let state = state(false);
        let status = DecodedStatus {
            ddr: TriggerStatus::Busy,
            ..DecodedStatus::default()
        };
        assert!(targets_busy(&state, CaptureTargetId::Ddr, &status));
        assert!(!targets_busy(&state, CaptureTargetId::Buf, &status));
    }

    fn arb_auto_state() -> impl Strategy<Value = AutoArmState> {
        prop_oneof![
            Just(AutoArmState::Normal),
            Just(AutoArmState::Stopped),
            Just(AutoArmState::PendingArm),
        ]
    }

    fn arb_target(id: CaptureTargetId) -> impl Strategy<Value = CaptureTarget> {
        (any::<bool>(), any::<bool>(), any::<bool>(), arb_auto_state()).prop_map(
            move |(external, auto_rearm, armed, auto_state)| CaptureTarget {
                id,
                uses_external_source: external,
                auto_rearm_enabled: auto_rearm,
                armed,
                auto_arm_state: auto_state,
            },
        )
    }

    fn arb_state() -> impl Strategy<Value = OrchestratorState> {
        (
            arb_target(CaptureTargetId::Ddr),
            arb_target(CaptureTargetId::Buf),
            any::<bool>(),
            any::<bool>(),
        )
            .prop_map(|(ddr, buf, sync, seq_on_ddr)| {
                let mut state = OrchestratorState::new();
                state.ddr = ddr;
                state.buf = buf;
                state.sync.synchronise = sync;
                state.seq.trigger_source = if seq_on_ddr {
                    SeqTriggerSource::FollowDdr
                } else {
                    SeqTriggerSource::FollowBuf
                };
                state
            })
    }

    fn arb_request() -> impl Strategy<Value = CaptureTargetId> {
        prop_oneof![Just(CaptureTargetId::Ddr), Just(CaptureTargetId::Buf)]
    }

    proptest! {
        #[test]
        fn planned_targets_share_the_requested_source(
            state in arb_state(),
            requested in arb_request(),
            auto_arm in any::<bool>(),
        ) {
            let plan = plan_arm(&state, requested, auto_arm);
            let external = state.target(requested).uses_external_source;
            for id in CaptureTargetId::ALL {
                if plan.includes(id) {
                    prop_assert_eq!(state.target(id).uses_external_source, external);
                    prop_assert!(!state.target(id).armed);
                }
            }
        }

        #[test]
        fn without_sync_only_requested_target_is_planned(
            mut state in arb_state(),
            requested in arb_request(),
            auto_arm in any::<bool>(),
        ) {
            state.sync.synchronise = false;
            let plan = plan_arm(&state, requested, auto_arm);
            prop_assert!(!plan.includes(requested.peer()));
        }

        #[test]
        fn stopped_targets_never_auto_arm(
            state in arb_state(),
            requested in arb_request(),
        ) {
            let plan = plan_arm(&state, requested, true);
            for id in CaptureTargetId::ALL {
                if state.target(id).auto_arm_state == AutoArmState::Stopped {
                    prop_assert!(!plan.includes(id));
                }
            }
        }

        #[test]
        fn sequencer_only_armed_with_followed_buffer(
            state in arb_state(),
            requested in arb_request(),
            auto_arm in any::<bool>(),
        ) {
            let plan = plan_arm(&state, requested, auto_arm);
            let followed = match state.seq.trigger_source {
                SeqTriggerSource::FollowBuf => plan.buf,
                SeqTriggerSource::FollowDdr => plan.ddr,
            };
            prop_assert_eq!(plan.seq, followed);
        }
    }
}
