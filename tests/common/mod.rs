//! Shared integration-test harness: recording collaborators and an
//! orchestrator wired to the simulated hardware.

#![allow(dead_code)]

use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};

use tmbf_trigger::hardware::{BUF_SOURCE_COUNT, DDR_SOURCE_COUNT, SimHardware};
use tmbf_trigger::trigger::{
    CaptureProcessor, CaptureTargetId, Monitor, Orchestrator, PhaseCounters, StatusPublisher,
    StatusTarget, TriggerStatus,
};

/// One collaborator callback, in the order it was made.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Status(StatusTarget, TriggerStatus),
    Hits(CaptureTargetId, Vec<bool>),
    Inputs(Vec<bool>),
    Phase(PhaseCounters),
    ArmingDdr,
    ArmingBuf,
    ProcessDdr,
    ProcessBuf,
}

/// Records every collaborator callback into one shared log.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    log: Arc<Mutex<Vec<Notice>>>,
}

impl Recorder {
    pub fn push(&self, notice: Notice) {
        self.log.lock().unwrap().push(notice);
    }

    /// Returns and clears the log.
    pub fn take(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.log.lock().unwrap())
    }

    /// Statuses published for `target`, oldest first.
    pub fn statuses(&self, target: StatusTarget) -> Vec<TriggerStatus> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter_map(|n| match n {
                Notice::Status(t, s) if *t == target => Some(*s),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, notice: &Notice) -> usize {
        self.log.lock().unwrap().iter().filter(|n| *n == notice).count()
    }
}

impl StatusPublisher for Recorder {
    fn publish_status(&self, target: StatusTarget, status: TriggerStatus) {
        self.push(Notice::Status(target, status));
    }

    fn publish_hits(&self, target: CaptureTargetId, hits: &[bool]) {
        self.push(Notice::Hits(target, hits.to_vec()));
    }

    fn publish_inputs(&self, inputs: &[bool]) {
        self.push(Notice::Inputs(inputs.to_vec()));
    }

    fn publish_phase(&self, counters: &PhaseCounters) {
        self.push(Notice::Phase(*counters));
    }
}

impl CaptureProcessor for Recorder {
    fn arming_ddr_buffer(&self) {
        self.push(Notice::ArmingDdr);
    }

    fn arming_fast_buffer(&self) {
        self.push(Notice::ArmingBuf);
    }

    fn process_ddr_buffer(&self) {
        self.push(Notice::ProcessDdr);
    }

    fn process_fast_buffer(&self) {
        self.push(Notice::ProcessBuf);
    }
}

/// Orchestrator, monitor and recorder sharing one simulated board.
pub struct Harness {
    pub orchestrator: Arc<Orchestrator<SimHardware>>,
    pub monitor: Monitor<SimHardware>,
    pub recorder: Recorder,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_hardware(SimHardware::new())
    }

    pub fn with_hardware(hw: SimHardware) -> Self {
        let recorder = Recorder::default();
        let orchestrator = Arc::new(Orchestrator::new(
            hw,
            Arc::new(recorder.clone()),
            Arc::new(recorder.clone()),
        ));
        let monitor = Monitor::new(Arc::clone(&orchestrator), NonZeroU32::new(20).unwrap());
        Self {
            orchestrator,
            monitor,
            recorder,
        }
    }

    /// Puts both engines on the external source with the external input
    /// enabled.
    pub fn external_sources(&self) {
        for target in CaptureTargetId::ALL {
            self.orchestrator.set_source(target, true);
            let inputs = match target {
                CaptureTargetId::Ddr => DDR_SOURCE_COUNT,
                CaptureTargetId::Buf => BUF_SOURCE_COUNT,
            };
            let mut enable = vec![false; inputs];
            enable[0] = true;
            self.orchestrator.set_source_enables(target, &enable);
        }
    }
}
