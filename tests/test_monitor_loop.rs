mod common;

use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

use common::Harness;
use tmbf_trigger::hardware::SimHardware;
use tmbf_trigger::trigger::{
    CaptureReady, CaptureTargetId, HandshakeCapture, IntervalTicker, Monitor, NullPublisher,
    Orchestrator, Ticker,
};

/// Ticker that allows a fixed number of ticks, without sleeping.
struct Counted(u32);

impl Ticker for Counted {
    fn tick(&mut self) -> bool {
        self.0 = self.0.saturating_sub(1);
        self.0 > 0
    }
}

#[test]
fn lock_held_until_capture_acknowledged() {
    let (capture, consumer) = HandshakeCapture::channel();
    let orch = Arc::new(Orchestrator::new(
        SimHardware::new(),
        Arc::new(capture),
        Arc::new(NullPublisher),
    ));
    orch.arm(CaptureTargetId::Buf);
    orch.with_hardware(|hw| hw.complete(CaptureTargetId::Buf));

    let mut monitor = Monitor::new(Arc::clone(&orch), NonZeroU32::new(20).unwrap());
    let ticking = std::thread::spawn(move || monitor.poll());

    let notice = consumer.ready.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(
        notice,
        CaptureReady {
            target: CaptureTargetId::Buf
        }
    );

    // a request made now has to wait for the acknowledgement
    let (tx, rx) = mpsc::channel();
    let reader = Arc::clone(&orch);
    let waiter = std::thread::spawn(move || tx.send(reader.snapshot()).unwrap());
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

    consumer.ack.send(()).unwrap();
    let report = ticking.join().unwrap();
    assert!(report.edges.buf);

    let state = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(!state.buf.armed);
    waiter.join().unwrap();
}

#[test]
fn spawned_monitor_keeps_rearming() {
    let h = Harness::with_hardware(SimHardware::with_capture_polls(1));
    h.orchestrator.set_auto_rearm(CaptureTargetId::Ddr, true);
    h.orchestrator.arm(CaptureTargetId::Ddr);

    h.monitor.spawn(Counted(30)).unwrap().join().unwrap();

    let fires = h.orchestrator.with_hardware(|hw| hw.fire_calls().len());
    assert!(fires > 2, "expected repeated rearms, got {fires}");
    assert!(h.orchestrator.snapshot().phase.counters().trigger_count >= 1);
}

#[test]
fn interval_ticker_paces_the_loop() {
    let h = Harness::new();
    let start = std::time::Instant::now();

    struct Limited(IntervalTicker, u32);
    impl Ticker for Limited {
        fn tick(&mut self) -> bool {
            self.1 -= 1;
            self.1 > 0 && self.0.tick()
        }
    }

    h.monitor
        .spawn(Limited(IntervalTicker::new(Duration::from_millis(5)), 5))
        .unwrap()
        .join()
        .unwrap();
    assert!(start.elapsed() >= Duration::from_millis(15));
}
