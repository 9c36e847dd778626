//! Metrics collection.
//!
//! Prometheus-compatible counters and gauges for trigger activity. Label
//! values come only from fixed target names, so cardinality is bounded.
//! Every recording function is a no-op until [`init_metrics`] installs a
//! recorder.

use std::sync::atomic::{AtomicBool, Ordering};

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::TriggerError;
use crate::trigger::{CaptureTargetId, PhaseCounters, StatusTarget, TriggerStatus};

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without an
/// HTTP endpoint.
///
/// # Errors
///
/// Returns `TriggerError::Io` if the recorder or HTTP listener cannot be
/// installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), TriggerError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| TriggerError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    describe_counter!(
        "tmbf_trigger_fires_total",
        "Hardware fire calls (arm or soft trigger) by targets and mode"
    );
    describe_counter!(
        "tmbf_trigger_ready_edges_total",
        "Completed captures detected by the monitor loop"
    );
    describe_counter!(
        "tmbf_trigger_deferred_total",
        "Arm requests deferred because a participating target was busy"
    );
    describe_counter!("tmbf_trigger_stops_total", "Explicit target stops");
    describe_gauge!("tmbf_trigger_count", "Triggers seen since the last reset");
    describe_gauge!(
        "tmbf_trigger_jitter_count",
        "Triggers whose phase differed from the previous trigger"
    );
    describe_gauge!(
        "tmbf_trigger_status",
        "Target status (0 = ready, 1 = armed, 2 = busy)"
    );
}

/// Records one hardware fire call.
pub fn record_fire(ddr: bool, buf: bool, external: bool) {
    let mode = if external { "external" } else { "soft" };
    counter!(
        "tmbf_trigger_fires_total",
        "ddr" => ddr.to_string(),
        "buf" => buf.to_string(),
        "mode" => mode,
    )
    .increment(1);
}

/// Records a ready edge.
pub fn record_ready_edge(target: StatusTarget) {
    counter!("tmbf_trigger_ready_edges_total", "target" => target.as_str()).increment(1);
}

/// Records a deferred arm for one planned target.
pub fn record_deferred(target: CaptureTargetId) {
    counter!("tmbf_trigger_deferred_total", "target" => target.as_str()).increment(1);
}

/// Records an explicit stop.
pub fn record_stop(target: CaptureTargetId) {
    counter!("tmbf_trigger_stops_total", "target" => target.as_str()).increment(1);
}

/// Sets the status gauge of a target.
pub fn set_status(target: StatusTarget, status: TriggerStatus) {
    gauge!("tmbf_trigger_status", "target" => target.as_str()).set(status.as_gauge());
}

/// Sets the trigger and jitter count gauges.
#[allow(clippy::cast_precision_loss)]
pub fn set_phase_counters(counters: &PhaseCounters) {
    gauge!("tmbf_trigger_count").set(counters.trigger_count as f64);
    gauge!("tmbf_trigger_jitter_count").set(counters.jitter_count as f64);
}
