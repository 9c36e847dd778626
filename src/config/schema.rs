//! Configuration schema.
//!
//! The YAML document as written by the operator. Input names stay strings
//! here so the validator can point at the exact entry and suggest a
//! correction; the loader resolves them into [`TriggerSettings`].

use std::num::NonZeroU32;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::trigger::{BlankingSettings, SequencerSettings, SourceKind, TriggerSettings};

/// Default monitor tick period.
pub const DEFAULT_MONITOR_INTERVAL: &str = "10ms";

/// Default number of ticks between input presence polls.
pub const DEFAULT_INPUT_POLL_TICKS: u32 = 20;

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TriggerConfig {
    /// Monitor loop pacing.
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Arm DDR and BUF together when their sources agree.
    #[serde(default)]
    pub synchronise: bool,

    /// DDR target.
    #[serde(default)]
    pub ddr: TargetConfig,

    /// BUF target.
    #[serde(default)]
    pub buf: TargetConfig,

    /// Sequencer trigger selection.
    #[serde(default)]
    pub sequencer: SequencerSettings,

    /// Blanking window.
    #[serde(default)]
    pub blanking: BlankingSettings,
}

/// Monitor loop pacing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorConfig {
    /// Tick period, e.g. `"10ms"`.
    #[serde(default = "default_interval")]
    pub interval: String,

    /// Ticks between input presence polls.
    #[serde(default = "default_input_poll_ticks")]
    pub input_poll_ticks: u32,
}

fn default_interval() -> String {
    DEFAULT_MONITOR_INTERVAL.to_owned()
}

const fn default_input_poll_ticks() -> u32 {
    DEFAULT_INPUT_POLL_TICKS
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            input_poll_ticks: default_input_poll_ticks(),
        }
    }
}

/// One capture target as written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    /// `soft` or `external`.
    #[serde(default)]
    pub source: SourceKind,

    /// Rearm automatically after each capture.
    #[serde(default)]
    pub auto_rearm: bool,

    /// Trigger delay in turns.
    #[serde(default)]
    pub delay: u32,

    /// Names of the inputs allowed to trigger the target.
    #[serde(default)]
    pub enable: Vec<String>,

    /// Names of the inputs that respect the blanking window.
    #[serde(default)]
    pub blanking: Vec<String>,
}

/// A validated configuration, ready to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedConfig {
    /// Monitor tick period.
    pub interval: Duration,
    /// Ticks between input presence polls.
    pub input_poll_ticks: NonZeroU32,
    /// Trigger settings for [`crate::trigger::Orchestrator::apply_settings`].
    pub settings: TriggerSettings,
}

impl Default for LoadedConfig {
    fn default() -> Self {
        Self {
            interval: crate::trigger::monitor::DEFAULT_INTERVAL,
            input_poll_ticks: crate::trigger::monitor::DEFAULT_INPUT_POLL_TICKS,
            settings: TriggerSettings::default(),
        }
    }
}
