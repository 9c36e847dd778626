//! Persistable trigger settings.
//!
//! The subset of orchestrator state that survives a restart: source
//! selections, rearm policy, input enables and timing. The orchestrator
//! only exports and imports these values; storing them is left to the
//! caller (the YAML configuration loader, or an external persistence layer).

use serde::{Deserialize, Serialize};

use crate::hardware::BlankingSource;

use super::source::TriggerInput;
use super::target::SeqTriggerSource;

/// Trigger source selection of a capture target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Internal soft trigger.
    #[default]
    Soft,
    /// Shared external trigger.
    External,
}

impl SourceKind {
    /// Returns whether this is the external source.
    #[must_use]
    pub const fn is_external(self) -> bool {
        matches!(self, Self::External)
    }

    /// Maps the orchestrator's external flag back to a selection.
    #[must_use]
    pub const fn from_external(external: bool) -> Self {
        if external { Self::External } else { Self::Soft }
    }
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "soft" | "internal" => Ok(Self::Soft),
            "external" | "ext" => Ok(Self::External),
            other => Err(format!("unknown trigger source '{other}' (expected soft or external)")),
        }
    }
}

/// Settings of one capture target.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetSettings {
    /// Trigger source selection.
    #[serde(default)]
    pub source: SourceKind,
    /// Rearm automatically after each capture.
    #[serde(default)]
    pub auto_rearm: bool,
    /// Trigger delay in turns.
    #[serde(default)]
    pub delay: u32,
    /// Inputs allowed to trigger the target.
    #[serde(default)]
    pub enable: Vec<TriggerInput>,
    /// Inputs that respect the blanking window.
    #[serde(default)]
    pub blanking: Vec<TriggerInput>,
}

/// Sequencer settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SequencerSettings {
    /// Capture engine feeding the sequencer.
    #[serde(default)]
    pub source: SeqTriggerSource,
}

/// Blanking window settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlankingSettings {
    /// Window length in turns.
    #[serde(default)]
    pub window: u16,
    /// Signal opening the window.
    #[serde(default)]
    pub source: BlankingSource,
}

/// Every persistable trigger setting.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TriggerSettings {
    /// Arm DDR and BUF together when their sources agree.
    #[serde(default)]
    pub synchronise: bool,
    /// DDR settings.
    #[serde(default)]
    pub ddr: TargetSettings,
    /// BUF settings.
    #[serde(default)]
    pub buf: TargetSettings,
    /// Sequencer settings.
    #[serde(default)]
    pub sequencer: SequencerSettings,
    /// Blanking settings.
    #[serde(default)]
    pub blanking: BlankingSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_kind_parses_aliases() {
        assert_eq!("EXT".parse::<SourceKind>(), Ok(SourceKind::External));
        assert_eq!("internal".parse::<SourceKind>(), Ok(SourceKind::Soft));
        assert!("pm".parse::<SourceKind>().is_err());
    }

    #[test]
    fn external_flag_maps_both_ways() {
        for kind in [SourceKind::Soft, SourceKind::External] {
            assert_eq!(SourceKind::from_external(kind.is_external()), kind);
        }
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let yaml = "synchronise: true\nbuf:\n  source: external\n  enable: [ext, seq]\n";
        let settings: TriggerSettings = serde_yaml::from_str(yaml).unwrap();
        assert!(settings.synchronise);
        assert_eq!(settings.buf.source, SourceKind::External);
        assert_eq!(
            settings.buf.enable,
            vec![TriggerInput::External, TriggerInput::Sequencer]
        );
        assert_eq!(settings.ddr, TargetSettings::default());
        assert_eq!(settings.sequencer.source, SeqTriggerSource::FollowBuf);
    }
}
