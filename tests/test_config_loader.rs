mod common;

use std::io::Write;
use std::time::Duration;

use common::Harness;
use tmbf_trigger::config::ConfigLoader;
use tmbf_trigger::error::ConfigError;
use tmbf_trigger::hardware::{BlankingSource, HwCall};
use tmbf_trigger::trigger::{CaptureTargetId, SeqTriggerSource, TriggerInput};

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

const FULL: &str = "\
monitor:
  interval: 20ms
  input_poll_ticks: 5
synchronise: true
ddr:
  source: external
  auto_rearm: true
  delay: 100
  enable: [ext, PM]
  blanking: [pm]
buf:
  source: external
  enable: [ext, adc]
sequencer:
  source: ddr
blanking:
  window: 40
  source: sclk
";

#[test]
fn full_file_loads_and_applies() {
    let file = write_config(FULL);
    let loaded = ConfigLoader::default().load(file.path()).unwrap();

    assert!(loaded.warnings.is_empty(), "{:?}", loaded.warnings);
    let config = loaded.config;
    assert_eq!(config.interval, Duration::from_millis(20));
    assert_eq!(config.input_poll_ticks.get(), 5);
    assert_eq!(
        config.settings.ddr.enable,
        vec![TriggerInput::External, TriggerInput::Postmortem]
    );

    let h = Harness::new();
    h.orchestrator.apply_settings(&config.settings);

    let state = h.orchestrator.snapshot();
    assert!(state.sync.synchronise);
    assert!(state.ddr.uses_external_source && state.buf.uses_external_source);
    assert!(state.ddr.auto_rearm_enabled);
    assert_eq!(state.seq.trigger_source, SeqTriggerSource::FollowDdr);
    h.orchestrator.with_hardware(|hw| {
        assert_eq!(hw.enables(CaptureTargetId::Ddr), &[true, true, false, false, false]);
        assert_eq!(hw.blanking_bits(CaptureTargetId::Ddr), &[false, true, false, false, false]);
        assert_eq!(hw.enables(CaptureTargetId::Buf), &[true, true, false]);
        assert_eq!(hw.delay(CaptureTargetId::Ddr), 100);
        assert_eq!(hw.blanking(), (40, BlankingSource::Sclk));
        assert!(hw.calls().contains(&HwCall::WriteSeqSource(SeqTriggerSource::FollowDdr)));
    });

    assert_eq!(h.orchestrator.settings(), config.settings);
}

#[test]
fn env_defaults_in_file() {
    let file = write_config(
        "ddr:\n  delay: ${TMBF_TRIGGER_IT_UNSET_DDR:-250}\nbuf:\n  source: ${TMBF_TRIGGER_IT_UNSET_BUF:-external}\n  enable: [ext]\n",
    );

    let loaded = ConfigLoader::default().load(file.path()).unwrap();
    assert_eq!(loaded.config.settings.ddr.delay, 250);
    assert!(loaded.config.settings.buf.source.is_external());
}

#[test]
fn unset_variable_warns() {
    let file = write_config("ddr:\n  enable: [${TMBF_TRIGGER_IT_UNSET_WARN}]\n");
    let loaded = ConfigLoader::default().load(file.path()).unwrap();
    assert_eq!(loaded.warnings.len(), 1);
}

#[test]
fn unknown_input_reports_suggestion() {
    let file = write_config("buf:\n  enable: [exy]\n");
    let err = ConfigLoader::default().load(file.path()).unwrap_err();
    let errors = match err {
        ConfigError::ValidationError { errors, .. } => errors,
        other => panic!("expected validation error, got {other:?}"),
    };
    assert!(errors.iter().any(|e| e.message.contains("did you mean 'ext'")));
}

#[test]
fn unknown_field_is_parse_error() {
    let file = write_config("ddr:\n  sorce: external\n");
    let err = ConfigLoader::default().load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::ParseError { .. }));
}

#[test]
fn missing_file_reported() {
    let dir = tempfile::tempdir().unwrap();
    let err = ConfigLoader::default()
        .load(&dir.path().join("absent.yaml"))
        .unwrap_err();
    assert!(matches!(err, ConfigError::MissingFile { .. }));
}
