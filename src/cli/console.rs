//! Line-oriented operator console for `run`.
//!
//! Each stdin line is one command, split with shell quoting rules. Commands
//! map one-to-one onto orchestrator requests, plus a few that drive the
//! simulated hardware (`fire-external`).

use std::time::Instant;

use serde::Serialize;

use crate::config::resolve_input;
use crate::error::TriggerError;
use crate::hardware::{BlankingSource, MAX_TRIGGER_DELAY, SimHardware};
use crate::trigger::{
    CaptureTargetId, Orchestrator, OrchestratorState, PhaseCounters, SeqTriggerSource, SourceKind,
    TriggerInput,
};

/// Console help text.
pub const HELP: &str = "\
commands:
  arm <ddr|buf>                  arm a target (and synchronised peers)
  stop <ddr|buf>                 stop a target and block auto-rearm
  source <ddr|buf> <soft|external>
  sync <on|off>                  synchronised DDR+BUF arming
  auto <ddr|buf> <on|off>        auto-rearm after each capture
  seq <ddr|buf>                  buffer followed by the sequencer
  enable <ddr|buf> [input...]    inputs allowed to trigger (ext pm adc seq sclk)
  blank <ddr|buf> [input...]     inputs that respect the blanking window
  delay <ddr|buf> <turns>        trigger delay
  window <turns> [trigger|sclk]  blanking window length and source
  fire-external                  pulse the simulated external trigger
  reset-count                    zero trigger and jitter counters
  status                         print orchestrator state as JSON
  settings                       print persistable settings as YAML
  help
  quit";

/// A parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// `arm <target>`
    Arm(CaptureTargetId),
    /// `stop <target>`
    Stop(CaptureTargetId),
    /// `source <target> <kind>`
    Source(CaptureTargetId, SourceKind),
    /// `sync <on|off>`
    Sync(bool),
    /// `auto <target> <on|off>`
    Auto(CaptureTargetId, bool),
    /// `seq <target>`
    Seq(SeqTriggerSource),
    /// `enable <target> [inputs]`
    Enable(CaptureTargetId, Vec<TriggerInput>),
    /// `blank <target> [inputs]`
    Blank(CaptureTargetId, Vec<TriggerInput>),
    /// `delay <target> <turns>`
    Delay(CaptureTargetId, u32),
    /// `window <turns> [source]`
    Window(u16, Option<BlankingSource>),
    /// `fire-external`
    FireExternal,
    /// `reset-count`
    ResetCount,
    /// `status`
    Status,
    /// `settings`
    Settings,
    /// `help`
    Help,
    /// `quit`
    Quit,
}

fn usage(message: impl Into<String>) -> TriggerError {
    TriggerError::Usage(message.into())
}

fn parse_bool(word: &str) -> Result<bool, TriggerError> {
    match word.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        other => Err(usage(format!("expected on or off, got '{other}'"))),
    }
}

fn parse_inputs(target: CaptureTargetId, words: &[String]) -> Result<Vec<TriggerInput>, TriggerError> {
    let mut inputs = Vec::new();
    for name in words.iter().flat_map(|w| w.split(',')).filter(|n| !n.is_empty()) {
        let input = resolve_input(name, target)?;
        if !inputs.contains(&input) {
            inputs.push(input);
        }
    }
    Ok(inputs)
}

/// Parses one console line. Blank lines and `#` comments yield `None`.
///
/// # Errors
///
/// Returns [`TriggerError::Usage`] for malformed commands and
/// [`TriggerError::Config`] for unknown input names.
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>, TriggerError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let words = shlex::split(line).ok_or_else(|| usage("unbalanced quotes"))?;
    let Some((verb, rest)) = words.split_first() else {
        return Ok(None);
    };

    let arg = |i: usize, what: &str| -> Result<&str, TriggerError> {
        rest.get(i)
            .map(String::as_str)
            .ok_or_else(|| usage(format!("{verb}: missing {what}")))
    };
    let target = |i: usize| -> Result<CaptureTargetId, TriggerError> {
        arg(i, "target")?.parse().map_err(usage)
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "arm" => ConsoleCommand::Arm(target(0)?),
        "stop" => ConsoleCommand::Stop(target(0)?),
        "source" => ConsoleCommand::Source(target(0)?, arg(1, "source")?.parse().map_err(usage)?),
        "sync" => ConsoleCommand::Sync(parse_bool(arg(0, "on|off")?)?),
        "auto" => ConsoleCommand::Auto(target(0)?, parse_bool(arg(1, "on|off")?)?),
        "seq" => ConsoleCommand::Seq(arg(0, "target")?.parse().map_err(usage)?),
        "enable" => {
            let id = target(0)?;
            ConsoleCommand::Enable(id, parse_inputs(id, &rest[1..])?)
        }
        "blank" => {
            let id = target(0)?;
            ConsoleCommand::Blank(id, parse_inputs(id, &rest[1..])?)
        }
        "delay" => {
            let turns: u32 = arg(1, "turns")?
                .parse()
                .map_err(|e| usage(format!("delay: {e}")))?;
            if turns > MAX_TRIGGER_DELAY {
                return Err(usage(format!(
                    "delay: {turns} exceeds the maximum of {MAX_TRIGGER_DELAY} turns"
                )));
            }
            ConsoleCommand::Delay(target(0)?, turns)
        }
        "window" => {
            let turns: u16 = arg(0, "turns")?
                .parse()
                .map_err(|e| usage(format!("window: {e}")))?;
            let source = match rest.get(1).map(|s| s.to_ascii_lowercase()) {
                None => None,
                Some(s) if s == "trigger" => Some(BlankingSource::Trigger),
                Some(s) if s == "sclk" => Some(BlankingSource::Sclk),
                Some(other) => {
                    return Err(usage(format!(
                        "window: unknown blanking source '{other}' (expected trigger or sclk)"
                    )));
                }
            };
            ConsoleCommand::Window(turns, source)
        }
        "fire-external" | "fire" => ConsoleCommand::FireExternal,
        "reset-count" => ConsoleCommand::ResetCount,
        "status" => ConsoleCommand::Status,
        "settings" => ConsoleCommand::Settings,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(usage(format!("unknown command '{other}' (try help)"))),
    };
    Ok(Some(command))
}

#[derive(Serialize)]
struct StatusReport<'a> {
    #[serde(flatten)]
    state: &'a OrchestratorState,
    counters: PhaseCounters,
    trigger_age_secs: Option<f64>,
}

/// Executes a command, returning the text to print (if any).
///
/// # Errors
///
/// Returns an error if `status` or `settings` output cannot be serialized.
pub fn execute(
    command: &ConsoleCommand,
    orchestrator: &Orchestrator<SimHardware>,
) -> Result<Option<String>, TriggerError> {
    let output = match command {
        ConsoleCommand::Arm(target) => Some(format!("{:?}", orchestrator.arm(*target))),
        ConsoleCommand::Stop(target) => {
            orchestrator.stop(*target);
            None
        }
        ConsoleCommand::Source(target, kind) => {
            orchestrator.set_source(*target, kind.is_external());
            None
        }
        ConsoleCommand::Sync(on) => {
            orchestrator.set_sync_mode(*on);
            None
        }
        ConsoleCommand::Auto(target, on) => {
            orchestrator.set_auto_rearm(*target, *on);
            None
        }
        ConsoleCommand::Seq(source) => {
            orchestrator.set_seq_source(*source);
            None
        }
        ConsoleCommand::Enable(target, inputs) => {
            let bits = orchestrator.snapshot().sources(*target).mask(inputs);
            orchestrator.set_source_enables(*target, &bits);
            None
        }
        ConsoleCommand::Blank(target, inputs) => {
            let bits = orchestrator.snapshot().sources(*target).mask(inputs);
            orchestrator.set_source_blanking(*target, &bits);
            None
        }
        ConsoleCommand::Delay(target, turns) => {
            orchestrator.set_trigger_delay(*target, *turns);
            None
        }
        ConsoleCommand::Window(turns, source) => {
            orchestrator.set_blanking_window(*turns);
            if let Some(source) = source {
                orchestrator.set_blanking_source(*source);
            }
            None
        }
        ConsoleCommand::FireExternal => {
            orchestrator.with_hardware(SimHardware::fire_external);
            None
        }
        ConsoleCommand::ResetCount => {
            orchestrator.reset_trigger_count();
            None
        }
        ConsoleCommand::Status => {
            let state = orchestrator.snapshot();
            let report = StatusReport {
                counters: state.phase.counters(),
                trigger_age_secs: state
                    .phase
                    .since_last_trigger(Instant::now())
                    .map(|age| age.as_secs_f64()),
                state: &state,
            };
            Some(serde_json::to_string(&report)?)
        }
        ConsoleCommand::Settings => Some(serde_yaml::to_string(&orchestrator.settings())?),
        ConsoleCommand::Help => Some(HELP.to_owned()),
        ConsoleCommand::Quit => None,
    };
    Ok(output)
}
