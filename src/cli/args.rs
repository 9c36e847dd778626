//! CLI argument definitions
//!
//! All Clap derive structs for `tmbf-trigger` command-line parsing.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

// ============================================================================
// Root CLI
// ============================================================================

/// Trigger orchestrator for the DDR, fast buffer and sequencer capture
/// engines.
#[derive(Parser, Debug)]
#[command(name = "tmbf-trigger", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "TMBF_TRIGGER_COLOR")]
    pub color: ColorChoice,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the orchestrator and monitor loop against simulated hardware,
    /// reading console commands from stdin.
    Run(RunArgs),

    /// Validate configuration files without running.
    Validate(ValidateArgs),

    /// Display version information.
    Version(VersionArgs),
}

/// Arguments for `run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to YAML configuration file.
    #[arg(short, long, env = "TMBF_TRIGGER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Status polls a simulated capture stays busy for after triggering.
    #[arg(long, default_value_t = 50)]
    pub capture_polls: u32,

    /// Serve Prometheus metrics on this local port.
    #[arg(long, env = "TMBF_TRIGGER_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Write the JSONL event stream to this file instead of stderr.
    #[arg(long, env = "TMBF_TRIGGER_EVENTS_FILE")]
    pub events_file: Option<PathBuf>,

    /// Disable the event stream.
    #[arg(long, conflicts_with = "events_file")]
    pub no_events: bool,
}

/// Arguments for `validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Configuration files to validate.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,

    /// Enable strict validation (warnings become errors).
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for version display.
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}

/// Output format for structured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON output.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_run_flags() {
        let cli = Cli::try_parse_from([
            "tmbf-trigger",
            "-vv",
            "run",
            "--capture-polls",
            "5",
            "--metrics-port",
            "9100",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.capture_polls, 5);
                assert_eq!(args.metrics_port, Some(9100));
                assert!(!args.no_events);
            }
            other => panic!("expected run, got {other:?}"),
        }
    }

    #[test]
    fn validate_requires_files() {
        assert!(Cli::try_parse_from(["tmbf-trigger", "validate"]).is_err());
    }

    #[test]
    fn events_file_conflicts_with_no_events() {
        assert!(
            Cli::try_parse_from([
                "tmbf-trigger",
                "run",
                "--no-events",
                "--events-file",
                "e.jsonl"
            ])
            .is_err()
        );
    }
}
