//! Logging initialization.
//!
//! Structured logging via `tracing`, human-readable or JSON, with the
//! verbosity overridable through `TMBF_TRIGGER_LOG_LEVEL`.

use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

use crate::cli::args::ColorChoice;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable format with optional ANSI colors.
    #[default]
    Human,
    /// Newline-delimited JSON for machine consumption.
    Json,
}

/// Maps a verbosity level to the level of this crate's own targets.
#[must_use]
pub const fn verbosity_to_level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Builds the default filter directive for a verbosity level.
///
/// Only `tmbf_trigger` targets follow `-v`; dependencies such as the
/// metrics exporter stay at `warn` unless `TMBF_TRIGGER_LOG_LEVEL` says
/// otherwise.
#[must_use]
pub fn default_directive(verbosity: u8) -> String {
    match verbosity_to_level(verbosity) {
        "warn" => "warn".to_owned(),
        level => format!("warn,tmbf_trigger={level}"),
    }
}

/// Initializes the global tracing subscriber on stderr.
///
/// `TMBF_TRIGGER_LOG_LEVEL`, when set, takes precedence over `verbosity`.
/// Uses `try_init()`, so repeated calls are harmless.
pub fn init_logging(format: LogFormat, verbosity: u8, color: ColorChoice) {
    let filter = EnvFilter::try_from_env("TMBF_TRIGGER_LOG_LEVEL")
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    let show_target = verbosity >= 2;

    let use_ansi = match color {
        ColorChoice::Auto => {
            std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
        }
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    match format {
        LogFormat::Human => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(use_ansi)
                .with_target(show_target)
                .with_thread_names(show_target)
                .with_writer(std::io::stderr)
                .try_init();
        }
        LogFormat::Json => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .with_target(show_target)
                .with_thread_names(true)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
}
