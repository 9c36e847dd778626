//! Error types for `tmbf-trigger`.
//!
//! The orchestrator core has no recoverable errors: register I/O is
//! infallible and contract violations panic. Everything here belongs to the
//! layers around it (configuration loading and the command line).

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Exit Codes
// ============================================================================

/// Process exit codes for the `tmbf-trigger` binary.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Usage error (invalid arguments, malformed console command)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type.
#[derive(Debug, Error)]
pub enum TriggerError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid command-line usage
    #[error("usage error: {0}")]
    Usage(String),
}

impl TriggerError {
    /// Returns the exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Yaml(_) | Self::Json(_) => ExitCode::CONFIG_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
            Self::Usage(_) => ExitCode::USAGE_ERROR,
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Configuration validation failed
    #[error("validation failed for {path}")]
    ValidationError {
        /// Path to the configuration file
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },

    /// Trigger input name not wired to the target
    #[error("unknown trigger input '{name}' for {target}{}", suggestion.as_ref().map_or_else(String::new, |s| format!(" (did you mean '{s}'?)")))]
    UnknownInput {
        /// Name as written
        name: String,
        /// Owning target
        target: String,
        /// Closest valid input name, if any is close
        suggestion: Option<String>,
    },
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Path to the problematic field (e.g. `"ddr.enable[1]"`)
    pub path: String,
    /// Description of the issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Prevents the configuration from being used
    Error,
    /// Reported, but the configuration still loads
    Warning,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_by_variant() {
        let config = TriggerError::Config(ConfigError::MissingFile {
            path: PathBuf::from("trigger.yaml"),
        });
        assert_eq!(config.exit_code(), ExitCode::CONFIG_ERROR);

        let io = TriggerError::Io(std::io::Error::other("boom"));
        assert_eq!(io.exit_code(), ExitCode::IO_ERROR);

        let usage = TriggerError::Usage("bad".into());
        assert_eq!(usage.exit_code(), ExitCode::USAGE_ERROR);
    }

    #[test]
    fn unknown_input_message_carries_suggestion() {
        let err = ConfigError::UnknownInput {
            name: "exr".into(),
            target: "buf".into(),
            suggestion: Some("ext".into()),
        };
        assert_eq!(
            err.to_string(),
            "unknown trigger input 'exr' for buf (did you mean 'ext'?)"
        );

        let err = ConfigError::UnknownInput {
            name: "zzz".into(),
            target: "ddr".into(),
            suggestion: None,
        };
        assert_eq!(err.to_string(), "unknown trigger input 'zzz' for ddr");
    }

    #[test]
    fn validation_issue_display() {
        let issue = ValidationIssue {
            path: "buf.delay".into(),
            message: "delay out of range".into(),
            severity: Severity::Warning,
        };
        assert_eq!(issue.to_string(), "warning: delay out of range at buf.delay");
    }
}
