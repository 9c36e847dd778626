//! Configuration validation.
//!
//! Validation collects every issue rather than stopping at the first, so a
//! single `validate` run reports everything wrong with a file.

use std::collections::HashSet;
use std::time::Duration;

use crate::config::schema::{TargetConfig, TriggerConfig};
use crate::error::{ConfigError, Severity, ValidationIssue};
use crate::hardware::MAX_TRIGGER_DELAY;
use crate::trigger::{CaptureTargetId, TriggerInput};

/// Monitor periods above this detect completions late enough to matter.
const SLOW_MONITOR_INTERVAL: Duration = Duration::from_millis(100);

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors (prevent loading).
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (informational).
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Resolves an input name for `target`.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownInput`] if the name is not one of the
/// target's inputs, with the closest valid name as a suggestion.
pub fn resolve_input(name: &str, target: CaptureTargetId) -> Result<TriggerInput, ConfigError> {
    let inputs = TriggerInput::for_target(target);
    let wanted = name.trim().to_ascii_lowercase();
    inputs
        .iter()
        .find(|input| input.as_str() == wanted)
        .copied()
        .ok_or_else(|| ConfigError::UnknownInput {
            name: name.to_owned(),
            target: target.to_string(),
            suggestion: suggest_input(&wanted, inputs),
        })
}

/// Closest input name within edit distance 2.
fn suggest_input(name: &str, inputs: &[TriggerInput]) -> Option<String> {
    inputs
        .iter()
        .map(|input| (input.as_str(), strsim::damerau_levenshtein(name, input.as_str())))
        .filter(|(_, dist)| *dist <= 2)
        .min_by_key(|(_, dist)| *dist)
        .map(|(name, _)| name.to_owned())
}

/// Configuration validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a configuration and returns the result.
    pub fn validate(&mut self, config: &TriggerConfig) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        self.validate_monitor(config);
        for (id, target) in [
            (CaptureTargetId::Ddr, &config.ddr),
            (CaptureTargetId::Buf, &config.buf),
        ] {
            self.validate_target(id, target);
        }

        if config.synchronise && config.ddr.source != config.buf.source {
            self.add_warning(
                "synchronise",
                "ddr and buf use different trigger sources, so they are never armed together",
            );
        }

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    fn validate_monitor(&mut self, config: &TriggerConfig) {
        let path = "monitor.interval";
        match humantime::parse_duration(config.monitor.interval.trim()) {
            Ok(d) if d.is_zero() => self.add_error(path, "Monitor interval must be non-zero"),
            Ok(d) if d > SLOW_MONITOR_INTERVAL => self.add_warning(
                path,
                &format!(
                    "Monitor interval {} delays capture completion handling",
                    config.monitor.interval
                ),
            ),
            Ok(_) => {}
            Err(e) => self.add_error(
                path,
                &format!("Invalid duration '{}': {e}", config.monitor.interval),
            ),
        }

        if config.monitor.input_poll_ticks == 0 {
            self.add_error("monitor.input_poll_ticks", "Must be at least 1");
        }
    }

    fn validate_target(&mut self, id: CaptureTargetId, target: &TargetConfig) {
        if target.delay > MAX_TRIGGER_DELAY {
            self.add_error(
                &format!("{id}.delay"),
                &format!(
                    "Trigger delay {} exceeds the maximum of {MAX_TRIGGER_DELAY} turns",
                    target.delay
                ),
            );
        }

        let enabled = self.validate_inputs(id, "enable", &target.enable);
        let blanked = self.validate_inputs(id, "blanking", &target.blanking);

        for input in blanked.difference(&enabled) {
            self.add_warning(
                &format!("{id}.blanking"),
                &format!("Input '{input}' is blanked but not enabled"),
            );
        }
        if target.source.is_external() && enabled.is_empty() {
            self.add_warning(
                &format!("{id}.enable"),
                "External source selected with no inputs enabled; the target will never trigger",
            );
        }
    }

    fn validate_inputs(
        &mut self,
        id: CaptureTargetId,
        field: &str,
        names: &[String],
    ) -> HashSet<TriggerInput> {
        let mut seen = HashSet::new();
        for (i, name) in names.iter().enumerate() {
            let path = format!("{id}.{field}[{i}]");
            match resolve_input(name, id) {
                Ok(input) => {
                    if !seen.insert(input) {
                        self.add_warning(&path, &format!("Input '{input}' listed more than once"));
                    }
                }
                Err(e) => self.add_error(&path, &e.to_string()),
            }
        }
        seen
    }

    fn add_error(&mut self, path: &str, message: &str) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Error,
        });
    }

    fn add_warning(&mut self, path: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Warning,
        });
    }
}
