//! Configuration loader
//!
//! Pipeline:
//! 1. Size check
//! 2. Environment variable expansion (pre-parse, on raw text)
//! 3. YAML parsing
//! 4. Validation
//! 5. Resolution into [`LoadedConfig`]

use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

use crate::config::schema::{LoadedConfig, TargetConfig, TriggerConfig};
use crate::config::validation::{Validator, resolve_input};
use crate::error::{ConfigError, Severity, ValidationIssue};
use crate::trigger::{CaptureTargetId, TargetSettings, TriggerInput, TriggerSettings};

// ============================================================================
// Public API
// ============================================================================

/// Limits applied while loading.
#[derive(Debug, Clone)]
pub struct ConfigLimits {
    /// Maximum configuration file size in bytes.
    pub max_config_size: usize,
}

impl Default for ConfigLimits {
    fn default() -> Self {
        Self {
            max_config_size: env_or("TMBF_TRIGGER_MAX_CONFIG_SIZE", 1024 * 1024),
        }
    }
}

/// Result of loading a configuration file.
#[derive(Debug)]
pub struct LoadResult {
    /// The validated configuration.
    pub config: LoadedConfig,

    /// Warnings encountered during loading.
    pub warnings: Vec<LoadWarning>,
}

/// Warning during configuration loading.
#[derive(Debug, Clone)]
pub struct LoadWarning {
    /// Warning message.
    pub message: String,

    /// Location where the warning occurred.
    pub location: Option<String>,
}

/// Configuration loader.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    limits: ConfigLimits,
}

impl ConfigLoader {
    /// Creates a loader with the given limits.
    #[must_use]
    pub const fn new(limits: ConfigLimits) -> Self {
        Self { limits }
    }

    /// Loads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read or exceeds the size limit
    /// - Environment expansion or YAML parsing fails
    /// - Validation reports any error
    pub fn load(&self, path: &Path) -> Result<LoadResult, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        let file_size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        if file_size > self.limits.max_config_size {
            return Err(ConfigError::InvalidValue {
                field: "file_size".to_string(),
                value: format!("{file_size} bytes"),
                expected: format!("at most {} bytes", self.limits.max_config_size),
            });
        }

        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;
        self.load_str(&raw, path)
    }

    /// Loads and validates configuration text; `path` is used for messages.
    ///
    /// An empty document yields the default configuration.
    ///
    /// # Errors
    ///
    /// Same as [`Self::load`], minus the file checks.
    pub fn load_str(&self, raw: &str, path: &Path) -> Result<LoadResult, ConfigError> {
        let mut warnings = Vec::new();
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);

        let mut env_sub = EnvSubstitution::new();
        let substituted = env_sub.substitute(raw, path)?;
        warnings.extend(env_sub.warnings);

        let config: TriggerConfig = if substituted.trim().is_empty() {
            TriggerConfig::default()
        } else {
            serde_yaml::from_str::<Option<TriggerConfig>>(&substituted)
                .map_err(|e| ConfigError::ParseError {
                    path: path.to_path_buf(),
                    line: e.location().map(|l| l.line()),
                    message: e.to_string(),
                })?
                .unwrap_or_default()
        };

        let result = Validator::new().validate(&config);
        if result.has_errors() {
            return Err(ConfigError::ValidationError {
                path: path.display().to_string(),
                errors: result.errors,
            });
        }
        warnings.extend(result.warnings.into_iter().map(|issue| LoadWarning {
            message: issue.message,
            location: Some(issue.path),
        }));

        Ok(LoadResult {
            config: resolve(&config, path)?,
            warnings,
        })
    }
}

/// Converts a validated document into orchestrator settings.
fn resolve(config: &TriggerConfig, path: &Path) -> Result<LoadedConfig, ConfigError> {
    let invalid = |field: &str, message: String| ConfigError::ValidationError {
        path: path.display().to_string(),
        errors: vec![ValidationIssue {
            path: field.to_owned(),
            message,
            severity: Severity::Error,
        }],
    };

    let interval = humantime::parse_duration(config.monitor.interval.trim())
        .map_err(|e| invalid("monitor.interval", e.to_string()))?;
    let input_poll_ticks = NonZeroU32::new(config.monitor.input_poll_ticks)
        .ok_or_else(|| invalid("monitor.input_poll_ticks", "Must be at least 1".into()))?;

    Ok(LoadedConfig {
        interval,
        input_poll_ticks,
        settings: TriggerSettings {
            synchronise: config.synchronise,
            ddr: resolve_target(CaptureTargetId::Ddr, &config.ddr)?,
            buf: resolve_target(CaptureTargetId::Buf, &config.buf)?,
            sequencer: config.sequencer,
            blanking: config.blanking,
        },
    })
}

fn resolve_target(id: CaptureTargetId, target: &TargetConfig) -> Result<TargetSettings, ConfigError> {
    let inputs = |names: &[String]| -> Result<Vec<TriggerInput>, ConfigError> {
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            let input = resolve_input(name, id)?;
            if !out.contains(&input) {
                out.push(input);
            }
        }
        Ok(out)
    };
    Ok(TargetSettings {
        source: target.source,
        auto_rearm: target.auto_rearm,
        delay: target.delay,
        enable: inputs(&target.enable)?,
        blanking: inputs(&target.blanking)?,
    })
}

// ============================================================================
// Environment Variable Substitution
// ============================================================================

/// Pre-parse environment variable substitution.
///
/// Runs on raw YAML text before parsing so substituted values keep YAML
/// type inference.
struct EnvSubstitution {
    warnings: Vec<LoadWarning>,
}

impl EnvSubstitution {
    const fn new() -> Self {
        Self {
            warnings: Vec::new(),
        }
    }

    /// Supports `${VAR}` (empty with a warning if unset), `${VAR:-default}`
    /// and `$$` for a literal `$`.
    fn substitute(&mut self, raw_yaml: &str, source_path: &Path) -> Result<String, ConfigError> {
        let mut result = String::with_capacity(raw_yaml.len());
        let mut chars = raw_yaml.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '$' {
                result.push(c);
                continue;
            }
            match chars.peek() {
                Some('$') => {
                    chars.next();
                    result.push('$');
                }
                Some('{') => {
                    chars.next();
                    let (var_name, default) = Self::parse_var_spec(&mut chars, source_path)?;
                    match (std::env::var(&var_name), default) {
                        (Ok(value), _) => result.push_str(&value),
                        (Err(_), Some(default)) => result.push_str(&default),
                        (Err(_), None) => self.warnings.push(LoadWarning {
                            message: format!(
                                "Environment variable '{var_name}' is not set, using empty string"
                            ),
                            location: Some(source_path.display().to_string()),
                        }),
                    }
                }
                _ => result.push(c),
            }
        }

        Ok(result)
    }

    /// Parses `NAME}` or `NAME:-default}` after the opening `${`.
    fn parse_var_spec(
        chars: &mut std::iter::Peekable<std::str::Chars>,
        source_path: &Path,
    ) -> Result<(String, Option<String>), ConfigError> {
        let mut var_name = String::new();
        while let Some(c) = chars.next() {
            match c {
                '}' => return Ok((var_name, None)),
                ':' if chars.peek() == Some(&'-') => {
                    chars.next();
                    let mut default = String::new();
                    for c in chars.by_ref() {
                        if c == '}' {
                            return Ok((var_name, Some(default)));
                        }
                        default.push(c);
                    }
                    break;
                }
                _ => var_name.push(c),
            }
        }

        Err(ConfigError::ParseError {
            path: source_path.to_path_buf(),
            line: None,
            message: format!("Unclosed environment variable reference: ${{{var_name}"),
        })
    }
}

/// Parses an environment variable with a default value.
fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Resolves the configuration path from an explicit flag or the default
/// environment variable.
#[must_use]
pub fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os("TMBF_TRIGGER_CONFIG").map(PathBuf::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn env_substitution_simple() {
        let mut sub = EnvSubstitution::new();
        let result = sub.substitute("path: ${PATH}", Path::new("t.yaml")).unwrap();
        assert!(!result.contains("${PATH}"));
        assert!(result.len() > "path: ".len());
    }

    #[test]
    fn env_substitution_default() {
        let mut sub = EnvSubstitution::new();
        let result = sub
            .substitute("delay: ${TMBF_TRIGGER_TEST_UNSET_XYZ123:-42}", Path::new("t.yaml"))
            .unwrap();
        assert_eq!(result, "delay: 42");
    }

    #[test]
    fn env_substitution_escaped_dollar() {
        let mut sub = EnvSubstitution::new();
        let result = sub.substitute("a: $$b", Path::new("t.yaml")).unwrap();
        assert_eq!(result, "a: $b");
    }

    #[test]
    fn env_substitution_missing_warns() {
        let mut sub = EnvSubstitution::new();
        let result = sub
            .substitute("a: ${TMBF_TRIGGER_TEST_WARN_XYZ123}", Path::new("t.yaml"))
            .unwrap();
        assert_eq!(result, "a: ");
        assert_eq!(sub.warnings.len(), 1);
    }

    #[test]
    fn env_substitution_unclosed_is_error() {
        let mut sub = EnvSubstitution::new();
        assert!(matches!(
            sub.substitute("a: ${OOPS", Path::new("t.yaml")),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn empty_document_is_default() {
        let result = ConfigLoader::default().load_str("", Path::new("t.yaml")).unwrap();
        assert_eq!(result.config, LoadedConfig::default());
    }

    #[test]
    fn load_str_resolves_settings() {
        let yaml = "\
monitor:
  interval: 20ms
  input_poll_ticks: 10
ddr:
  source: external
  enable: [ext, PM, ext]
";
        let result = ConfigLoader::default().load_str(yaml, Path::new("t.yaml")).unwrap();
        let config = result.config;
        assert_eq!(config.interval, Duration::from_millis(20));
        assert_eq!(config.input_poll_ticks.get(), 10);
        assert_eq!(
            config.settings.ddr.enable,
            vec![TriggerInput::External, TriggerInput::Postmortem]
        );
        // duplicate "ext" reported but not fatal
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn unknown_field_is_parse_error() {
        let err = ConfigLoader::default()
            .load_str("ddr:\n  sources: [ext]\n", Path::new("t.yaml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }
}
