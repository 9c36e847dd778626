//! `validate` command handler

use serde_json::json;

use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::config::ConfigLoader;
use crate::error::{ConfigError, Severity, TriggerError, ValidationIssue};

/// Validates configuration files without running.
///
/// Every file is checked before the first failure is returned.
///
/// # Errors
///
/// Returns the first failing file's error; with `--strict`, warnings fail
/// validation too.
pub fn run(args: &ValidateArgs) -> Result<(), TriggerError> {
    let loader = ConfigLoader::default();
    let mut first_error = None;

    for path in &args.files {
        tracing::info!(file = %path.display(), "validating configuration");
        let result = loader.load(path).and_then(|loaded| {
            if args.strict && !loaded.warnings.is_empty() {
                return Err(ConfigError::ValidationError {
                    path: path.display().to_string(),
                    errors: loaded
                        .warnings
                        .into_iter()
                        .map(|w| ValidationIssue {
                            path: w.location.unwrap_or_default(),
                            message: w.message,
                            severity: Severity::Warning,
                        })
                        .collect(),
                });
            }
            Ok(loaded)
        });

        match (&result, args.format) {
            (Ok(loaded), OutputFormat::Human) => {
                for warning in &loaded.warnings {
                    eprintln!(
                        "{}: warning: {} at {}",
                        path.display(),
                        warning.message,
                        warning.location.as_deref().unwrap_or("<unknown>")
                    );
                }
                println!("{}: ok", path.display());
            }
            (Ok(loaded), OutputFormat::Json) => {
                let warnings: Vec<_> = loaded
                    .warnings
                    .iter()
                    .map(|w| json!({ "path": w.location, "message": w.message }))
                    .collect();
                println!(
                    "{}",
                    json!({ "file": path.display().to_string(), "valid": true, "warnings": warnings })
                );
            }
            (Err(e), OutputFormat::Human) => {
                eprintln!("{}: {e}", path.display());
                if let ConfigError::ValidationError { errors, .. } = e {
                    for issue in errors {
                        eprintln!("  {issue}");
                    }
                }
            }
            (Err(e), OutputFormat::Json) => {
                let issues: Vec<_> = match e {
                    ConfigError::ValidationError { errors, .. } => errors
                        .iter()
                        .map(|i| json!({ "path": i.path, "message": i.message }))
                        .collect(),
                    other => vec![json!({ "path": null, "message": other.to_string() })],
                };
                println!(
                    "{}",
                    json!({ "file": path.display().to_string(), "valid": false, "errors": issues })
                );
            }
        }

        if let Err(e) = result {
            first_error.get_or_insert(e);
        }
    }

    first_error.map_or(Ok(()), |e| Err(e.into()))
}
