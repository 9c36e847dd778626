//! Configuration module
//!
//! Loading and validation of the YAML trigger configuration: monitor
//! pacing plus the persistable trigger settings.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigLimits, ConfigLoader, LoadResult, LoadWarning, config_path};
pub use schema::*;
pub use validation::{ValidationResult, Validator, resolve_input};
