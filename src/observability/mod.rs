//! Observability module
//!
//! Logging, metrics, and the structured event stream.

pub mod events;
pub mod logging;
pub mod metrics;

pub use events::{Event, EventEmitter, EventPublisher};
pub use logging::{LogFormat, init_logging};
pub use metrics::init_metrics;
