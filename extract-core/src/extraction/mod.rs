//! The extraction retry loop and its supporting types.
//!
//! - [`ExtractionOrchestrator`] - Async retry loop with corrective re-prompting
//! - [`ExtractionError`] - Typed error enum with attempt history
//! - [`ExtractionMetrics`] - Token and timing metrics
//! - [`ExtractionConfig`] - Retry behavior configuration
//! - [`build_repair_note`] - Corrective note for the next attempt

pub mod config;
pub mod error;
pub mod feedback;
pub mod metrics;
pub mod orchestrator;

pub use config::ExtractionConfig;
pub use error::{
    AttemptOutcome, AttemptRecord, ErrorKind, ExtractionError, ParseError, ParseErrorKind,
};
pub use feedback::{build_repair_note, truncate_chars};
pub use metrics::{estimate_tokens, ExtractionMetrics};
pub use orchestrator::ExtractionOrchestrator;
