//! Error types for extraction operations with attempt history tracking.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use super::metrics::ExtractionMetrics;
use crate::prompt::RenderedPrompt;
use crate::schema::SchemaError;
use crate::session::ModelError;

/// Classification of every failure an extraction can surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Placeholder/argument mismatch in the prompt template.
    TemplateError,
    /// The model session could not produce output.
    ModelUnavailable,
    /// A field's marker was not found in the response.
    MissingField,
    /// A field value could not be coerced to its kind.
    TypeMismatch,
    /// A value is not one of the enum's allowed values.
    EnumMismatch,
    /// Every attempt failed to parse.
    Exhausted,
    /// The caller cancelled the extraction between attempts.
    Cancelled,
    /// The extraction configuration is unusable.
    InvalidConfig,
    /// The schema could not be built or derived.
    Schema,
    /// A parsed record did not fit the caller's Rust type.
    Deserialize,
}

/// Parse failure category; these are the failures retried with corrective prompting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseErrorKind {
    /// Marker (or closing marker) not found.
    MissingField,
    /// Value could not be coerced.
    TypeMismatch,
    /// Value not among the allowed enum values.
    EnumMismatch,
}

impl From<ParseErrorKind> for ErrorKind {
    fn from(kind: ParseErrorKind) -> Self {
        match kind {
            ParseErrorKind::MissingField => Self::MissingField,
            ParseErrorKind::TypeMismatch => Self::TypeMismatch,
            ParseErrorKind::EnumMismatch => Self::EnumMismatch,
        }
    }
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MissingField => "missing field",
            Self::TypeMismatch => "type mismatch",
            Self::EnumMismatch => "enum mismatch",
        })
    }
}

/// The first field problem found in a model response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at field `{field}` (expected {expected}): {detail}")]
pub struct ParseError {
    /// Failure category.
    pub kind: ParseErrorKind,
    /// Dotted path of the failing field, e.g. `warrant.strength`.
    pub field: String,
    /// Description of the expected kind.
    pub expected: String,
    /// What went wrong, including the offending value where there is one.
    pub detail: String,
    /// Offending raw text, if the field was found.
    pub raw: Option<String>,
}

impl ParseError {
    pub(crate) fn missing(field: String, expected: String, detail: String) -> Self {
        Self {
            kind: ParseErrorKind::MissingField,
            field,
            expected,
            detail,
            raw: None,
        }
    }

    pub(crate) fn mismatch(
        kind: ParseErrorKind,
        field: String,
        expected: String,
        detail: String,
        raw: &str,
    ) -> Self {
        Self {
            kind,
            field,
            expected,
            detail,
            raw: Some(raw.to_string()),
        }
    }
}

/// Outcome of a single attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The response parsed into a record.
    Parsed,
    /// The response failed to parse.
    Failed(ParseError),
}

/// Record of a single extraction attempt, kept for diagnostics.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    /// The attempt number (1-indexed).
    pub attempt_number: usize,
    /// Prompt sent to the model.
    pub rendered_prompt: RenderedPrompt,
    /// Raw model output.
    pub raw_response: String,
    /// Parse outcome.
    pub outcome: AttemptOutcome,
    /// Elapsed time at the end of this attempt.
    pub elapsed: Duration,
}

/// Errors that can occur during extraction operations.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Template references a placeholder with no argument. Never retried.
    #[error("Template error: {detail}")]
    Template {
        /// Placeholder that could not be substituted.
        placeholder: Option<String>,
        /// Human-readable description.
        detail: String,
    },

    /// The model session failed. Never retried by the orchestrator.
    #[error("Model unavailable: {0}")]
    ModelUnavailable(#[source] ModelError),

    /// A single response failed to parse.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Maximum attempts reached without a parseable response.
    #[error("Extraction failed after {attempts} attempts (max: {max_attempts}): {last_error}")]
    Exhausted {
        /// Number of attempts made.
        attempts: usize,
        /// Maximum attempts allowed.
        max_attempts: usize,
        /// Parse failure of the final attempt.
        last_error: ParseError,
        /// History of all attempts.
        history: Vec<AttemptRecord>,
        /// Metrics tracked across all attempts.
        metrics: ExtractionMetrics,
    },

    /// Cancellation was requested before the next model call.
    #[error("Extraction cancelled after {attempts} attempts")]
    Cancelled {
        /// Attempts completed before cancellation.
        attempts: usize,
    },

    /// The extraction configuration is unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Schema build or JSON Schema conversion failed.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// A parsed record could not be deserialized into the requested type.
    #[error("Deserialization to target type failed: {message}")]
    Deserialize {
        /// Deserializer message.
        message: String,
        /// The record as JSON.
        record: serde_json::Value,
    },
}

impl ExtractionError {
    /// Failure classification.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Template { .. } => ErrorKind::TemplateError,
            Self::ModelUnavailable(_) => ErrorKind::ModelUnavailable,
            Self::Parse(e) => e.kind.into(),
            Self::Exhausted { .. } => ErrorKind::Exhausted,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::Schema(_) => ErrorKind::Schema,
            Self::Deserialize { .. } => ErrorKind::Deserialize,
        }
    }

    /// Field the failure refers to, when there is one.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Template { placeholder, .. } => placeholder.as_deref(),
            Self::Parse(e) | Self::Exhausted { last_error: e, .. } => Some(&e.field),
            _ => None,
        }
    }

    /// The parse failure behind this error, for parse and exhaustion errors.
    #[must_use]
    pub const fn parse_error(&self) -> Option<&ParseError> {
        match self {
            Self::Parse(e) | Self::Exhausted { last_error: e, .. } => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enum_failure() -> ParseError {
        ParseError::mismatch(
            ParseErrorKind::EnumMismatch,
            "stance".to_string(),
            "one of: support | attack".to_string(),
            "\"neutral\" is not one of: support, attack".to_string(),
            "neutral",
        )
    }

    #[test]
    fn test_parse_error_display_names_field_and_value() {
        let message = enum_failure().to_string();
        assert!(message.contains("enum mismatch"));
        assert!(message.contains("`stance`"));
        assert!(message.contains("neutral"));
    }

    #[test]
    fn test_kind_and_field() {
        let parse: ExtractionError = enum_failure().into();
        assert_eq!(parse.kind(), ErrorKind::EnumMismatch);
        assert_eq!(parse.field(), Some("stance"));

        let exhausted = ExtractionError::Exhausted {
            attempts: 2,
            max_attempts: 2,
            last_error: enum_failure(),
            history: Vec::new(),
            metrics: ExtractionMetrics::default(),
        };
        assert_eq!(exhausted.kind(), ErrorKind::Exhausted);
        assert_eq!(exhausted.field(), Some("stance"));
        assert!(exhausted.to_string().contains("after 2 attempts"));

        let template = ExtractionError::Template {
            placeholder: Some("content".to_string()),
            detail: "no argument for placeholder {content}".to_string(),
        };
        assert_eq!(template.kind(), ErrorKind::TemplateError);
        assert_eq!(template.field(), Some("content"));

        let model = ExtractionError::ModelUnavailable(ModelError::new("crashed"));
        assert_eq!(model.kind(), ErrorKind::ModelUnavailable);
        assert_eq!(model.field(), None);
    }
}
