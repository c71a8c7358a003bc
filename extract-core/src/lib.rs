//! Schema-guided extraction of typed records from local language model output.
//!
//! A caller describes the record it wants as a [`SchemaDescriptor`], writes a
//! prompt template, and hands both to an [`ExtractionOrchestrator`] together
//! with a [`ModelSession`]. The orchestrator renders the prompt with a
//! formatting block (see [`framing`]), parses the model's answer into an
//! [`ExtractedRecord`] and re-prompts with a corrective note when the answer
//! does not fit the schema.
//!
//! [`SchemaDescriptor`]: schema::SchemaDescriptor
//! [`ExtractionOrchestrator`]: extraction::ExtractionOrchestrator
//! [`ModelSession`]: session::ModelSession
//! [`ExtractedRecord`]: record::ExtractedRecord

pub mod cancel;
pub mod extraction;
pub mod framing;
mod json_schema;
pub mod parser;
pub mod prompt;
pub mod record;
pub mod schema;
pub mod session;

/// Common traits and types for ergonomic usage of the extraction core.
pub mod prelude {
    pub use crate::cancel::CancellationToken;
    pub use crate::extraction::{
        ErrorKind, ExtractionConfig, ExtractionError, ExtractionMetrics, ExtractionOrchestrator,
        ParseError,
    };
    pub use crate::prompt::{Arguments, PromptTemplate, RenderedPrompt};
    pub use crate::record::{ExtractedRecord, FieldValue};
    pub use crate::schema::{FieldKind, FieldSpec, SchemaDescriptor, SchemaError};
    pub use crate::session::{FnSession, ModelBackend, ModelError, ModelSession};
}
