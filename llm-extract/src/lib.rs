//! # llm-extract
//!
//! Schema-guided extraction of typed records from local llama.cpp models.
//!
//! Describe the record you want, write a prompt template, and get back a
//! validated record: the prompt is extended with a formatting block, the
//! model's answer is parsed field by field, and malformed answers are
//! retried with a corrective note naming the failing field.
//!
//! ## Example
//!
//! ```no_run
//! # use llm_extract::prelude::*;
//! # async fn example() -> Result<(), llm_extract::Error> {
//! let schema = SchemaDescriptor::builder()
//!     .text("claim", "the assertion the author wants to prove")
//!     .field(FieldSpec::new("stance", FieldKind::one_of(["support", "attack"])))
//!     .build()?;
//! let template = PromptTemplate::new("Analyse the following text:\n{content}");
//! let arguments = Arguments::new().with("content", "Virtual memory made small RAM feel large.");
//!
//! let record = llm_extract::extract(&schema, &template, &arguments, "models/mistral.gguf", 3).await?;
//! println!("{}", record.to_json());
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

/// llama.cpp backend implementation.
pub mod llamacpp;

/// Client configuration.
pub mod config;

/// Public error types.
pub mod errors;

/// Commonly used types and traits.
pub mod prelude;

pub use errors::Error;

use llm_extract_core::prompt::{Arguments, PromptTemplate};
use llm_extract_core::record::ExtractedRecord;
use llm_extract_core::schema::SchemaDescriptor;

/// Extracts a record with an auto-discovered `llama-cli` and the model file
/// at `model_identifier`, making at most `max_attempts` model calls.
///
/// # Errors
///
/// `Error::LlamaNotFound` when no `llama-cli` can be found, otherwise the
/// errors of [`llamacpp::Client::extract`].
pub async fn extract(
    schema: &SchemaDescriptor,
    template: &PromptTemplate,
    arguments: &Arguments,
    model_identifier: &str,
    max_attempts: usize,
) -> Result<ExtractedRecord, Error> {
    let client = llamacpp::Client::new().await?;
    client
        .extract(model_identifier, schema, template, arguments, max_attempts)
        .await
}
