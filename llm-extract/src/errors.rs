//! Public error types for llm-extract.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when extracting through the llama.cpp backend.
///
/// Adapter and extraction errors are wrapped with their full error chain
/// preserved; the variants raised by the facade itself carry actionable
/// messages.
#[derive(Debug, Error)]
pub enum Error {
    /// `llama-cli` not found on the system.
    #[error("llama-cli not found ({0}). Install llama.cpp or set LLAMA_CPP_BIN")]
    LlamaNotFound(String),

    /// The model file does not exist.
    #[error("Model file not found: {}", .0.display())]
    ModelNotFound(PathBuf),

    /// Extraction failed; see [`ExtractionError::kind`](llm_extract_core::extraction::ExtractionError::kind).
    #[error(transparent)]
    Extraction(#[from] llm_extract_core::extraction::ExtractionError),

    /// Schema could not be built or converted.
    #[error(transparent)]
    Schema(#[from] llm_extract_core::schema::SchemaError),

    /// Error from the `llama-cli` subprocess adapter.
    #[error("llama-cli failed: {0}")]
    Adapter(#[from] llamacpp_adapter::LlamaError),

    /// Configuration error (invalid settings or options).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Reading inputs or writing output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON input could not be parsed, or output could not be written.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
