//! Common imports for llm-extract usage.
//!
//! ```
//! use llm_extract::prelude::*;
//! ```
//!
//! Re-exports the client, its configuration and error type, and the core
//! types needed to describe schemas, write templates and read records.

pub use crate::config::ClientConfig;
pub use crate::errors::Error;
pub use crate::llamacpp::{Client as LlamaClient, LlamaSession};

pub use llm_extract_core::prelude::*;
