//! llama.cpp backend: a [`Client`] that hands out [`LlamaSession`]s.
//!
//! ## Example
//!
//! ```no_run
//! # use llm_extract::prelude::*;
//! # async fn example() -> Result<(), llm_extract::Error> {
//! let client = llm_extract::llamacpp::Client::new().await?;
//!
//! let schema = SchemaDescriptor::builder()
//!     .text("claim", "the main assertion")
//!     .text("grounds", "evidence for the claim")
//!     .build()?;
//! let template = PromptTemplate::new("Analyse this text:\n{content}");
//! let arguments = Arguments::new().with("content", "Paging lets small memories act large.");
//!
//! let record = client
//!     .extract("models/mistral-7b-instruct.Q4_K_M.gguf", &schema, &template, &arguments, 3)
//!     .await?;
//! println!("{}", record.text("claim").unwrap_or_default());
//! # Ok(())
//! # }
//! ```

use crate::config::ClientConfig;
use crate::errors::Error;
use async_trait::async_trait;
use llamacpp_adapter::{discover_llama, LlamaCli, LlamaConfig, Prompt};
use llm_extract_core::extraction::{ExtractionMetrics, ExtractionOrchestrator};
use llm_extract_core::prompt::{Arguments, PromptTemplate};
use llm_extract_core::record::ExtractedRecord;
use llm_extract_core::schema::SchemaDescriptor;
use llm_extract_core::session::{ModelBackend, ModelError, ModelSession};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// llama.cpp client.
///
/// Wraps a discovered `llama-cli` binary. Acting as a [`ModelBackend`], it
/// acquires one [`LlamaSession`] per model file.
#[derive(Debug, Clone)]
pub struct Client {
    cli: LlamaCli,
    config: ClientConfig,
}

impl Client {
    /// Creates a new client with automatic `llama-cli` discovery.
    ///
    /// Discovers the binary via `LLAMA_CPP_BIN`, PATH and standard
    /// installation locations, performs a health check, and returns a
    /// ready-to-use client.
    ///
    /// # Errors
    ///
    /// Returns `Error::LlamaNotFound` if the binary cannot be found.
    /// Returns `Error::Adapter` if the health check fails.
    pub async fn new() -> Result<Self, Error> {
        Self::from_config(ClientConfig::default()).await
    }

    /// Creates a new client from the given configuration.
    ///
    /// Uses the binary path from `config.binary_path` if provided,
    /// otherwise falls back to auto-discovery.
    ///
    /// # Errors
    ///
    /// Returns `Error::LlamaNotFound` if the binary cannot be found.
    /// Returns `Error::Adapter` if the health check fails.
    pub async fn from_config(config: ClientConfig) -> Result<Self, Error> {
        let path = discover_llama(config.binary_path.clone())
            .map_err(|e| Error::LlamaNotFound(e.to_string()))?;
        let cli = LlamaCli::new(path);
        let version = cli.check_health().await?;
        tracing::debug!(
            event = "llama_discovered",
            binary = %cli.path.display(),
            version = %version,
            "llama_discovered"
        );

        Ok(Self { cli, config })
    }

    /// Access the underlying CLI handle for advanced use cases.
    #[must_use]
    pub const fn cli(&self) -> &LlamaCli {
        &self.cli
    }

    /// Access the client configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Opens a session on the model file at `model`.
    ///
    /// # Errors
    ///
    /// `Error::ModelNotFound` when the file does not exist, `Error::Io` when
    /// the session directory cannot be created.
    pub fn session(&self, model: impl AsRef<Path>) -> Result<LlamaSession, Error> {
        let model = model.as_ref();
        let model = std::fs::canonicalize(model).map_err(|_| Error::ModelNotFound(model.to_path_buf()))?;
        if !model.is_file() {
            return Err(Error::ModelNotFound(model));
        }

        let workdir = tempfile::Builder::new().prefix("llm-extract-").tempdir()?;
        let config = self.config.llama_config(model, workdir.path().to_path_buf());
        tracing::debug!(
            event = "session_opened",
            workdir = %workdir.path().display(),
            "session_opened"
        );

        Ok(LlamaSession {
            cli: self.cli.clone(),
            config,
            workdir,
            prompts: AtomicUsize::new(0),
        })
    }

    /// Extracts a record from `model` with up to `max_attempts` model calls.
    ///
    /// # Errors
    ///
    /// `Error::Extraction` with the failure kind (template, model, exhausted
    /// attempts, ...).
    pub async fn extract(
        &self,
        model: &str,
        schema: &SchemaDescriptor,
        template: &PromptTemplate,
        arguments: &Arguments,
        max_attempts: usize,
    ) -> Result<ExtractedRecord, Error> {
        let (record, _) = self
            .extract_with_metrics(model, schema, template, arguments, max_attempts)
            .await?;
        Ok(record)
    }

    /// Like [`extract`](Self::extract), also returning the call's metrics.
    ///
    /// # Errors
    ///
    /// Same as [`extract`](Self::extract).
    pub async fn extract_with_metrics(
        &self,
        model: &str,
        schema: &SchemaDescriptor,
        template: &PromptTemplate,
        arguments: &Arguments,
        max_attempts: usize,
    ) -> Result<(ExtractedRecord, ExtractionMetrics), Error> {
        let result = ExtractionOrchestrator::new()
            .max_attempts(max_attempts)
            .extract_scoped(self, model, schema, template, arguments)
            .await?;
        Ok(result)
    }

    /// Extracts a `T`, deriving the schema from its [`JsonSchema`] implementation.
    ///
    /// # Errors
    ///
    /// `Error::Extraction` for extraction failures, including `Schema` and
    /// `Deserialize` kinds for types that do not fit the framing convention.
    pub async fn extract_typed<T>(
        &self,
        model: &str,
        template: &PromptTemplate,
        arguments: &Arguments,
        max_attempts: usize,
    ) -> Result<T, Error>
    where
        T: JsonSchema + DeserializeOwned,
    {
        let session = self.session(model)?;
        let (typed, _) = ExtractionOrchestrator::new()
            .max_attempts(max_attempts)
            .extract_typed::<T, _>(&session, template, arguments)
            .await?;
        Ok(typed)
    }
}

#[async_trait]
impl ModelBackend for Client {
    type Session = LlamaSession;

    async fn acquire(&self, model: &str) -> Result<LlamaSession, ModelError> {
        self.session(model).map_err(|e| ModelError::new(e.to_string()))
    }
}

/// A model file bound to a `llama-cli` binary.
///
/// Every completion spawns `llama-cli` once; the prompt is handed over
/// through a file in the session's private directory, which is removed when
/// the session is dropped.
#[derive(Debug)]
pub struct LlamaSession {
    cli: LlamaCli,
    config: LlamaConfig,
    workdir: TempDir,
    prompts: AtomicUsize,
}

impl LlamaSession {
    /// Model file this session runs.
    #[must_use]
    pub fn model(&self) -> Option<&Path> {
        self.config.model.as_deref()
    }

    /// Private working directory (prompt files).
    #[must_use]
    pub fn workdir(&self) -> &Path {
        self.workdir.path()
    }

    async fn run(&self, prompt: &str) -> Result<String, Error> {
        let n = self.prompts.fetch_add(1, Ordering::SeqCst);
        let prompt_file: PathBuf = self.workdir.path().join(format!("prompt-{n}.txt"));
        tokio::fs::write(&prompt_file, prompt).await?;

        let result = self.cli.run(&Prompt::File(prompt_file.clone()), &self.config).await;
        let _ = tokio::fs::remove_file(&prompt_file).await;

        let result = result?;
        tracing::debug!(
            event = "completion_received",
            duration_ms = result.duration_ms,
            chars = result.completion().chars().count(),
            "completion_received"
        );
        Ok(result.completion().to_string())
    }
}

#[async_trait]
impl ModelSession for LlamaSession {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        self.run(prompt).await.map_err(|e| ModelError::new(e.to_string()))
    }
}
