//! Client configuration for the llama.cpp backend.

use llamacpp_adapter::LlamaConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a llama.cpp [`Client`](crate::llamacpp::Client).
///
/// Shared by every session the client acquires: each session runs
/// `llama-cli` with these generation settings against its own model.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Override `llama-cli` binary location (None = auto-discover).
    ///
    /// When set to `Some(path)`, the client will use the specified binary
    /// instead of searching `LLAMA_CPP_BIN`, PATH and standard installation
    /// locations.
    pub binary_path: Option<PathBuf>,

    /// Maximum execution time of one completion.
    ///
    /// Default: 300 seconds (5 minutes)
    pub timeout: Duration,

    /// Maximum tokens generated per completion.
    pub max_tokens: Option<u32>,

    /// Context window size.
    pub context_size: Option<u32>,

    /// Sampling temperature.
    pub temperature: Option<f32>,

    /// RNG seed, for reproducible runs.
    pub seed: Option<u64>,

    /// CPU threads used for generation.
    pub threads: Option<u32>,

    /// Layers offloaded to the GPU.
    pub gpu_layers: Option<u32>,

    /// Extra raw `llama-cli` arguments.
    pub extra_args: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            binary_path: None,
            timeout: Duration::from_secs(300),
            max_tokens: None,
            context_size: None,
            temperature: None,
            seed: None,
            threads: None,
            gpu_layers: None,
            extra_args: Vec::new(),
        }
    }
}

impl ClientConfig {
    /// Create a new `ClientConfig` with default settings.
    ///
    /// Equivalent to `ClientConfig::default()`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the `llama-cli` binary at `path`.
    #[must_use]
    pub fn with_binary_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary_path = Some(path.into());
        self
    }

    /// Set the per-completion timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Cap the tokens generated per completion.
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the sampling temperature.
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the context window size.
    #[must_use]
    pub const fn with_context_size(mut self, context_size: u32) -> Self {
        self.context_size = Some(context_size);
        self
    }

    pub(crate) fn llama_config(&self, model: PathBuf, workdir: PathBuf) -> LlamaConfig {
        LlamaConfig {
            model: Some(model),
            max_tokens: self.max_tokens,
            context_size: self.context_size,
            temperature: self.temperature,
            seed: self.seed,
            threads: self.threads,
            gpu_layers: self.gpu_layers,
            extra_args: self.extra_args.clone(),
            timeout: self.timeout,
            cwd: Some(workdir),
        }
    }
}
