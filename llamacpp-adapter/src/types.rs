//! Configuration and result types for `llama-cli` runs.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Marker `llama-cli` prints after the last generated token.
pub const END_OF_TEXT: &str = "[end of text]";

/// Options for a single `llama-cli` invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlamaConfig {
    /// Model weights (GGUF file), passed as `-m`.
    pub model: Option<PathBuf>,
    /// Maximum tokens to generate (`-n`).
    pub max_tokens: Option<u32>,
    /// Context window size (`-c`).
    pub context_size: Option<u32>,
    /// Sampling temperature (`--temp`).
    pub temperature: Option<f32>,
    /// RNG seed (`-s`).
    pub seed: Option<u64>,
    /// CPU threads (`-t`).
    pub threads: Option<u32>,
    /// Layers offloaded to the GPU (`-ngl`).
    pub gpu_layers: Option<u32>,
    /// Additional raw arguments appended after the generated ones.
    pub extra_args: Vec<String>,
    /// Wall-clock limit for the whole run.
    pub timeout: Duration,
    /// Working directory of the subprocess.
    pub cwd: Option<PathBuf>,
}

impl Default for LlamaConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: None,
            context_size: None,
            temperature: None,
            seed: None,
            threads: None,
            gpu_layers: None,
            extra_args: Vec::new(),
            timeout: Duration::from_secs(300),
            cwd: None,
        }
    }
}

/// How the prompt reaches `llama-cli`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    /// Passed inline with `-p`.
    Text(String),
    /// Read by `llama-cli` from a file with `-f`.
    File(PathBuf),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration_ms: u64,
}

impl RunResult {
    /// Generated text: stdout without the end-of-text marker, trimmed.
    #[must_use]
    pub fn completion(&self) -> &str {
        let text = self.stdout.trim_end();
        text.strip_suffix(END_OF_TEXT).unwrap_or(text).trim()
    }
}

/// Events streamed from a running `llama-cli`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StreamEvent {
    /// A line of generated text.
    Text {
        /// The text content.
        text: String,
    },
    /// A diagnostic line from stderr (model loading, timings).
    Log {
        /// The log line.
        line: String,
    },
}
