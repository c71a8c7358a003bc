//! Subprocess adapter for the `llama.cpp` command-line runner (`llama-cli`).
#![warn(clippy::pedantic)]
pub mod cmd;
pub mod discovery;
pub mod error;
pub mod process;
pub mod types;

use tokio::process::Command;

pub use discovery::discover_llama;
pub use error::LlamaError;
pub use process::run_llama;
pub use types::*;

#[derive(Debug, Clone)]
pub struct LlamaCli {
    pub path: std::path::PathBuf,
}

impl LlamaCli {
    pub fn new(path: std::path::PathBuf) -> Self {
        Self { path }
    }

    /// Checks that the binary runs and reports a version.
    ///
    /// Returns the first line of the version banner.
    ///
    /// # Errors
    /// Returns an error if the binary cannot be executed or exits unsuccessfully.
    pub async fn check_health(&self) -> Result<String, LlamaError> {
        let output = Command::new(&self.path).arg("--version").output().await?;

        // llama-cli prints its version banner on stderr.
        let banner = if output.stdout.is_empty() {
            String::from_utf8_lossy(&output.stderr)
        } else {
            String::from_utf8_lossy(&output.stdout)
        };
        let first_line = banner.lines().next().unwrap_or_default().trim().to_string();

        if output.status.success() {
            Ok(first_line)
        } else {
            Err(LlamaError::HealthCheck(format!(
                "{} --version exited with {}: {first_line}",
                self.path.display(),
                output.status
            )))
        }
    }

    pub async fn run(&self, prompt: &Prompt, config: &LlamaConfig) -> Result<RunResult, LlamaError> {
        run_llama(&self.path, prompt, config, None).await
    }

    pub async fn stream(
        &self,
        prompt: &Prompt,
        config: &LlamaConfig,
        sender: tokio::sync::mpsc::Sender<StreamEvent>,
    ) -> Result<RunResult, LlamaError> {
        run_llama(&self.path, prompt, config, Some(sender)).await
    }
}
