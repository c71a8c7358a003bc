//! Locates the `llama-cli` binary on the system.

use crate::error::LlamaError;
use std::path::PathBuf;
use which::which;

/// Environment variable that overrides the default `llama-cli` binary path.
pub const LLAMA_BIN_ENV_VAR: &str = "LLAMA_CPP_BIN";

/// Binary name looked up on `PATH`.
pub const LLAMA_BIN_NAME: &str = "llama-cli";

/// Locates the `llama-cli` executable.
///
/// Resolution order:
/// 1. `explicit_path` if provided and the file exists.
/// 2. The path in the `LLAMA_CPP_BIN` environment variable.
/// 3. `llama-cli` resolved via `$PATH`.
/// 4. Common install location fallbacks (platform-specific).
/// 5. Helpful error with install instructions.
///
/// # Errors
///
/// Returns `LlamaError::ExecutableNotFound` when no valid executable can be
/// located.
pub fn discover_llama(explicit_path: Option<PathBuf>) -> Result<PathBuf, LlamaError> {
    // 1. Explicit path
    if let Some(path) = explicit_path {
        if path.exists() {
            return Ok(path);
        }
        return Err(LlamaError::ExecutableNotFound(format!(
            "Explicit path does not exist: {}",
            path.display()
        )));
    }

    // 2. Environment variable
    if let Ok(path_str) = std::env::var(LLAMA_BIN_ENV_VAR) {
        let path = PathBuf::from(path_str);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!(
            event = "discovery_env_ignored",
            var = LLAMA_BIN_ENV_VAR,
            path = %path.display(),
            "discovery_env_ignored: path does not exist"
        );
    }

    // 3. PATH lookup
    if let Ok(path) = which(LLAMA_BIN_NAME) {
        return Ok(path);
    }

    // 4. Common install locations
    for location in fallback_locations() {
        if location.exists() {
            return Ok(location);
        }
    }

    // 5. Helpful error
    Err(LlamaError::ExecutableNotFound(
        "llama-cli not found. Install: brew install llama.cpp, or build from \
         https://github.com/ggml-org/llama.cpp and set LLAMA_CPP_BIN.\n\
         Searched: LLAMA_CPP_BIN, PATH, common install locations."
            .to_string(),
    ))
}

#[cfg(unix)]
fn fallback_locations() -> Vec<PathBuf> {
    let mut locations = Vec::new();
    if let Some(home) = dirs::home_dir() {
        locations.push(home.join(".local/bin/llama-cli"));
        locations.push(home.join("llama.cpp/build/bin/llama-cli"));
    }
    locations.push(PathBuf::from("/usr/local/bin/llama-cli"));
    locations.push(PathBuf::from("/opt/homebrew/bin/llama-cli"));
    locations
}

#[cfg(windows)]
fn fallback_locations() -> Vec<PathBuf> {
    let mut locations = Vec::new();
    if let Some(home) = dirs::home_dir() {
        locations.push(home.join(r"llama.cpp\build\bin\Release\llama-cli.exe"));
    }
    locations.push(PathBuf::from(r"C:\Program Files\llama.cpp\llama-cli.exe"));
    locations
}
