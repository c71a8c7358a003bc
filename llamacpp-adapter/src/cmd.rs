//! Command-line argument construction for the `llama-cli` binary.

use crate::types::{LlamaConfig, Prompt};
use std::ffi::OsString;

/// Builds the argument list for a `llama-cli` subprocess invocation.
///
/// Runs are single-shot completions: conversation mode is disabled and the
/// prompt is not echoed back on stdout.
#[must_use]
pub fn build_args(prompt: &Prompt, config: &LlamaConfig) -> Vec<OsString> {
    let mut args = Vec::new();

    if let Some(ref model) = config.model {
        args.push(OsString::from("-m"));
        args.push(OsString::from(model));
    }

    match prompt {
        Prompt::Text(text) => {
            args.push(OsString::from("-p"));
            args.push(OsString::from(text));
        }
        Prompt::File(path) => {
            args.push(OsString::from("-f"));
            args.push(OsString::from(path));
        }
    }

    if let Some(n) = config.max_tokens {
        args.push(OsString::from("-n"));
        args.push(OsString::from(n.to_string()));
    }

    if let Some(ctx) = config.context_size {
        args.push(OsString::from("-c"));
        args.push(OsString::from(ctx.to_string()));
    }

    if let Some(temp) = config.temperature {
        args.push(OsString::from("--temp"));
        args.push(OsString::from(temp.to_string()));
    }

    if let Some(seed) = config.seed {
        args.push(OsString::from("-s"));
        args.push(OsString::from(seed.to_string()));
    }

    if let Some(threads) = config.threads {
        args.push(OsString::from("-t"));
        args.push(OsString::from(threads.to_string()));
    }

    if let Some(layers) = config.gpu_layers {
        args.push(OsString::from("-ngl"));
        args.push(OsString::from(layers.to_string()));
    }

    args.push(OsString::from("-no-cnv"));
    args.push(OsString::from("--no-display-prompt"));

    args.extend(config.extra_args.iter().map(OsString::from));

    args
}
