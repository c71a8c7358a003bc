//! Command-line front end: extract a record from a document with a local model.

use clap::Parser;
use llm_extract::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

/// Extract a typed record from a document with a local llama.cpp model.
///
/// The record is printed to stdout as pretty JSON; logs go to stderr
/// (filter with RUST_LOG).
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON Schema file describing the record (an object with `properties`)
    #[arg(long)]
    schema: PathBuf,

    /// Prompt template file; `{content}` receives the input document
    #[arg(long)]
    template: PathBuf,

    /// Optional system preamble template file
    #[arg(long)]
    system: Option<PathBuf>,

    /// Document bound to `{content}` ("-" reads stdin)
    #[arg(long)]
    input: Option<PathBuf>,

    /// GGUF model file
    #[arg(long, env = "LLM_EXTRACT_MODEL")]
    model: String,

    /// Extra template argument, `key=value` (repeatable)
    #[arg(long = "arg", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    args: Vec<(String, String)>,

    /// Maximum model calls before giving up
    #[arg(long, default_value_t = 3)]
    max_attempts: usize,

    /// Path to the llama-cli binary
    #[arg(long, env = "LLAMA_CPP_BIN")]
    llama_bin: Option<PathBuf>,

    /// Per-completion timeout in seconds
    #[arg(long, default_value_t = 300)]
    timeout_secs: u64,

    /// Maximum tokens generated per completion
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Sampling temperature
    #[arg(long)]
    temperature: Option<f32>,

    /// Context window size
    #[arg(long)]
    context_size: Option<u32>,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {s:?}"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in {s:?}"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let schema: serde_json::Value = serde_json::from_str(&read_file(&cli.schema).await?)?;
    let schema = SchemaDescriptor::from_json_schema(&schema)?;

    let mut template = PromptTemplate::new(read_file(&cli.template).await?);
    if let Some(system) = &cli.system {
        template = template.with_system(read_file(system).await?);
    }

    let mut arguments: Arguments = cli.args.iter().cloned().collect();
    if let Some(input) = &cli.input {
        arguments.insert("content", read_input(input).await?);
    }

    let mut config = ClientConfig::new().with_timeout(Duration::from_secs(cli.timeout_secs));
    config.binary_path = cli.llama_bin.clone();
    config.max_tokens = cli.max_tokens;
    config.temperature = cli.temperature;
    config.context_size = cli.context_size;

    let client = LlamaClient::from_config(config).await?;
    tracing::info!(
        event = "extraction_started",
        model = %cli.model,
        fields = schema.len(),
        max_attempts = cli.max_attempts,
        "extraction_started"
    );

    let (record, metrics) = client
        .extract_with_metrics(&cli.model, &schema, &template, &arguments, cli.max_attempts)
        .await?;
    tracing::info!(
        event = "extraction_finished",
        attempts = metrics.total_attempts,
        wall_ms = u64::try_from(metrics.wall_time.as_millis()).unwrap_or(u64::MAX),
        input_tokens = metrics.estimated_input_tokens,
        output_tokens = metrics.estimated_output_tokens,
        "extraction_finished"
    );

    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

async fn read_file(path: &Path) -> Result<String, Error> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))
}

async fn read_input(path: &Path) -> Result<String, Error> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        tokio::io::stdin().read_to_string(&mut text).await?;
        return Ok(text);
    }
    read_file(path).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("audience=engineers").unwrap(),
            ("audience".to_string(), "engineers".to_string())
        );
        assert_eq!(
            parse_key_val("expr=a=b").unwrap(),
            ("expr".to_string(), "a=b".to_string())
        );
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=x").is_err());
    }

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::try_parse_from([
            "llm-extract",
            "--schema",
            "s.json",
            "--template",
            "t.txt",
            "--input",
            "-",
            "--model",
            "m.gguf",
            "--arg",
            "tone=formal",
            "--arg",
            "lang=en",
            "--max-attempts",
            "5",
            "--max-tokens",
            "256",
        ])
        .unwrap();

        assert_eq!(cli.model, "m.gguf");
        assert_eq!(cli.max_attempts, 5);
        assert_eq!(cli.timeout_secs, 300);
        assert_eq!(cli.max_tokens, Some(256));
        assert_eq!(cli.args.len(), 2);
        assert_eq!(cli.input, Some(PathBuf::from("-")));
    }
}
