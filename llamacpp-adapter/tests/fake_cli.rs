//! Process-level tests against fake `llama-cli` shell scripts.
#![cfg(unix)]

use llamacpp_adapter::{run_llama, LlamaCli, LlamaConfig, LlamaError, Prompt, StreamEvent};
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

/// Writes an executable shell script named `llama-cli` into `dir`.
fn fake_llama(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("llama-cli");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[tokio::test]
async fn test_successful_run_collects_stdout() {
    let dir = TempDir::new().unwrap();
    let bin = fake_llama(
        &dir,
        r#"echo "llama_model_loader: loaded meta data" >&2
echo "[[claim]] fake claim"
echo "[end of text]""#,
    );

    let result = LlamaCli::new(bin)
        .run(&Prompt::Text("hi".to_string()), &LlamaConfig::default())
        .await
        .unwrap();

    assert_eq!(result.exit_code, 0);
    assert_eq!(result.completion(), "[[claim]] fake claim");
    assert!(result.stderr.contains("llama_model_loader"));
}

#[tokio::test]
async fn test_prompt_file_is_passed_with_f() {
    let dir = TempDir::new().unwrap();
    let bin = fake_llama(&dir, r#"if [ "$1" = "-f" ]; then cat "$2"; else echo "no file"; fi"#);
    let prompt_path = dir.path().join("prompt.txt");
    std::fs::write(&prompt_path, "[[answer]] from file\n").unwrap();

    let result = run_llama(&bin, &Prompt::File(prompt_path), &LlamaConfig::default(), None)
        .await
        .unwrap();

    assert_eq!(result.completion(), "[[answer]] from file");
}

#[tokio::test]
async fn test_non_zero_exit() {
    let dir = TempDir::new().unwrap();
    let bin = fake_llama(&dir, "echo 'failed to load model' >&2\nexit 3");

    let err = run_llama(&bin, &Prompt::Text("hi".to_string()), &LlamaConfig::default(), None)
        .await
        .unwrap_err();

    match err {
        LlamaError::NonZeroExit {
            exit_code, stderr, ..
        } => {
            assert_eq!(exit_code, 3);
            assert!(stderr.contains("failed to load model"));
        }
        other => panic!("expected NonZeroExit, got {other:?}"),
    }
}

#[tokio::test]
async fn test_timeout_terminates_process() {
    let dir = TempDir::new().unwrap();
    let bin = fake_llama(&dir, "echo started\nexec sleep 30");

    let config = LlamaConfig {
        timeout: Duration::from_millis(300),
        ..LlamaConfig::default()
    };
    let started = std::time::Instant::now();
    let err = run_llama(&bin, &Prompt::Text("hi".to_string()), &config, None)
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(10));
    match err {
        LlamaError::Timeout { elapsed, pid, .. } => {
            assert!(elapsed >= Duration::from_millis(300));
            assert!(pid > 0);
        }
        other => panic!("expected Timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_model_fails_before_spawn() {
    let dir = TempDir::new().unwrap();
    let marker = dir.path().join("spawned");
    let bin = fake_llama(&dir, &format!("touch {}", marker.display()));

    let config = LlamaConfig {
        model: Some(dir.path().join("missing.gguf")),
        ..LlamaConfig::default()
    };
    let err = run_llama(&bin, &Prompt::Text("hi".to_string()), &config, None)
        .await
        .unwrap_err();

    assert!(matches!(err, LlamaError::ModelNotFound(_)));
    assert!(!marker.exists());
}

#[tokio::test]
async fn test_stream_forwards_lines() {
    let dir = TempDir::new().unwrap();
    let bin = fake_llama(&dir, "echo one\necho two\necho loading >&2");
    let (tx, mut rx) = tokio::sync::mpsc::channel(16);

    LlamaCli::new(bin)
        .stream(&Prompt::Text("hi".to_string()), &LlamaConfig::default(), tx)
        .await
        .unwrap();

    let mut text = String::new();
    let mut logs = Vec::new();
    while let Ok(event) = rx.try_recv() {
        match event {
            StreamEvent::Text { text: chunk } => text.push_str(&chunk),
            StreamEvent::Log { line } => logs.push(line),
        }
    }
    assert_eq!(text, "one\ntwo\n");
    assert_eq!(logs, ["loading"]);
}

#[tokio::test]
async fn test_check_health_reads_version_banner() {
    let dir = TempDir::new().unwrap();
    let bin = fake_llama(&dir, "echo 'version: 4589 (abc123)' >&2");

    let banner = LlamaCli::new(bin).check_health().await.unwrap();
    assert_eq!(banner, "version: 4589 (abc123)");
}
