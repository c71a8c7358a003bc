use crate::error::LlamaError;
use crate::types::{LlamaConfig, Prompt, RunResult, StreamEvent};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::timeout;

const CHANNEL_CAPACITY: usize = 100;
/// Per-stream output cap.
pub const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024; // 10 MB
/// Time a process gets to exit after SIGTERM before it is killed.
pub const GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Runs `llama-cli` once and collects its output.
///
/// Stdout lines are forwarded to `sender` as [`StreamEvent::Text`] and stderr
/// lines as [`StreamEvent::Log`] while the process runs. Output is capped at
/// [`MAX_OUTPUT_BYTES`] per stream; on timeout the process receives SIGTERM and,
/// after [`GRACE_PERIOD`], SIGKILL.
///
/// # Errors
///
/// `ModelNotFound` before spawning when the configured model file is missing,
/// `SpawnFailed`, `Timeout`, `NonZeroExit` or `OutputTruncated` otherwise.
pub async fn run_llama(
    path: &std::path::Path,
    prompt: &Prompt,
    config: &LlamaConfig,
    sender: Option<mpsc::Sender<StreamEvent>>,
) -> Result<RunResult, LlamaError> {
    if let Some(model) = &config.model {
        if !model.exists() {
            return Err(LlamaError::ModelNotFound(model.clone()));
        }
    }

    let args = crate::cmd::build_args(prompt, config);
    let start_time = Instant::now();

    let mut cmd = Command::new(path);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(cwd) = &config.cwd {
        cmd.current_dir(cwd);
    }

    let mut child = cmd.spawn().map_err(|e| LlamaError::SpawnFailed {
        stage: "spawn subprocess".to_string(),
        source: e,
    })?;

    let stdout = child.stdout.take().ok_or(LlamaError::NoStdout)?;
    let stderr = child.stderr.take().ok_or(LlamaError::NoStderr)?;
    let pid = child.id().ok_or(LlamaError::NoPid)?;

    tracing::debug!(
        event = "llama_spawned",
        pid,
        binary = %path.display(),
        timeout_secs = config.timeout.as_secs(),
        "llama_spawned"
    );

    // Bounded internal channels
    let (stdout_tx, mut stdout_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);
    let (stderr_tx, mut stderr_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);

    let mut join_set = JoinSet::new();

    // Stdout reader task
    let stdout_sender = sender.clone();
    join_set.spawn(async move {
        let mut reader = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = reader.next_line().await {
            if let Some(tx) = &stdout_sender {
                let _ = tx
                    .send(StreamEvent::Text {
                        text: line.clone() + "\n",
                    })
                    .await;
            }
            if stdout_tx.send(line).await.is_err() {
                break;
            }
        }
    });

    // Stderr reader task
    join_set.spawn(async move {
        let mut reader = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = reader.next_line().await {
            if let Some(tx) = &sender {
                let _ = tx.send(StreamEvent::Log { line: line.clone() }).await;
            }
            if stderr_tx.send(line).await.is_err() {
                break;
            }
        }
    });

    let mut stdout_lines = Vec::new();
    let mut stderr_lines = Vec::new();
    let mut stdout_bytes = 0;
    let mut stderr_bytes = 0;

    let execution_result = timeout(config.timeout, async {
        loop {
            tokio::select! {
                Some(line) = stdout_rx.recv() => {
                    push_bounded(&mut stdout_lines, &mut stdout_bytes, line)?;
                }
                Some(line) = stderr_rx.recv() => {
                    push_bounded(&mut stderr_lines, &mut stderr_bytes, line)?;
                }
                status = child.wait() => {
                    let status = status.map_err(|e| LlamaError::SpawnFailed {
                        stage: "wait for child".to_string(),
                        source: e,
                    })?;

                    // Readers hit EOF once the pipes close; collect what they still hold.
                    let mut stdout_open = true;
                    let mut stderr_open = true;
                    while stdout_open || stderr_open {
                        tokio::select! {
                            line = stdout_rx.recv(), if stdout_open => match line {
                                Some(line) => push_bounded(&mut stdout_lines, &mut stdout_bytes, line)?,
                                None => stdout_open = false,
                            },
                            line = stderr_rx.recv(), if stderr_open => match line {
                                Some(line) => push_bounded(&mut stderr_lines, &mut stderr_bytes, line)?,
                                None => stderr_open = false,
                            },
                        }
                    }

                    return Ok::<_, LlamaError>(status);
                }
            }
        }
    })
    .await;

    let status = match execution_result {
        Ok(Ok(status)) => {
            while join_set.join_next().await.is_some() {}
            status
        }
        Ok(Err(error)) => {
            join_set.abort_all();
            let _ = child.start_kill();
            return Err(error);
        }
        Err(_timeout_elapsed) => {
            let elapsed = start_time.elapsed();
            tracing::warn!(
                event = "llama_timeout",
                pid,
                elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                "llama_timeout: sending SIGTERM"
            );
            let _ = graceful_shutdown(&mut child, pid).await;

            join_set.abort_all();
            while join_set.join_next().await.is_some() {}
            drain_stream_bounded(&mut stdout_rx, &mut stdout_lines, &mut stdout_bytes)?;
            drain_stream_bounded(&mut stderr_rx, &mut stderr_lines, &mut stderr_bytes)?;

            return Err(LlamaError::Timeout {
                elapsed,
                pid,
                partial_stdout: stdout_lines.join("\n"),
                partial_stderr: stderr_lines.join("\n"),
            });
        }
    };

    let duration = start_time.elapsed();
    let exit_code = status.code().unwrap_or(-1);
    let stdout = stdout_lines.join("\n");
    let stderr = stderr_lines.join("\n");

    tracing::debug!(
        event = "llama_exited",
        pid,
        exit_code,
        stdout_bytes,
        duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        "llama_exited"
    );

    if exit_code != 0 {
        return Err(LlamaError::NonZeroExit {
            exit_code,
            pid,
            elapsed: duration,
            stdout,
            stderr,
        });
    }

    Ok(RunResult {
        stdout,
        stderr,
        exit_code,
        duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
    })
}

fn push_bounded(lines: &mut Vec<String>, bytes: &mut usize, line: String) -> Result<(), LlamaError> {
    *bytes += line.len();
    if *bytes > MAX_OUTPUT_BYTES {
        return Err(LlamaError::OutputTruncated {
            captured_bytes: *bytes,
            limit_bytes: MAX_OUTPUT_BYTES,
        });
    }
    lines.push(line);
    Ok(())
}

/// Drain remaining lines from channel with bounded memory enforcement
fn drain_stream_bounded(
    rx: &mut mpsc::Receiver<String>,
    lines: &mut Vec<String>,
    bytes: &mut usize,
) -> Result<(), LlamaError> {
    while let Ok(line) = rx.try_recv() {
        push_bounded(lines, bytes, line)?;
    }
    Ok(())
}

/// Graceful shutdown: SIGTERM, wait grace period, then SIGKILL
#[cfg(unix)]
async fn graceful_shutdown(child: &mut tokio::process::Child, pid: u32) -> Result<(), LlamaError> {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    let raw_pid = i32::try_from(pid).map_err(|_| LlamaError::NoPid)?;
    signal::kill(Pid::from_raw(raw_pid), Signal::SIGTERM).map_err(|e| LlamaError::SignalFailed {
        signal: "SIGTERM".to_string(),
        pid,
        source: e,
    })?;

    match timeout(GRACE_PERIOD, child.wait()).await {
        Ok(Ok(_status)) => Ok(()),
        Ok(Err(e)) => Err(LlamaError::SpawnFailed {
            stage: "graceful_shutdown wait".to_string(),
            source: e,
        }),
        Err(_) => {
            tracing::warn!(event = "llama_sigkill", pid, "llama_sigkill: grace period expired");
            force_kill(child).await
        }
    }
}

#[cfg(not(unix))]
async fn graceful_shutdown(child: &mut tokio::process::Child, _pid: u32) -> Result<(), LlamaError> {
    force_kill(child).await
}

async fn force_kill(child: &mut tokio::process::Child) -> Result<(), LlamaError> {
    child.kill().await.map_err(|e| LlamaError::SpawnFailed {
        stage: "SIGKILL".to_string(),
        source: e,
    })?;
    child.wait().await.map_err(|e| LlamaError::SpawnFailed {
        stage: "post-SIGKILL wait".to_string(),
        source: e,
    })?;
    Ok(())
}
