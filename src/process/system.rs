//! [`ProcessRunner`] backed by `tokio::process`.

use std::collections::VecDeque;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStderr, ChildStdout, Command};

use super::{CommandSpec, OutputMode, ProcessError, ProcessOutput, ProcessRunner};

/// Number of stderr lines kept for [`ProcessError::NonZeroExit`].
const STDERR_TAIL_LINES: usize = 20;

/// Runs commands as real child processes with the agent's environment.
///
/// Stderr is always forwarded line by line to the agent's own stderr while
/// the last lines are retained for error reporting. Children are killed if
/// the future driving them is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(
        &self,
        spec: &CommandSpec,
        mode: OutputMode,
    ) -> Result<ProcessOutput, ProcessError> {
        let program = spec.program.clone();
        let io_err = |source| ProcessError::Io {
            program: program.clone(),
            source,
        };

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::inherit())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        match mode {
            OutputMode::Inherit => cmd.stdout(Stdio::inherit()),
            OutputMode::Capture => cmd.stdout(Stdio::piped()),
        };

        tracing::debug!(command = %spec, ?mode, "spawning");
        let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
            program: program.clone(),
            source,
        })?;

        let stderr_task = tokio::spawn(forward_stderr(child.stderr.take()));
        let stdout_task = tokio::spawn(collect_stdout(child.stdout.take()));

        let status = match spec.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(waited) => waited.map_err(io_err)?,
                Err(_) => {
                    let _ = child.kill().await;
                    stderr_task.abort();
                    stdout_task.abort();
                    tracing::warn!(command = %spec, ?limit, "child killed after timeout");
                    return Err(ProcessError::TimeoutExceeded {
                        program,
                        timeout: limit,
                    });
                }
            },
            None => child.wait().await.map_err(io_err)?,
        };

        let stdout = stdout_task
            .await
            .map_err(|e| io_err(std::io::Error::other(e)))?
            .map_err(io_err)?;
        let stderr_tail = stderr_task.await.unwrap_or_default();

        if status.success() {
            Ok(ProcessOutput { stdout })
        } else {
            Err(ProcessError::NonZeroExit {
                program,
                code: status.code(),
                stderr_tail,
            })
        }
    }
}

/// Reads the whole of stdout when it was piped.
async fn collect_stdout(stdout: Option<ChildStdout>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut out) = stdout {
        out.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// Echoes child stderr to ours and returns its last lines.
///
/// Bytes are forwarded unchanged and the pipe is drained to EOF even when
/// a line is not UTF-8 or our own stderr is gone, so the child never sees
/// a closed pipe.
async fn forward_stderr(stderr: Option<ChildStderr>) -> String {
    let Some(stderr) = stderr else {
        return String::new();
    };
    let mut reader = BufReader::new(stderr);
    let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
    let mut sink = tokio::io::stderr();
    let mut sink_ok = true;
    let mut line = Vec::new();

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(error = %e, "stderr pipe read failed");
                break;
            }
        }
        if sink_ok && sink.write_all(&line).await.is_err() {
            sink_ok = false;
        }
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        let text = String::from_utf8_lossy(&line);
        tail.push_back(text.trim_end_matches(['\n', '\r']).to_string());
    }
    if sink_ok {
        let _ = sink.flush().await;
    }

    tail.into_iter().collect::<Vec<_>>().join("\n")
}
