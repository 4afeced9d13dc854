//! Child process execution for the encoder and recognizer binaries.
//!
//! Commands are always spawned from an explicit argument vector, never through
//! a shell. stderr is forwarded to the log line by line while the process runs
//! and is also collected for error reporting.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{Result, SubcastError};

/// Options for a single process run
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Human readable name used in log lines
    pub label: String,
    /// Working directory of the child
    pub cwd: Option<PathBuf>,
    /// Kill the child after this long
    pub timeout: Option<Duration>,
}

impl RunOptions {
    pub fn labeled<S: Into<String>>(label: S) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cwd<P: Into<PathBuf>>(mut self, cwd: P) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

/// Captured result of a successful run
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }

    /// Run `program` with `args` and wait for it to exit.
    ///
    /// Fails with `ProcessSpawn` when the binary cannot be launched,
    /// `ProcessFailed` on a non-zero exit and `ProcessTimeout` when the
    /// configured timeout elapses (the child is killed in that case).
    pub async fn run(&self, program: &str, args: &[String], options: RunOptions) -> Result<ProcessOutput> {
        let label = if options.label.is_empty() {
            program.to_string()
        } else {
            options.label.clone()
        };

        info!("{}: {} {}", label, program, args.join(" "));

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &options.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn().map_err(|source| SubcastError::ProcessSpawn {
            program: program.to_string(),
            source,
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let stdout_label = label.clone();
        let stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut stdout) = stdout {
                if let Err(e) = stdout.read_to_end(&mut buf).await {
                    warn!("{}: stdout truncated after {} bytes: {}", stdout_label, buf.len(), e);
                }
            }
            String::from_utf8_lossy(&buf).into_owned()
        });

        let stderr_label = label.clone();
        let stderr_task = tokio::spawn(async move {
            let mut collected = String::new();
            if let Some(stderr) = stderr {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if !line.trim().is_empty() {
                        debug!("{}: {}", stderr_label, line);
                    }
                    collected.push_str(&line);
                    collected.push('\n');
                }
            }
            collected
        });

        let status = match options.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status?,
                Err(_) => {
                    let _ = child.kill().await;
                    stdout_task.abort();
                    stderr_task.abort();
                    return Err(SubcastError::ProcessTimeout {
                        program: program.to_string(),
                        timeout: limit,
                    });
                }
            },
            None => child.wait().await?,
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        if !status.success() {
            return Err(SubcastError::ProcessFailed {
                program: program.to_string(),
                exit_code: status.code(),
                stderr,
            });
        }

        info!("{}: finished", label);

        Ok(ProcessOutput {
            stdout,
            stderr,
            exit_code: status.code().unwrap_or_default(),
        })
    }
}
