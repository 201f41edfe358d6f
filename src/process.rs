//! External process supervision
//!
//! Runs the flash and backup scripts, forwarding their output line by line as
//! it is produced and turning their exit status into a [`Result`].

use crate::error::{Error, Result};
use crate::types::{Event, OutputStream};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{broadcast, mpsc};

/// Number of output lines kept for error reports
pub const TAIL_LINES: usize = 40;

/// What to run
#[derive(Clone, Debug)]
pub struct ProcessSpec {
    /// Label used in logs and events (e.g. "shallow_flash")
    pub label: String,
    /// Executable
    pub program: PathBuf,
    /// Arguments, passed without a shell
    pub args: Vec<String>,
    /// Working directory
    pub cwd: Option<PathBuf>,
    /// Extra environment variables
    pub env: HashMap<String, String>,
}

impl ProcessSpec {
    /// Spec for `program` labelled `label`, with no arguments
    pub fn new(label: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: HashMap::new(),
        }
    }

    /// Append arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Add an environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Command line for display
    pub fn command_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// How a supervised process ended
#[must_use]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Exit code (None when terminated by a signal)
    pub code: Option<i32>,
    /// Most recent output lines, oldest first
    pub tail: Vec<String>,
}

impl ProcessOutcome {
    /// Whether the process exited with code 0
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs external processes and streams their output
#[derive(Clone)]
pub struct Supervisor {
    event_tx: broadcast::Sender<Event>,
    output_tx: Option<mpsc::UnboundedSender<Event>>,
}

impl Supervisor {
    /// Create a supervisor publishing output lines on `event_tx`
    pub fn new(event_tx: broadcast::Sender<Event>) -> Self {
        Self {
            event_tx,
            output_tx: None,
        }
    }

    /// Also deliver every output line on `output_tx`
    ///
    /// The broadcast channel drops lines for slow subscribers; this one does not.
    pub fn set_output(&mut self, output_tx: mpsc::UnboundedSender<Event>) {
        self.output_tx = Some(output_tx);
    }

    /// Run a process to completion
    ///
    /// Stdout and stderr are read concurrently; each line is logged and
    /// published as [`Event::ToolOutput`] as soon as it arrives.
    ///
    /// # Errors
    ///
    /// - [`Error::ExternalTool`] if the process cannot be spawned or waited on
    /// - [`Error::ProcessFailed`] if it exits with anything but code 0
    pub async fn run(&self, spec: &ProcessSpec) -> Result<ProcessOutcome> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }

        tracing::info!(tool = %spec.label, command = %spec.command_line(), "starting");
        let mut child = command.spawn().map_err(|e| {
            Error::ExternalTool(format!(
                "Failed to execute {}: {}",
                spec.program.display(),
                e
            ))
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::ExternalTool("Failed to capture stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::ExternalTool("Failed to capture stderr".to_string()))?;

        let mut stdout_lines = BufReader::new(stdout).lines();
        let mut stderr_lines = BufReader::new(stderr).lines();
        let mut stdout_closed = false;
        let mut stderr_closed = false;
        let mut tail = VecDeque::with_capacity(TAIL_LINES);

        while !(stdout_closed && stderr_closed) {
            tokio::select! {
                line = stdout_lines.next_line(), if !stdout_closed => match line {
                    Ok(Some(line)) => self.forward(spec, OutputStream::Stdout, line, &mut tail),
                    Ok(None) => stdout_closed = true,
                    Err(e) => {
                        tracing::warn!(tool = %spec.label, error = %e, "stdout read error");
                        stdout_closed = true;
                    }
                },
                line = stderr_lines.next_line(), if !stderr_closed => match line {
                    Ok(Some(line)) => self.forward(spec, OutputStream::Stderr, line, &mut tail),
                    Ok(None) => stderr_closed = true,
                    Err(e) => {
                        tracing::warn!(tool = %spec.label, error = %e, "stderr read error");
                        stderr_closed = true;
                    }
                },
            }
        }

        let status = child.wait().await.map_err(|e| {
            Error::ExternalTool(format!("Failed to wait for {}: {}", spec.label, e))
        })?;
        let outcome = ProcessOutcome {
            code: status.code(),
            tail: tail.into_iter().collect(),
        };

        if outcome.success() {
            tracing::info!(tool = %spec.label, "finished");
            Ok(outcome)
        } else {
            tracing::warn!(tool = %spec.label, code = ?outcome.code, "failed");
            Err(Error::ProcessFailed {
                tool: spec.label.clone(),
                code: outcome.code,
                tail: outcome.tail,
            })
        }
    }

    fn forward(
        &self,
        spec: &ProcessSpec,
        stream: OutputStream,
        line: String,
        tail: &mut VecDeque<String>,
    ) {
        match stream {
            OutputStream::Stdout => tracing::debug!(tool = %spec.label, "{}", line),
            OutputStream::Stderr => tracing::debug!(tool = %spec.label, stderr = true, "{}", line),
        }
        if tail.len() == TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line.clone());
        let event = Event::ToolOutput {
            tool: spec.label.clone(),
            stream,
            line,
        };
        if let Some(tx) = &self.output_tx {
            tx.send(event.clone()).ok();
        }
        // no subscribers is fine
        self.event_tx.send(event).ok();
    }
}
