//! Synchronous command execution for process-table and desktop queries.
//!
//! Every call is bounded by a timeout: a hung `lsof` or `osascript` must not
//! stall a poll tick forever. Callers that only observe use [`CommandExecutor::run`],
//! which reduces every failure to empty output.

use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{PulseError, Result};

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);
const WAIT_POLL_STEP: Duration = Duration::from_millis(10);

pub trait CommandExecutor {
    /// Runs `program` with `args` and returns captured stdout.
    ///
    /// Launch failure, non-zero exit and timeout are all errors.
    fn output(&self, program: &str, args: &[&str]) -> Result<String>;

    /// Like [`CommandExecutor::output`], with failures reduced to empty output.
    fn run(&self, program: &str, args: &[&str]) -> String {
        match self.output(program, args) {
            Ok(stdout) => stdout,
            Err(err) => {
                debug!(error = %err, "Command failed; treating output as empty");
                String::new()
            }
        }
    }
}

impl<E: CommandExecutor + ?Sized> CommandExecutor for &E {
    fn output(&self, program: &str, args: &[&str]) -> Result<String> {
        (**self).output(program, args)
    }
}

/// Runs real OS commands with a wall-clock timeout.
#[derive(Debug, Clone)]
pub struct SystemCommand {
    timeout: Duration,
}

impl SystemCommand {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SystemCommand {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

impl CommandExecutor for SystemCommand {
    fn output(&self, program: &str, args: &[&str]) -> Result<String> {
        let command = describe(program, args);
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| PulseError::CommandFailed {
                command: command.clone(),
                details: err.to_string(),
            })?;

        // Drain stdout off-thread so a chatty child cannot block on a full pipe
        // while we wait for it to exit.
        let mut stdout = child.stdout.take().ok_or_else(|| PulseError::CommandFailed {
            command: command.clone(),
            details: "stdout not captured".to_string(),
        })?;
        let reader = thread::spawn(move || {
            let mut buffer = Vec::new();
            let _ = stdout.read_to_end(&mut buffer);
            buffer
        });

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(PulseError::CommandFailed {
                        command,
                        details: format!("timed out after {}ms", self.timeout.as_millis()),
                    });
                }
                Ok(None) => thread::sleep(WAIT_POLL_STEP),
                Err(err) => {
                    let _ = child.kill();
                    return Err(PulseError::CommandFailed {
                        command,
                        details: err.to_string(),
                    });
                }
            }
        };

        let buffer = reader.join().unwrap_or_default();
        if !status.success() {
            return Err(PulseError::CommandFailed {
                command,
                details: format!("exited with {}", status),
            });
        }

        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn describe(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}
