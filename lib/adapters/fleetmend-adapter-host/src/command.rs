use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use fleetmend_ports::ActuatorReport;

use crate::error::ActuatorError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);
const MAX_OUTPUT_CHARS: usize = 400;

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Trimmed stderr, or stdout when stderr is empty.
    pub fn summary(&self) -> String {
        let text = if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        };
        text.chars().take(MAX_OUTPUT_CHARS).collect()
    }
}

/// Runs host commands with a hard deadline. The child is killed when the
/// deadline passes.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    timeout: Duration,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl CommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs `program` and returns its output whatever the exit status.
    pub async fn output(&self, program: &str, args: &[&str]) -> Result<CommandOutput, ActuatorError> {
        tracing::debug!(program, ?args, "running host command");
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                return Err(ActuatorError::TimedOut {
                    program: program.to_string(),
                    after: self.timeout,
                });
            }
        };

        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Like [`output`](Self::output) but a nonzero exit is an error.
    pub async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, ActuatorError> {
        let output = self.output(program, args).await?;
        if output.success {
            Ok(output)
        } else {
            Err(ActuatorError::CommandFailed {
                program: program.to_string(),
                code: output.code,
                output: output.summary(),
            })
        }
    }

    /// Exit status only. Spawn failures and timeouts count as `false`.
    pub async fn succeeds(&self, program: &str, args: &[&str]) -> bool {
        match self.output(program, args).await {
            Ok(output) => output.success,
            Err(e) => {
                tracing::debug!(program, "host command did not complete: {}", e);
                false
            }
        }
    }

    /// Runs a fix and folds every failure mode into a report.
    pub async fn report(&self, what: &str, program: &str, args: &[&str]) -> ActuatorReport {
        match self.run(program, args).await {
            Ok(output) => {
                let detail = output.summary();
                if detail.is_empty() {
                    ActuatorReport::ok(format!("{what} ok"))
                } else {
                    ActuatorReport::ok(format!("{what} ok: {detail}"))
                }
            }
            Err(e) => ActuatorReport::failed(format!("{what} failed: {e}")),
        }
    }
}

/// True when `program` resolves to a file on `PATH`.
pub fn on_path(program: &str) -> bool {
    let Some(paths) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&paths).any(|dir| {
        let candidate = dir.join(program);
        candidate.is_file() || candidate.with_extension("exe").is_file()
    })
}
