//! External command execution
//!
//! Every step talks to the host through a [`CommandRunner`], so the
//! provisioning sequence can be driven against the real system or against a
//! recording mock in tests.

pub mod mock;

use crate::HardenError;
use async_trait::async_trait;
use std::fmt;
use tracing::debug;

/// A command line to execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    /// Create a command with no arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child process
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// `program arg1 arg2 ...`
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Successful output with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given exit code and stderr
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Trait for executing external commands on the target host
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion and capture its output
    ///
    /// A non-zero exit is not an error at this level; only failure to
    /// spawn the process is.
    async fn run(&self, cmd: &CommandSpec) -> Result<CommandOutput, HardenError>;
}

/// Run a command and turn a non-zero exit into [`HardenError::Command`]
pub async fn run_checked(
    runner: &dyn CommandRunner,
    cmd: &CommandSpec,
) -> Result<CommandOutput, HardenError> {
    let output = runner.run(cmd).await?;
    if !output.success() {
        let detail = if output.stderr.trim().is_empty() {
            output.stdout.as_str()
        } else {
            output.stderr.as_str()
        };
        return Err(HardenError::command(&cmd.command_line(), detail));
    }
    Ok(output)
}

/// Runs commands on the local system via `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, cmd: &CommandSpec) -> Result<CommandOutput, HardenError> {
        debug!("Running command: {}", cmd);

        let output = tokio::process::Command::new(&cmd.program)
            .args(&cmd.args)
            .envs(cmd.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .output()
            .await
            .map_err(|e| HardenError::Command(format!("{}: {}", cmd.program, e)))?;

        let result = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !result.stdout.is_empty() {
            tracing::trace!("stdout: {}", result.stdout);
        }

        Ok(result)
    }
}
