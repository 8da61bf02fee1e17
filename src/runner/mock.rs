//! Mock command runner for testing
//!
//! Records every command it is asked to run and answers from a handler
//! closure, which lets tests simulate apt, ufw or systemctl.

use async_trait::async_trait;
use std::sync::Mutex;

use super::{CommandOutput, CommandRunner, CommandSpec};
use crate::HardenError;

type Handler = Box<dyn Fn(&CommandSpec) -> CommandOutput + Send + Sync>;

/// Mock runner for testing
///
/// # Example
/// ```
/// use harden_rs::runner::mock::MockRunner;
/// use harden_rs::runner::CommandOutput;
///
/// let mock = MockRunner::new().with_handler(|cmd| {
///     if cmd.program == "ufw" {
///         CommandOutput::ok("Status: inactive\n")
///     } else {
///         CommandOutput::ok("")
///     }
/// });
/// ```
pub struct MockRunner {
    calls: Mutex<Vec<CommandSpec>>,
    handler: Handler,
    spawn_error: Option<String>,
}

impl MockRunner {
    /// Create a mock that succeeds with empty output for every command
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            handler: Box::new(|_| CommandOutput::ok("")),
            spawn_error: None,
        }
    }

    /// Answer commands with the given closure
    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&CommandSpec) -> CommandOutput + Send + Sync + 'static,
    {
        self.handler = Box::new(handler);
        self
    }

    /// Fail every command as if the program could not be spawned
    pub fn with_spawn_error(mut self, error: &str) -> Self {
        self.spawn_error = Some(error.to_string());
        self
    }

    /// All commands run so far, in order
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// Command lines run so far, in order
    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(CommandSpec::command_line).collect()
    }

    /// Whether any command line starts with `prefix`
    pub fn ran(&self, prefix: &str) -> bool {
        self.command_lines().iter().any(|l| l.starts_with(prefix))
    }

    /// Index of the first command line starting with `prefix`
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.command_lines().iter().position(|l| l.starts_with(prefix))
    }

    /// Forget recorded calls
    pub fn clear(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, cmd: &CommandSpec) -> Result<CommandOutput, HardenError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(cmd.clone());
        }

        if let Some(error) = &self.spawn_error {
            return Err(HardenError::Command(error.clone()));
        }

        Ok((self.handler)(cmd))
    }
}
