//! Error types for harden-rs

use thiserror::Error;

/// Main error type for harden-rs operations
#[derive(Error, Debug)]
pub enum HardenError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Package repository error: {0}")]
    Repository(String),

    #[error("Package upgrade conflict: {0}")]
    Conflict(String),

    #[error("Package not found in configured repositories: {0}")]
    MissingPackage(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Command execution failed: {0}")]
    Command(String),

    #[error("Step '{step}' failed: {source}")]
    Step {
        step: String,
        #[source]
        source: Box<HardenError>,
    },
}

impl HardenError {
    /// Wrap an error with the name of the step that produced it
    pub fn step(step: impl Into<String>, source: HardenError) -> Self {
        Self::Step {
            step: step.into(),
            source: Box::new(source),
        }
    }

    /// Build a command failure from a program name and its stderr
    pub fn command(program: &str, stderr: &str) -> Self {
        Self::Command(format!("{}: {}", program, stderr.trim()))
    }
}
