//! Run state for harden-rs
//!
//! Tracks what each provisioning step did during a run and persists the
//! report under /var/lib/harden so `harden-rs status` can show the last run.

pub mod paths;

pub use paths::HostPaths;

use crate::{HardenError, Outcome, Step};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// Result of a single step within a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: Step,
    pub outcome: Outcome,
}

/// Step that aborted the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFailure {
    pub step: Step,
    pub error: String,
}

/// Report of a provisioning run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Unix timestamp when the run started
    pub started_at: u64,
    /// Unix timestamp when the run ended (0 while running)
    pub finished_at: u64,
    /// Completed steps in execution order
    pub steps: Vec<StepRecord>,
    /// The step that failed, if any
    pub failed: Option<StepFailure>,
}

impl RunReport {
    /// Start a new, empty report
    pub fn start() -> Self {
        Self {
            started_at: unix_timestamp(),
            ..Default::default()
        }
    }

    /// Record a completed step
    pub fn record(&mut self, step: Step, outcome: Outcome) {
        self.steps.push(StepRecord { step, outcome });
    }

    /// Record the step that aborted the run
    pub fn record_failure(&mut self, step: Step, error: &HardenError) {
        self.failed = Some(StepFailure {
            step,
            error: error.to_string(),
        });
    }

    /// Mark the run as finished
    pub fn finish(&mut self) {
        self.finished_at = unix_timestamp();
    }

    /// Outcome of a step, if it ran
    pub fn outcome_of(&self, step: Step) -> Option<Outcome> {
        self.steps
            .iter()
            .find(|r| r.step == step)
            .map(|r| r.outcome)
    }

    /// Position of a step in the execution trace
    pub fn position_of(&self, step: Step) -> Option<usize> {
        self.steps.iter().position(|r| r.step == step)
    }

    fn count(&self, outcome: Outcome) -> usize {
        self.steps.iter().filter(|r| r.outcome == outcome).count()
    }

    pub fn changed_count(&self) -> usize {
        self.count(Outcome::Changed)
    }

    pub fn skipped_count(&self) -> usize {
        self.count(Outcome::Skipped)
    }

    /// Steps that ran, changed or not
    pub fn ok_count(&self) -> usize {
        self.count(Outcome::Changed) + self.count(Outcome::Unchanged)
    }

    pub fn succeeded(&self) -> bool {
        self.failed.is_none()
    }

    /// One-line recap, e.g. `ok=9 changed=2 skipped=2 failed=0`
    pub fn summary(&self) -> String {
        format!(
            "ok={} changed={} skipped={} failed={}",
            self.ok_count(),
            self.changed_count(),
            self.skipped_count(),
            usize::from(self.failed.is_some())
        )
    }

    /// Write the report as JSON, creating parent directories
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), HardenError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).await?;
        debug!("Wrote run report to {}", path.display());
        Ok(())
    }

    /// Load a previously saved report, `None` if there is none
    pub async fn load(path: impl AsRef<Path>) -> Result<Option<Self>, HardenError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path).await?;
        Ok(Some(serde_json::from_str(&content)?))
    }
}

/// Seconds since the Unix epoch (lightweight, no chrono dependency)
pub fn unix_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
