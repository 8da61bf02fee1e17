//! Run configuration loader
//!
//! Loads and merges the base configuration file and its drop-in directory.

use super::{RunConfig, merge};
use crate::HardenError;
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Load and merge the base config and the drop-ins next to it
///
/// For `/etc/harden/harden.yml` the drop-in directory is
/// `/etc/harden/harden.d`.
pub async fn load_merged_config(path: impl AsRef<Path>) -> Result<RunConfig, HardenError> {
    ConfigLoader::new(path.as_ref()).load().await
}

/// Drop-in directory belonging to a base config file
pub fn dropin_dir(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "harden".to_string());
    path.with_file_name(format!("{}.d", stem))
}

/// Load a single YAML document, `None` if the file does not exist
async fn load_document(path: &Path) -> Result<Option<Value>, HardenError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path).await?;
    if content.trim().is_empty() {
        return Ok(Some(Value::Null));
    }

    serde_yaml::from_str(&content)
        .map(Some)
        .map_err(|e| HardenError::Config(format!("failed to parse {}: {}", path.display(), e)))
}

/// Load all drop-in documents from a directory (sorted alphabetically)
async fn load_dropin_documents(dir: &Path) -> Result<Vec<Value>, HardenError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    let mut read_dir = fs::read_dir(dir).await?;
    while let Some(entry) = read_dir.next_entry().await? {
        let path = entry.path();
        if path
            .extension()
            .is_some_and(|e| e == "yml" || e == "yaml")
        {
            entries.push(path);
        }
    }

    entries.sort();

    let mut docs = Vec::new();
    for path in entries {
        if let Some(doc) = load_document(&path).await? {
            debug!("Loaded drop-in config from {}", path.display());
            docs.push(doc);
        }
    }

    info!("Loaded {} drop-in configs", docs.len());
    Ok(docs)
}

/// Configuration loader builder for more control
pub struct ConfigLoader {
    path: PathBuf,
    include_dropins: bool,
    overlays: Vec<String>,
}

impl ConfigLoader {
    /// Create a loader for the given base config file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            include_dropins: true,
            overlays: Vec::new(),
        }
    }

    /// Skip loading drop-in configs
    pub fn skip_dropins(mut self) -> Self {
        self.include_dropins = false;
        self
    }

    /// Merge an extra YAML document on top of the files (highest priority)
    pub fn with_overlay(mut self, yaml: impl Into<String>) -> Self {
        self.overlays.push(yaml.into());
        self
    }

    /// Load, merge and validate all configs
    pub async fn load(self) -> Result<RunConfig, HardenError> {
        let mut docs = Vec::new();

        match load_document(&self.path).await? {
            Some(doc) => {
                debug!("Loaded base config from {}", self.path.display());
                docs.push(doc);
            }
            None => info!(
                "No config at {}, using defaults",
                self.path.display()
            ),
        }

        if self.include_dropins {
            docs.extend(load_dropin_documents(&dropin_dir(&self.path)).await?);
        }

        for overlay in &self.overlays {
            let doc: Value = serde_yaml::from_str(overlay)
                .map_err(|e| HardenError::Config(format!("invalid overlay: {}", e)))?;
            docs.push(doc);
        }

        let mut config = merge::config_from_value(merge::merge_documents(&docs))
            .map_err(|e| HardenError::Config(e.to_string()))?;
        config.dedup_packages();
        config.validate()?;
        Ok(config)
    }
}
