//! Run configuration parsing and types
//!
//! Handles parsing of the YAML run configuration consumed by every
//! provisioning step. The configuration is loaded once and is read-only for
//! the whole run.

pub mod loader;
pub mod merge;

pub use loader::{ConfigLoader, load_merged_config};

use crate::HardenError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default location of the base run configuration
pub const DEFAULT_CONFIG_PATH: &str = "/etc/harden/harden.yml";

/// Main run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Packages to install at their latest version
    pub install_packages: Vec<String>,

    /// Open the SSH port and enable UFW with default-deny inbound
    pub enable_ufw_firewall: bool,

    /// TCP port sshd listens on (and the firewall allows)
    pub sshd_port: u16,

    /// Render and install /etc/ssh/sshd_config
    pub update_sshd_config: bool,

    /// Disable IPv6 in UFW and on the kernel command line
    pub disable_ipv6: bool,

    /// Timezone identifier, e.g. `Etc/UTC`
    pub timezone_server: String,

    /// Schedule a reboot at the end of the run
    pub reboot_box: bool,

    /// Helper package installed before the safe upgrade
    pub upgrade_helper: String,

    /// Seconds the apt cache stays valid before it is refreshed again
    pub cache_valid_time: u64,

    /// systemd unit name of the SSH daemon
    pub ssh_service: String,

    /// Custom sshd_config template (built-in template when unset)
    pub sshd_template: Option<PathBuf>,

    /// `PermitRootLogin` value in the rendered sshd_config
    pub permit_root_login: String,

    /// `PasswordAuthentication` value in the rendered sshd_config
    pub password_authentication: bool,

    /// Directory holding replacement dotfiles (built-in files when unset)
    pub dotfiles_source: Option<PathBuf>,

    /// Home directory the dotfiles are copied into
    pub dotfiles_home: PathBuf,

    /// Wall message sent with the scheduled reboot
    pub reboot_message: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            install_packages: Vec::new(),
            enable_ufw_firewall: true,
            sshd_port: 22,
            update_sshd_config: true,
            disable_ipv6: false,
            timezone_server: "Etc/UTC".to_string(),
            reboot_box: false,
            upgrade_helper: "aptitude".to_string(),
            cache_valid_time: 3600,
            ssh_service: "ssh".to_string(),
            sshd_template: None,
            permit_root_login: "prohibit-password".to_string(),
            password_authentication: false,
            dotfiles_source: None,
            dotfiles_home: PathBuf::from("/root"),
            reboot_message: "Rebooting after baseline hardening".to_string(),
        }
    }
}

impl RunConfig {
    /// Parse a run configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml)
    }

    /// Serialize the configuration back to YAML
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Check values the steps rely on
    pub fn validate(&self) -> Result<(), HardenError> {
        if self.sshd_port == 0 {
            return Err(HardenError::Config(
                "sshd_port must be between 1 and 65535".to_string(),
            ));
        }

        if self.timezone_server.trim().is_empty() {
            return Err(HardenError::Config(
                "timezone_server must not be empty".to_string(),
            ));
        }

        for pkg in &self.install_packages {
            if pkg.is_empty() || pkg.chars().any(char::is_whitespace) {
                return Err(HardenError::Config(format!(
                    "invalid package name: {:?}",
                    pkg
                )));
            }
        }

        if self.upgrade_helper.trim().is_empty() {
            return Err(HardenError::Config(
                "upgrade_helper must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Drop duplicate package names, keeping first-seen order
    pub fn dedup_packages(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.install_packages.retain(|pkg| seen.insert(pkg.clone()));
    }
}
