//! harden-rs library
//!
//! Baseline hardening for Debian and Ubuntu servers: package upgrades, UFW,
//! SSH daemon configuration, dotfiles, IPv6, timezone and an optional reboot.
//!
//! # Design Principles
//!
//! - **Idempotent**: running the sequence twice changes nothing the second time
//! - **Ordered**: steps run strictly in declaration order of [`Step`]
//! - **Fail fast**: the first failing step aborts the run
//! - **Testable**: commands go through [`runner::CommandRunner`], files
//!   through [`state::HostPaths`]

pub mod config;
pub mod modules;
pub mod runner;
pub mod sequence;
pub mod state;
pub mod template;

mod error;

pub use error::HardenError;
pub use sequence::Provisioner;

use config::RunConfig;
use serde::{Deserialize, Serialize};

/// Provisioning steps, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Refresh the package index
    RefreshCache,
    /// Install the upgrade helper and run a safe upgrade
    UpgradePackages,
    /// Install the configured package set
    InstallPackages,
    /// Allow the SSH port through UFW (must precede `FirewallEnable`)
    FirewallAllowSsh,
    /// Enable UFW with default-deny inbound
    FirewallEnable,
    /// Render and install sshd_config
    SshdConfig,
    /// Restart and enable the SSH service
    SshService,
    /// Copy dotfiles into the home directory
    Dotfiles,
    /// Disable IPv6 in UFW and grub, regenerate grub config
    DisableIpv6,
    /// Set the system timezone
    Timezone,
    /// Schedule a delayed reboot
    Reboot,
}

impl Step {
    /// Every step, in execution order
    pub const ALL: [Step; 11] = [
        Step::RefreshCache,
        Step::UpgradePackages,
        Step::InstallPackages,
        Step::FirewallAllowSsh,
        Step::FirewallEnable,
        Step::SshdConfig,
        Step::SshService,
        Step::Dotfiles,
        Step::DisableIpv6,
        Step::Timezone,
        Step::Reboot,
    ];

    /// Whether the run configuration lets this step run
    pub fn is_enabled(&self, config: &RunConfig) -> bool {
        match self {
            Step::FirewallAllowSsh | Step::FirewallEnable => config.enable_ufw_firewall,
            Step::SshdConfig => config.update_sshd_config,
            Step::DisableIpv6 => config.disable_ipv6,
            Step::Reboot => config.reboot_box,
            _ => true,
        }
    }

    /// Short human description used by `plan`
    pub fn description(&self) -> &'static str {
        match self {
            Step::RefreshCache => "refresh the apt package index",
            Step::UpgradePackages => "install the upgrade helper and safe-upgrade all packages",
            Step::InstallPackages => "install configured packages at their latest version",
            Step::FirewallAllowSsh => "allow the SSH port through ufw",
            Step::FirewallEnable => "enable ufw: deny incoming, allow outgoing, low logging",
            Step::SshdConfig => "render /etc/ssh/sshd_config from the template",
            Step::SshService => "restart the SSH service and enable it at boot",
            Step::Dotfiles => "copy dotfiles into the home directory",
            Step::DisableIpv6 => "disable IPv6 in ufw and grub, run update-grub",
            Step::Timezone => "set the system timezone",
            Step::Reboot => "schedule a reboot in one minute",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Step::RefreshCache => "refresh_cache",
            Step::UpgradePackages => "upgrade_packages",
            Step::InstallPackages => "install_packages",
            Step::FirewallAllowSsh => "firewall_allow_ssh",
            Step::FirewallEnable => "firewall_enable",
            Step::SshdConfig => "sshd_config",
            Step::SshService => "ssh_service",
            Step::Dotfiles => "dotfiles",
            Step::DisableIpv6 => "disable_ipv6",
            Step::Timezone => "timezone",
            Step::Reboot => "reboot",
        };
        f.pad(name)
    }
}

/// What a step did to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The host was modified
    Changed,
    /// The host was already in the desired state
    Unchanged,
    /// The step is disabled by configuration
    Skipped,
}

impl Outcome {
    pub fn from_changed(changed: bool) -> Self {
        if changed {
            Outcome::Changed
        } else {
            Outcome::Unchanged
        }
    }

    /// Combine the outcomes of two sub-actions of one step
    pub fn merge(self, other: Outcome) -> Outcome {
        match (self, other) {
            (Outcome::Changed, _) | (_, Outcome::Changed) => Outcome::Changed,
            (Outcome::Unchanged, _) | (_, Outcome::Unchanged) => Outcome::Unchanged,
            _ => Outcome::Skipped,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Changed => write!(f, "changed"),
            Outcome::Unchanged => write!(f, "ok"),
            Outcome::Skipped => write!(f, "skipped"),
        }
    }
}
