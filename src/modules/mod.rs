//! Provisioning modules
//!
//! Each module handles one aspect of the baseline hardening. Modules are
//! executed in a fixed order by the provisioning sequence.

pub mod dotfiles;
pub mod files;
pub mod firewall;
pub mod ipv6;
pub mod packages;
pub mod reboot;
pub mod sshd;
pub mod timezone;
