//! Standard host paths
//!
//! Every file the provisioning steps touch is resolved through [`HostPaths`],
//! which prefixes the fixed system paths with a root directory. The root is
//! `/` on a real run and a temporary directory in tests.

use std::path::{Path, PathBuf};

/// Default filesystem root
pub const ROOT_DIR: &str = "/";

/// Standard host paths
#[derive(Debug, Clone)]
pub struct HostPaths {
    /// Filesystem root (default: /)
    pub root: PathBuf,
}

impl Default for HostPaths {
    fn default() -> Self {
        Self::new()
    }
}

impl HostPaths {
    /// Create with the real filesystem root
    pub fn new() -> Self {
        Self {
            root: PathBuf::from(ROOT_DIR),
        }
    }

    /// Create with a custom root (useful for testing)
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Resolve an absolute host path under the root
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        let relative = path.strip_prefix("/").unwrap_or(path);
        self.root.join(relative)
    }

    // ==================== Edited Configuration ====================

    /// /etc/ssh/sshd_config
    pub fn sshd_config(&self) -> PathBuf {
        self.resolve("/etc/ssh/sshd_config")
    }

    /// /etc/default/ufw
    pub fn ufw_defaults(&self) -> PathBuf {
        self.resolve("/etc/default/ufw")
    }

    /// /etc/default/grub
    pub fn grub_defaults(&self) -> PathBuf {
        self.resolve("/etc/default/grub")
    }

    // ==================== Timezone ====================

    /// /usr/share/zoneinfo
    pub fn zoneinfo_dir(&self) -> PathBuf {
        self.resolve("/usr/share/zoneinfo")
    }

    /// /usr/share/zoneinfo/<zone>
    pub fn zoneinfo(&self, timezone: &str) -> PathBuf {
        self.zoneinfo_dir().join(timezone)
    }

    /// /etc/timezone
    pub fn etc_timezone(&self) -> PathBuf {
        self.resolve("/etc/timezone")
    }

    /// /etc/localtime
    pub fn localtime(&self) -> PathBuf {
        self.resolve("/etc/localtime")
    }

    // ==================== Package Cache ====================

    /// /var/lib/apt/periodic/update-success-stamp
    pub fn apt_update_stamp(&self) -> PathBuf {
        self.resolve("/var/lib/apt/periodic/update-success-stamp")
    }

    // ==================== Run State ====================

    /// /var/lib/harden - run state directory
    pub fn state_dir(&self) -> PathBuf {
        self.resolve("/var/lib/harden")
    }

    /// /var/lib/harden/last-run.json - report of the most recent run
    pub fn last_run(&self) -> PathBuf {
        self.state_dir().join("last-run.json")
    }
}
