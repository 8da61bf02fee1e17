//! Simulated host for sequence-level tests
//!
//! `FakeHost` answers the commands the provisioning steps issue (apt-get,
//! aptitude, ufw, systemctl, timedatectl, update-grub, shutdown) and keeps
//! enough state for a second run to see the effects of the first.

#![allow(dead_code)]

use harden_rs::runner::mock::MockRunner;
use harden_rs::runner::{CommandOutput, CommandSpec};
use harden_rs::state::HostPaths;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tempfile::TempDir;

pub const ORIGINAL_SSHD: &str = "Port 22\nPermitRootLogin yes\nPasswordAuthentication yes\n";
pub const ORIGINAL_UFW: &str = "IPV6=yes\nDEFAULT_INPUT_POLICY=\"DROP\"\n";
pub const ORIGINAL_GRUB: &str =
    "GRUB_DEFAULT=0\nGRUB_CMDLINE_LINUX_DEFAULT=\"quiet splash\"\nGRUB_CMDLINE_LINUX=\"\"\n";

#[derive(Debug)]
pub struct HostState {
    pub installed: BTreeSet<String>,
    pub unknown_packages: BTreeSet<String>,
    pub pending_upgrades: u32,
    pub ufw_active: bool,
    pub ufw_incoming: String,
    pub ufw_outgoing: String,
    pub ufw_logging: String,
    /// (to, comment)
    pub ufw_rules: Vec<(String, String)>,
    pub ssh_enabled: bool,
    pub ssh_restarts: u32,
    pub timezone: String,
    pub grub_updates: u32,
    pub reboots_scheduled: u32,
}

impl Default for HostState {
    fn default() -> Self {
        Self {
            installed: BTreeSet::new(),
            unknown_packages: BTreeSet::new(),
            pending_upgrades: 3,
            ufw_active: false,
            ufw_incoming: "allow".to_string(),
            ufw_outgoing: "allow".to_string(),
            ufw_logging: "off".to_string(),
            ufw_rules: Vec::new(),
            ssh_enabled: false,
            ssh_restarts: 0,
            timezone: "Etc/UTC".to_string(),
            grub_updates: 0,
            reboots_scheduled: 0,
        }
    }
}

#[derive(Debug, Default)]
pub struct FakeHost {
    state: Mutex<HostState>,
}

impl FakeHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn state(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap()
    }

    /// A mock runner whose commands act on this host
    pub fn runner(self: &Arc<Self>) -> MockRunner {
        let host = Arc::clone(self);
        MockRunner::new().with_handler(move |cmd| host.handle(cmd))
    }

    pub fn handle(&self, cmd: &CommandSpec) -> CommandOutput {
        let args: Vec<&str> = cmd.args.iter().map(String::as_str).collect();
        let mut state = self.state();

        match cmd.program.as_str() {
            "apt-get" => apt_get(&mut state, &args),
            "aptitude" => {
                let n = state.pending_upgrades;
                state.pending_upgrades = 0;
                if n == 0 {
                    CommandOutput::ok("No packages will be installed, upgraded, or removed.\n")
                } else {
                    CommandOutput::ok(format!(
                        "{} packages upgraded, 0 newly installed, 0 to remove and 0 not upgraded.\n",
                        n
                    ))
                }
            }
            "ufw" => ufw(&mut state, &args),
            "systemctl" => match args.as_slice() {
                ["is-enabled", _] if state.ssh_enabled => CommandOutput::ok("enabled\n"),
                ["is-enabled", _] => CommandOutput::failed(1, "disabled\n"),
                ["restart", _] => {
                    state.ssh_restarts += 1;
                    CommandOutput::ok("")
                }
                ["enable", _] => {
                    state.ssh_enabled = true;
                    CommandOutput::ok("")
                }
                _ => CommandOutput::failed(1, "unknown systemctl call"),
            },
            "timedatectl" => match args.as_slice() {
                ["show", ..] => CommandOutput::ok(format!("{}\n", state.timezone)),
                ["set-timezone", zone] => {
                    state.timezone = zone.to_string();
                    CommandOutput::ok("")
                }
                _ => CommandOutput::failed(1, "unknown timedatectl call"),
            },
            "update-grub" => {
                state.grub_updates += 1;
                CommandOutput::ok("Generating grub configuration file ...\ndone\n")
            }
            "shutdown" => {
                state.reboots_scheduled += 1;
                CommandOutput::ok("")
            }
            "chown" => CommandOutput::ok(""),
            other => CommandOutput::failed(127, format!("{}: command not found", other)),
        }
    }
}

fn apt_get(state: &mut HostState, args: &[&str]) -> CommandOutput {
    if args.contains(&"update") {
        return CommandOutput::ok("Reading package lists... Done\n");
    }

    let Some(pos) = args.iter().position(|a| *a == "install") else {
        return CommandOutput::failed(100, "E: Invalid operation");
    };
    let packages = &args[pos + 1..];

    if let Some(missing) = packages
        .iter()
        .find(|p| state.unknown_packages.contains(**p))
    {
        return CommandOutput::failed(100, format!("E: Unable to locate package {}\n", missing));
    }

    let mut new = 0;
    for pkg in packages {
        if state.installed.insert(pkg.to_string()) {
            new += 1;
        }
    }

    CommandOutput::ok(format!(
        "Reading package lists... Done\n0 upgraded, {} newly installed, 0 to remove and 0 not upgraded.\n",
        new
    ))
}

fn ufw(state: &mut HostState, args: &[&str]) -> CommandOutput {
    match args {
        ["status", "verbose"] => CommandOutput::ok(render_status(state)),
        ["show", "added"] => {
            let mut out =
                String::from("Added user rules (see 'ufw status' for running firewall):\n");
            if state.ufw_rules.is_empty() {
                out.push_str("(None)\n");
            }
            for (to, comment) in &state.ufw_rules {
                out.push_str(&format!("ufw allow {} comment '{}'\n", to, comment));
            }
            CommandOutput::ok(out)
        }
        ["allow", to, "comment", comment] => {
            if state.ufw_rules.iter().any(|(t, _)| t.as_str() == *to) {
                CommandOutput::ok("Skipping adding existing rule\nSkipping adding existing rule (v6)\n")
            } else {
                state.ufw_rules.push((to.to_string(), comment.to_string()));
                CommandOutput::ok("Rules updated\nRules updated (v6)\n")
            }
        }
        ["default", policy, direction] => {
            match *direction {
                "incoming" => state.ufw_incoming = policy.to_string(),
                "outgoing" => state.ufw_outgoing = policy.to_string(),
                _ => return CommandOutput::failed(1, "ERROR: Invalid direction"),
            }
            CommandOutput::ok("")
        }
        ["logging", level] => {
            state.ufw_logging = format!("on ({})", level);
            CommandOutput::ok("Logging enabled\n")
        }
        ["--force", "enable"] => {
            state.ufw_active = true;
            CommandOutput::ok("Firewall is active and enabled on system startup\n")
        }
        _ => CommandOutput::failed(1, "ERROR: Invalid syntax"),
    }
}

fn render_status(state: &HostState) -> String {
    if !state.ufw_active {
        return "Status: inactive\n".to_string();
    }

    let mut out = format!(
        "Status: active\nLogging: {}\nDefault: {} (incoming), {} (outgoing), disabled (routed)\nNew profiles: skip\n",
        state.ufw_logging, state.ufw_incoming, state.ufw_outgoing
    );

    if !state.ufw_rules.is_empty() {
        out.push_str("\nTo                         Action      From\n");
        out.push_str("--                         ------      ----\n");
        for (to, comment) in &state.ufw_rules {
            out.push_str(&format!(
                "{:<27}{:<12}{:<27}# {}\n",
                to, "ALLOW IN", "Anywhere", comment
            ));
        }
        for (to, comment) in &state.ufw_rules {
            out.push_str(&format!(
                "{:<27}{:<12}{:<27}# {}\n",
                format!("{} (v6)", to),
                "ALLOW IN",
                "Anywhere (v6)",
                comment
            ));
        }
    }

    out
}

/// Temporary host root with the files the steps edit
pub struct HostRoot {
    pub temp: TempDir,
    pub paths: HostPaths,
}

impl HostRoot {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let paths = HostPaths::with_root(temp.path());

        std::fs::create_dir_all(temp.path().join("etc/ssh")).unwrap();
        std::fs::create_dir_all(temp.path().join("etc/default")).unwrap();
        std::fs::write(paths.sshd_config(), ORIGINAL_SSHD).unwrap();
        std::fs::write(paths.ufw_defaults(), ORIGINAL_UFW).unwrap();
        std::fs::write(paths.grub_defaults(), ORIGINAL_GRUB).unwrap();

        for zone in ["Etc/UTC", "Europe/Berlin"] {
            let file = paths.zoneinfo(zone);
            std::fs::create_dir_all(file.parent().unwrap()).unwrap();
            std::fs::write(file, "TZif2").unwrap();
        }

        Self { temp, paths }
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Backup files (`*~`) next to the edited configuration
    pub fn backups(&self) -> Vec<PathBuf> {
        let mut found = Vec::new();
        for dir in ["etc/ssh", "etc/default", "root"] {
            let Ok(entries) = std::fs::read_dir(self.path().join(dir)) else {
                continue;
            };
            for entry in entries.flatten() {
                if entry.file_name().to_string_lossy().ends_with('~') {
                    found.push(entry.path());
                }
            }
        }
        found.sort();
        found
    }

    /// Backups of one file, by file name prefix
    pub fn backups_of(&self, name: &str) -> Vec<PathBuf> {
        self.backups()
            .into_iter()
            .filter(|p| {
                p.file_name()
                    .is_some_and(|n| n.to_string_lossy().starts_with(&format!("{}.", name)))
            })
            .collect()
    }
}
