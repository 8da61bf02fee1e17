//! Package management module
//!
//! Refreshes the apt cache, performs a safe upgrade and installs packages at
//! their latest version. Change detection reads the package manager's own
//! `N upgraded, M newly installed, R to remove` summary.

use crate::runner::{CommandOutput, CommandRunner, CommandSpec};
use crate::state::HostPaths;
use crate::{HardenError, Outcome};
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info};

static SUMMARY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(\d+) (?:packages )?upgraded, (\d+) newly installed, (\d+) to remove")
        .expect("static regex")
});

static MISSING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)(?:Unable to locate package (\S+)|Package '?([^'\s]+)'? has no installation candidate)")
        .expect("static regex")
});

/// Counts from an apt-get/aptitude run summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AptSummary {
    pub upgraded: u32,
    pub newly_installed: u32,
    pub removed: u32,
}

impl AptSummary {
    pub fn changed(&self) -> bool {
        self.upgraded + self.newly_installed + self.removed > 0
    }
}

/// Parse the summary line apt-get and aptitude print after a transaction
pub fn parse_apt_summary(stdout: &str) -> Option<AptSummary> {
    let caps = SUMMARY_RE.captures(stdout)?;
    let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
    Some(AptSummary {
        upgraded: num(1),
        newly_installed: num(2),
        removed: num(3),
    })
}

/// Name of the first package apt could not find
pub fn missing_package(stderr: &str) -> Option<String> {
    let caps = MISSING_RE.captures(stderr)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_string())
}

fn outcome_of(output: &CommandOutput) -> Outcome {
    match parse_apt_summary(&output.stdout) {
        Some(summary) => {
            debug!("apt summary: {:?}", summary);
            if summary.changed() {
                Outcome::Changed
            } else {
                Outcome::Unchanged
            }
        }
        // aptitude prints no summary when there is nothing to do
        None => Outcome::Unchanged,
    }
}

/// apt front-end in non-interactive mode with untranslated output
fn apt(program: &str) -> CommandSpec {
    CommandSpec::new(program)
        .env("DEBIAN_FRONTEND", "noninteractive")
        .env("LC_ALL", "C")
}

fn apt_get() -> CommandSpec {
    apt("apt-get")
        .args(["-y", "-o", "Dpkg::Options::=--force-confold"])
}

async fn cache_is_fresh(paths: &HostPaths, valid_for: u64) -> bool {
    if valid_for == 0 {
        return false;
    }

    let Ok(meta) = fs::metadata(paths.apt_update_stamp()).await else {
        return false;
    };

    meta.modified()
        .ok()
        .and_then(|m| m.elapsed().ok())
        .is_some_and(|age| age < Duration::from_secs(valid_for))
}

/// Refresh the package index unless it was refreshed recently
pub async fn refresh_cache(
    runner: &dyn CommandRunner,
    paths: &HostPaths,
    cache_valid_time: u64,
) -> Result<Outcome, HardenError> {
    if cache_is_fresh(paths, cache_valid_time).await {
        info!(
            "Package cache younger than {}s, not refreshing",
            cache_valid_time
        );
        return Ok(Outcome::Unchanged);
    }

    info!("Updating package cache using apt-get");
    let output = runner
        .run(&apt("apt-get").arg("update"))
        .await?;

    if !output.success() {
        return Err(HardenError::Repository(output.stderr.trim().to_string()));
    }

    let stamp = paths.apt_update_stamp();
    if let Some(parent) = stamp.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(&stamp, b"").await?;

    Ok(Outcome::Changed)
}

/// Install the helper at its latest version, then run a safe upgrade
///
/// A safe upgrade never removes installed packages; upgrades that would
/// need removals are held back.
pub async fn upgrade_packages(
    runner: &dyn CommandRunner,
    helper: &str,
) -> Result<Outcome, HardenError> {
    let helper_outcome = install_packages(runner, &[helper.to_string()]).await?;

    info!("Running safe upgrade using aptitude");
    let output = runner
        .run(&apt("aptitude")
            .args(["-y", "-o", "Dpkg::Options::=--force-confold", "safe-upgrade"]))
        .await?;

    if !output.success() {
        return Err(HardenError::Conflict(output.stderr.trim().to_string()));
    }

    Ok(helper_outcome.merge(outcome_of(&output)))
}

/// Ensure every package is installed at its latest version
pub async fn install_packages(
    runner: &dyn CommandRunner,
    packages: &[String],
) -> Result<Outcome, HardenError> {
    if packages.is_empty() {
        return Ok(Outcome::Unchanged);
    }

    info!("Installing {} packages using apt-get", packages.len());
    debug!("Packages: {:?}", packages);

    let cmd = apt_get().arg("install").args(packages.iter().cloned());
    let output = runner.run(&cmd).await?;

    if !output.success() {
        if let Some(pkg) = missing_package(&output.stderr) {
            return Err(HardenError::MissingPackage(pkg));
        }
        return Err(HardenError::command(&cmd.command_line(), &output.stderr));
    }

    let outcome = outcome_of(&output);
    info!("Packages {}", outcome);
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::mock::MockRunner;
    use tempfile::TempDir;

    const APT_NOOP: &str = "Reading package lists...\ncurl is already the newest version (7.88.1).\n0 upgraded, 0 newly installed, 0 to remove and 3 not upgraded.\n";
    const APT_INSTALLED: &str = "The following NEW packages will be installed:\n  git\n0 upgraded, 1 newly installed, 0 to remove and 3 not upgraded.\n";
    const APTITUDE_UPGRADED: &str = "2 packages upgraded, 0 newly installed, 0 to remove and 0 not upgraded.\n";

    #[test]
    fn test_parse_apt_summary() {
        assert_eq!(
            parse_apt_summary(APT_INSTALLED),
            Some(AptSummary {
                upgraded: 0,
                newly_installed: 1,
                removed: 0
            })
        );
        assert!(!parse_apt_summary(APT_NOOP).unwrap().changed());
        assert_eq!(parse_apt_summary(APTITUDE_UPGRADED).unwrap().upgraded, 2);
        assert!(parse_apt_summary("No packages will be installed").is_none());
    }

    #[test]
    fn test_missing_package() {
        assert_eq!(
            missing_package("E: Unable to locate package nosuchpkg\n"),
            Some("nosuchpkg".to_string())
        );
        assert_eq!(
            missing_package("E: Package 'python' has no installation candidate\n"),
            Some("python".to_string())
        );
        assert_eq!(missing_package("E: dpkg was interrupted"), None);
    }

    #[tokio::test]
    async fn test_install_empty_is_noop() {
        let mock = MockRunner::new();
        let outcome = install_packages(&mock, &[]).await.unwrap();
        assert_eq!(outcome, Outcome::Unchanged);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_install_reports_changed() {
        let mock = MockRunner::new().with_handler(|_| CommandOutput::ok(APT_INSTALLED));
        let outcome = install_packages(&mock, &["curl".into(), "git".into()])
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Changed);
        let call = &mock.calls()[0];
        assert!(call.command_line().ends_with("install curl git"));
        assert!(call
            .env
            .contains(&("DEBIAN_FRONTEND".to_string(), "noninteractive".to_string())));
    }

    fn c_locale(cmd: &CommandSpec) -> bool {
        cmd.env.contains(&("LC_ALL".to_string(), "C".to_string()))
    }

    #[tokio::test]
    async fn test_install_on_localized_host() {
        // German apt unless the locale is forced
        let mock = MockRunner::new().with_handler(|cmd| {
            if c_locale(cmd) {
                CommandOutput::ok(APT_INSTALLED)
            } else {
                CommandOutput::ok("0 aktualisiert, 1 neu installiert, 0 zu entfernen und 3 nicht aktualisiert.\n")
            }
        });

        let outcome = install_packages(&mock, &["git".into()]).await.unwrap();
        assert_eq!(outcome, Outcome::Changed);
    }

    #[tokio::test]
    async fn test_apt_commands_run_in_c_locale() {
        let temp = TempDir::new().unwrap();
        let paths = HostPaths::with_root(temp.path());
        let mock = MockRunner::new().with_handler(|_| CommandOutput::ok(APT_NOOP));

        refresh_cache(&mock, &paths, 0).await.unwrap();
        upgrade_packages(&mock, "aptitude").await.unwrap();
        install_packages(&mock, &["curl".into()]).await.unwrap();

        let calls = mock.calls();
        assert_eq!(calls.len(), 4);
        assert!(calls.iter().all(c_locale));
    }

    #[tokio::test]
    async fn test_install_missing_package_is_fatal() {
        let mock = MockRunner::new().with_handler(|_| {
            CommandOutput::failed(100, "E: Unable to locate package nosuchpkg")
        });
        let result = install_packages(&mock, &["nosuchpkg".into()]).await;

        match result {
            Err(HardenError::MissingPackage(name)) => assert_eq!(name, "nosuchpkg"),
            other => panic!("expected MissingPackage, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_refresh_cache_failure_is_repository_error() {
        let temp = TempDir::new().unwrap();
        let paths = HostPaths::with_root(temp.path());
        let mock = MockRunner::new()
            .with_handler(|_| CommandOutput::failed(100, "Could not resolve 'deb.debian.org'"));

        let result = refresh_cache(&mock, &paths, 3600).await;
        assert!(matches!(result, Err(HardenError::Repository(_))));
    }

    #[tokio::test]
    async fn test_refresh_cache_respects_valid_time() {
        let temp = TempDir::new().unwrap();
        let paths = HostPaths::with_root(temp.path());
        let mock = MockRunner::new();

        assert_eq!(
            refresh_cache(&mock, &paths, 3600).await.unwrap(),
            Outcome::Changed
        );
        assert!(paths.apt_update_stamp().exists());

        assert_eq!(
            refresh_cache(&mock, &paths, 3600).await.unwrap(),
            Outcome::Unchanged
        );
        assert_eq!(mock.calls().len(), 1);

        // Zero means always refresh
        assert_eq!(
            refresh_cache(&mock, &paths, 0).await.unwrap(),
            Outcome::Changed
        );
        assert_eq!(mock.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_upgrade_installs_helper_first() {
        let mock = MockRunner::new().with_handler(|cmd| {
            if cmd.program == "aptitude" {
                CommandOutput::ok(APTITUDE_UPGRADED)
            } else {
                CommandOutput::ok(APT_NOOP)
            }
        });

        let outcome = upgrade_packages(&mock, "aptitude").await.unwrap();
        assert_eq!(outcome, Outcome::Changed);

        let lines = mock.command_lines();
        assert!(lines[0].ends_with("install aptitude"));
        assert!(lines[1].ends_with("safe-upgrade"));
    }

    #[tokio::test]
    async fn test_upgrade_conflict_is_fatal() {
        let mock = MockRunner::new().with_handler(|cmd| {
            if cmd.program == "aptitude" {
                CommandOutput::failed(1, "Unable to resolve dependencies")
            } else {
                CommandOutput::ok(APT_NOOP)
            }
        });

        let result = upgrade_packages(&mock, "aptitude").await;
        assert!(matches!(result, Err(HardenError::Conflict(_))));
    }
}
