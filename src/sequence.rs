//! The provisioning sequence
//!
//! Runs every [`Step`] in order against one host. Disabled steps are
//! recorded as skipped; the first failing step stops the run.

use crate::config::RunConfig;
use crate::modules::{dotfiles, firewall, ipv6, packages, reboot, sshd, timezone};
use crate::runner::CommandRunner;
use crate::state::{HostPaths, RunReport};
use crate::{HardenError, Outcome, Step};
use tracing::{error, info};

/// Drives the provisioning steps against one host
pub struct Provisioner<'a> {
    config: &'a RunConfig,
    paths: &'a HostPaths,
    runner: &'a dyn CommandRunner,
}

impl<'a> Provisioner<'a> {
    pub fn new(config: &'a RunConfig, paths: &'a HostPaths, runner: &'a dyn CommandRunner) -> Self {
        Self {
            config,
            paths,
            runner,
        }
    }

    /// Run the whole sequence and return its report
    pub async fn run(&self) -> Result<RunReport, HardenError> {
        let mut report = RunReport::start();
        self.run_into(&mut report).await?;
        Ok(report)
    }

    /// Run the whole sequence, recording progress into `report`
    ///
    /// On failure the report holds every step that completed plus the
    /// failing one, so callers can persist a partial report.
    pub async fn run_into(&self, report: &mut RunReport) -> Result<(), HardenError> {
        for step in Step::ALL {
            if !step.is_enabled(self.config) {
                info!("Skipping step: {}", step);
                report.record(step, Outcome::Skipped);
                continue;
            }

            info!("Starting step: {}", step);
            match self.run_step(step, report).await {
                Ok(outcome) => {
                    info!("Completed step: {} ({})", step, outcome);
                    report.record(step, outcome);
                }
                Err(e) => {
                    error!("Step {} failed: {}", step, e);
                    report.record_failure(step, &e);
                    report.finish();
                    return Err(HardenError::step(step.to_string(), e));
                }
            }
        }

        report.finish();
        info!("Run finished: {}", report.summary());
        Ok(())
    }

    async fn run_step(&self, step: Step, report: &RunReport) -> Result<Outcome, HardenError> {
        let config = self.config;
        let runner = self.runner;
        let paths = self.paths;

        match step {
            Step::RefreshCache => {
                packages::refresh_cache(runner, paths, config.cache_valid_time).await
            }
            Step::UpgradePackages => {
                packages::upgrade_packages(runner, &config.upgrade_helper).await
            }
            Step::InstallPackages => {
                packages::install_packages(runner, &config.install_packages).await
            }
            Step::FirewallAllowSsh => firewall::allow_ssh(runner, config.sshd_port).await,
            Step::FirewallEnable => firewall::enable(runner).await,
            Step::SshdConfig => sshd::install_sshd_config(runner, paths, config).await,
            Step::SshService => {
                let config_changed = report.outcome_of(Step::SshdConfig) == Some(Outcome::Changed);
                sshd::restart_service(runner, &config.ssh_service, config_changed).await
            }
            Step::Dotfiles => dotfiles::install_dotfiles(paths, config).await,
            Step::DisableIpv6 => ipv6::disable_ipv6(runner, paths).await,
            Step::Timezone => timezone::set_timezone(runner, paths, &config.timezone_server).await,
            Step::Reboot => reboot::schedule_reboot(runner, &config.reboot_message).await,
        }
    }
}
