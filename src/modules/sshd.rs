//! SSH daemon hardening module
//!
//! Renders /etc/ssh/sshd_config from a template, then restarts the SSH
//! service and makes sure it starts on boot.

use super::files::{self, FileChange};
use crate::config::RunConfig;
use crate::runner::{CommandRunner, CommandSpec, run_checked};
use crate::state::HostPaths;
use crate::template::{SSHD_CONFIG_TEMPLATE, render_template};
use crate::{HardenError, Outcome};
use tokio::fs;
use tracing::{debug, info};

/// Permission bits of the installed sshd_config
pub const SSHD_CONFIG_MODE: u32 = 0o644;

/// Render the sshd configuration for this run
pub async fn render_sshd_config(config: &RunConfig) -> Result<String, HardenError> {
    match &config.sshd_template {
        Some(path) => {
            debug!("Using sshd template {}", path.display());
            let template = fs::read_to_string(path).await.map_err(|e| {
                HardenError::Template(format!("cannot read {}: {}", path.display(), e))
            })?;
            render_template(&template, config)
        }
        None => render_template(SSHD_CONFIG_TEMPLATE, config),
    }
}

/// Write the rendered sshd_config as root:root 0644, backing up the old one
pub async fn install_sshd_config(
    runner: &dyn CommandRunner,
    paths: &HostPaths,
    config: &RunConfig,
) -> Result<Outcome, HardenError> {
    let rendered = render_sshd_config(config).await?;
    let path = paths.sshd_config();

    let change = files::write_if_changed(&path, &rendered, true).await?;
    if let FileChange::Written { backup: Some(backup) } = &change {
        info!("Previous sshd_config kept at {}", backup.display());
    }

    let mode_changed = files::ensure_mode(&path, SSHD_CONFIG_MODE).await?;

    let owner_before = files::ownership(&path).await?;
    if owner_before != (0, 0) {
        run_checked(
            runner,
            &CommandSpec::new("chown").args(["root:root".to_string(), path.to_string_lossy().into_owned()]),
        )
        .await?;
    }
    let owner_changed = files::ownership(&path).await? != owner_before;

    Ok(Outcome::from_changed(
        change.changed() || mode_changed || owner_changed,
    ))
}

/// Restart the SSH service and enable it at boot
///
/// The restart always happens. The step counts as a change when the
/// configuration was rewritten or the unit was not yet enabled.
pub async fn restart_service(
    runner: &dyn CommandRunner,
    service: &str,
    config_changed: bool,
) -> Result<Outcome, HardenError> {
    let enabled = runner
        .run(&CommandSpec::new("systemctl").args(["is-enabled", service]))
        .await?
        .success();

    info!("Restarting {}", service);
    run_checked(
        runner,
        &CommandSpec::new("systemctl").args(["restart", service]),
    )
    .await?;

    if !enabled {
        info!("Enabling {} at boot", service);
        run_checked(
            runner,
            &CommandSpec::new("systemctl").args(["enable", service]),
        )
        .await?;
    }

    Ok(Outcome::from_changed(config_changed || !enabled))
}
