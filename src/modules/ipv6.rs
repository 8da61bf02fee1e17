//! IPv6 disabling module
//!
//! Turns IPv6 off in UFW's defaults and adds `ipv6.disable=1` to the kernel
//! command line, then regenerates the grub configuration.

use super::files;
use crate::runner::{CommandRunner, CommandSpec, run_checked};
use crate::state::HostPaths;
use crate::{HardenError, Outcome};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, info};

static UFW_IPV6_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^IPV6=yes$").expect("static regex"));

/// Only an empty cmdline matches; a line that already carries flags is left alone
static GRUB_CMDLINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?m)^GRUB_CMDLINE_LINUX=""$"#).expect("static regex"));

pub const UFW_IPV6_DISABLED: &str = "IPV6=no";
pub const GRUB_CMDLINE_IPV6_DISABLED: &str = r#"GRUB_CMDLINE_LINUX="ipv6.disable=1""#;

/// Set `IPV6=no` in /etc/default/ufw
pub async fn disable_in_ufw(paths: &HostPaths) -> Result<bool, HardenError> {
    let change = files::replace_lines(
        &paths.ufw_defaults(),
        &UFW_IPV6_RE,
        UFW_IPV6_DISABLED,
        true,
    )
    .await?;
    Ok(change.changed())
}

/// Put `ipv6.disable=1` on an empty GRUB_CMDLINE_LINUX in /etc/default/grub
pub async fn disable_in_grub(paths: &HostPaths) -> Result<bool, HardenError> {
    let change = files::replace_lines(
        &paths.grub_defaults(),
        &GRUB_CMDLINE_RE,
        GRUB_CMDLINE_IPV6_DISABLED,
        true,
    )
    .await?;

    if !change.changed() {
        debug!("GRUB_CMDLINE_LINUX is not empty or already set, not touching it");
    }
    Ok(change.changed())
}

/// Edit both files, then regenerate the grub configuration
///
/// `update-grub` runs every time; the step counts as a change only if one
/// of the files was edited.
pub async fn disable_ipv6(
    runner: &dyn CommandRunner,
    paths: &HostPaths,
) -> Result<Outcome, HardenError> {
    let ufw_changed = disable_in_ufw(paths).await?;
    let grub_changed = disable_in_grub(paths).await?;

    info!("Regenerating grub configuration");
    run_checked(runner, &CommandSpec::new("update-grub")).await?;

    Ok(Outcome::from_changed(ufw_changed || grub_changed))
}
