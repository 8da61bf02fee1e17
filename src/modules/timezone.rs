//! Timezone configuration module

use crate::runner::{CommandRunner, CommandSpec};
use crate::state::HostPaths;
use crate::{HardenError, Outcome};
use tokio::fs;
use tracing::{debug, info};

/// Set the system timezone
pub async fn set_timezone(
    runner: &dyn CommandRunner,
    paths: &HostPaths,
    timezone: &str,
) -> Result<Outcome, HardenError> {
    validate_timezone(paths, timezone)?;

    if current_timezone(runner, paths).await?.as_deref() == Some(timezone) {
        debug!("Timezone already {}", timezone);
        return Ok(Outcome::Unchanged);
    }

    info!("Setting timezone to: {}", timezone);

    // Try timedatectl first (systemd systems)
    if try_timedatectl(runner, timezone).await? {
        return Ok(Outcome::Changed);
    }

    // Fallback: symlink /etc/localtime
    set_localtime_symlink(paths, timezone).await?;

    // Also write /etc/timezone for Debian-based systems
    write_etc_timezone(paths, timezone).await?;

    Ok(Outcome::Changed)
}

/// Check the zone is a known identifier under /usr/share/zoneinfo
pub fn validate_timezone(paths: &HostPaths, timezone: &str) -> Result<(), HardenError> {
    if timezone.is_empty()
        || timezone.starts_with('/')
        || timezone.split('/').any(|part| part == "..")
    {
        return Err(HardenError::InvalidTimezone(timezone.to_string()));
    }

    let zoneinfo = paths.zoneinfo(timezone);
    if !zoneinfo.is_file() {
        return Err(HardenError::InvalidTimezone(format!(
            "{} (not found in {})",
            timezone,
            paths.zoneinfo_dir().display()
        )));
    }

    Ok(())
}

/// The zone currently configured
///
/// The /etc/localtime symlink is read first since both timedatectl and the
/// fallback path write it, then timedatectl, then /etc/timezone.
pub async fn current_timezone(
    runner: &dyn CommandRunner,
    paths: &HostPaths,
) -> Result<Option<String>, HardenError> {
    if let Some(zone) = localtime_zone(paths).await {
        return Ok(Some(zone));
    }

    let output = runner
        .run(&CommandSpec::new("timedatectl")
            .env("LC_ALL", "C")
            .args(["show", "--property=Timezone", "--value"]))
        .await;

    if let Ok(output) = output {
        let zone = output.stdout.trim();
        if output.success() && !zone.is_empty() {
            return Ok(Some(zone.to_string()));
        }
    }

    match fs::read_to_string(paths.etc_timezone()).await {
        Ok(content) => Ok(Some(content.trim().to_string()).filter(|z| !z.is_empty())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Zone named by the /etc/localtime symlink target, if it points into zoneinfo
async fn localtime_zone(paths: &HostPaths) -> Option<String> {
    let target = fs::read_link(paths.localtime()).await.ok()?;
    let target = target.to_string_lossy();
    let (_, zone) = target.split_once("zoneinfo/")?;
    Some(zone.to_string()).filter(|z| !z.is_empty())
}

/// Try to set timezone via timedatectl
async fn try_timedatectl(runner: &dyn CommandRunner, timezone: &str) -> Result<bool, HardenError> {
    debug!("Attempting to set timezone via timedatectl");

    let output = runner
        .run(&CommandSpec::new("timedatectl").args(["set-timezone", timezone]))
        .await;

    match output {
        Ok(output) if output.success() => {
            info!("Timezone set via timedatectl");
            Ok(true)
        }
        Ok(output) => {
            debug!("timedatectl failed: {}", output.stderr.trim());
            Ok(false)
        }
        Err(e) => {
            debug!("timedatectl not available: {}", e);
            Ok(false)
        }
    }
}

/// Point /etc/localtime at the zoneinfo file
async fn set_localtime_symlink(paths: &HostPaths, timezone: &str) -> Result<(), HardenError> {
    debug!("Setting /etc/localtime symlink");

    let localtime = paths.localtime();
    let zoneinfo = paths.zoneinfo(timezone);

    if let Some(parent) = localtime.parent() {
        fs::create_dir_all(parent).await?;
    }

    // Remove existing localtime (file or dangling symlink)
    if fs::symlink_metadata(&localtime).await.is_ok() {
        fs::remove_file(&localtime).await?;
    }

    #[cfg(unix)]
    {
        fs::symlink(&zoneinfo, &localtime).await?;
    }

    info!("Created /etc/localtime symlink to {}", zoneinfo.display());
    Ok(())
}

/// Write /etc/timezone file (Debian/Ubuntu)
async fn write_etc_timezone(paths: &HostPaths, timezone: &str) -> Result<(), HardenError> {
    fs::write(paths.etc_timezone(), format!("{}\n", timezone)).await?;

    debug!("Wrote /etc/timezone");
    Ok(())
}
