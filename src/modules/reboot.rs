//! Reboot scheduling module

use crate::runner::{CommandRunner, CommandSpec, run_checked};
use crate::{HardenError, Outcome};
use tracing::info;

/// Minutes between scheduling and the actual reboot
pub const REBOOT_DELAY_MINUTES: u32 = 1;

/// Schedule a reboot so the current session can disconnect cleanly first
pub async fn schedule_reboot(
    runner: &dyn CommandRunner,
    message: &str,
) -> Result<Outcome, HardenError> {
    info!("Scheduling reboot in {} minute(s)", REBOOT_DELAY_MINUTES);

    run_checked(
        runner,
        &CommandSpec::new("shutdown").args([
            "-r".to_string(),
            format!("+{}", REBOOT_DELAY_MINUTES),
            message.to_string(),
        ]),
    )
    .await?;

    Ok(Outcome::Changed)
}
