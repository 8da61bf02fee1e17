//! Dotfile installation module

use super::files;
use crate::config::RunConfig;
use crate::state::HostPaths;
use crate::{HardenError, Outcome};
use tokio::fs;
use tracing::info;

/// Dotfiles installed into the home directory: (source name, target name, built-in content)
pub const DOTFILES: [(&str, &str, &str); 2] = [
    (
        "bash_aliases",
        ".bash_aliases",
        include_str!("../../files/bash_aliases"),
    ),
    ("vimrc", ".vimrc", include_str!("../../files/vimrc")),
];

/// Copy the dotfiles into the configured home directory
///
/// Existing files are overwritten when their content differs.
pub async fn install_dotfiles(
    paths: &HostPaths,
    config: &RunConfig,
) -> Result<Outcome, HardenError> {
    let home = paths.resolve(&config.dotfiles_home);
    let mut outcome = Outcome::Unchanged;

    for (source_name, target_name, builtin) in DOTFILES {
        let content = match &config.dotfiles_source {
            Some(dir) => fs::read_to_string(dir.join(source_name)).await?,
            None => builtin.to_string(),
        };

        let target = home.join(target_name);
        let change = files::write_if_changed(&target, &content, true).await?;
        if change.changed() {
            info!("Installed {}", target.display());
        }
        outcome = outcome.merge(Outcome::from_changed(change.changed()));
    }

    Ok(outcome)
}
