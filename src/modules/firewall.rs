//! UFW firewall module
//!
//! Opens the SSH port and enables a default-deny inbound policy. The allow
//! rule must be in place before the firewall is enabled, otherwise enabling
//! would cut the management connection.
//!
//! Change detection compares `ufw status verbose` (and `ufw show added`,
//! which also lists rules while the firewall is inactive) before and after
//! each step.

use crate::runner::{CommandRunner, CommandSpec, run_checked};
use crate::{HardenError, Outcome};
use tracing::{debug, info};

/// Label attached to the SSH allow rule
pub const SSH_RULE_COMMENT: &str = "ssh";

/// One row of the `ufw status` rule table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirewallRule {
    pub to: String,
    pub action: String,
    pub from: String,
    pub comment: Option<String>,
}

/// Parsed `ufw status verbose`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirewallStatus {
    pub active: bool,
    /// Logging setting, e.g. `on (low)` or `off`
    pub logging: Option<String>,
    pub default_incoming: Option<String>,
    pub default_outgoing: Option<String>,
    pub rules: Vec<FirewallRule>,
}

/// Parse the output of `ufw status verbose`
pub fn parse_status(output: &str) -> FirewallStatus {
    let mut status = FirewallStatus::default();
    let mut in_table = false;

    for line in output.lines() {
        if in_table {
            if let Some(rule) = parse_rule(line) {
                status.rules.push(rule);
            }
            continue;
        }

        if let Some(value) = line.strip_prefix("Status:") {
            status.active = value.trim() == "active";
        } else if let Some(value) = line.strip_prefix("Logging:") {
            status.logging = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("Default:") {
            for part in value.split(',') {
                let part = part.trim();
                let Some((policy, direction)) = part.split_once(' ') else {
                    continue;
                };
                match direction.trim_matches(|c| c == '(' || c == ')') {
                    "incoming" => status.default_incoming = Some(policy.to_string()),
                    "outgoing" => status.default_outgoing = Some(policy.to_string()),
                    _ => {}
                }
            }
        } else if line.starts_with("--") {
            in_table = true;
        }
    }

    status
}

fn parse_rule(line: &str) -> Option<FirewallRule> {
    if line.trim().is_empty() {
        return None;
    }

    let (body, comment) = match line.split_once(" # ") {
        Some((body, comment)) => (body, Some(comment.trim().to_string())),
        None => (line, None),
    };

    // Columns are separated by runs of two or more spaces
    let columns: Vec<&str> = body
        .split("  ")
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect();

    match columns.as_slice() {
        [to, action, from, ..] => Some(FirewallRule {
            to: to.to_string(),
            action: action.to_string(),
            from: from.to_string(),
            comment,
        }),
        _ => None,
    }
}

/// Parse `ufw show added` into its rule command lines
pub fn parse_added(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with("ufw "))
        .map(str::to_string)
        .collect()
}

/// ufw with untranslated output, which the status parser relies on
fn ufw() -> CommandSpec {
    CommandSpec::new("ufw").env("LC_ALL", "C")
}

/// Current firewall status
pub async fn status(runner: &dyn CommandRunner) -> Result<FirewallStatus, HardenError> {
    let output = run_checked(runner, &ufw().args(["status", "verbose"])).await?;
    Ok(parse_status(&output.stdout))
}

async fn added_rules(runner: &dyn CommandRunner) -> Result<Vec<String>, HardenError> {
    let output = run_checked(runner, &ufw().args(["show", "added"])).await?;
    Ok(parse_added(&output.stdout))
}

/// Allow inbound TCP on the SSH port, labelled `ssh`
pub async fn allow_ssh(runner: &dyn CommandRunner, port: u16) -> Result<Outcome, HardenError> {
    let before = added_rules(runner).await?;

    info!("Allowing {}/tcp through the firewall", port);
    let output = run_checked(
        runner,
        &ufw().args([
            "allow".to_string(),
            format!("{}/tcp", port),
            "comment".to_string(),
            SSH_RULE_COMMENT.to_string(),
        ]),
    )
    .await?;
    debug!("ufw: {}", output.stdout.trim());

    let after = added_rules(runner).await?;
    Ok(Outcome::from_changed(before != after))
}

/// Enable the firewall: deny incoming, allow outgoing, low logging
pub async fn enable(runner: &dyn CommandRunner) -> Result<Outcome, HardenError> {
    let before = status(runner).await?;

    run_checked(runner, &ufw().args(["default", "deny", "incoming"])).await?;
    run_checked(runner, &ufw().args(["default", "allow", "outgoing"])).await?;
    run_checked(runner, &ufw().args(["logging", "low"])).await?;

    if before.active {
        debug!("Firewall already active");
    } else {
        info!("Enabling firewall");
        run_checked(runner, &ufw().args(["--force", "enable"])).await?;
    }

    let after = status(runner).await?;
    if !after.active {
        return Err(HardenError::Command(
            "ufw reports inactive after enable".to_string(),
        ));
    }

    Ok(Outcome::from_changed(before != after))
}
