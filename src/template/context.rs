//! Template context building
//!
//! Builds the context for Jinja2 template rendering from the run
//! configuration.

use crate::config::RunConfig;
use minijinja::value::Value;
use std::collections::HashMap;

/// Build the template context from the run configuration
pub fn build_context(config: &RunConfig) -> HashMap<String, Value> {
    let mut ctx = HashMap::new();

    ctx.insert("sshd_port".to_string(), Value::from(config.sshd_port));
    ctx.insert(
        "permit_root_login".to_string(),
        Value::from(config.permit_root_login.clone()),
    );
    ctx.insert(
        "password_authentication".to_string(),
        Value::from(config.password_authentication),
    );
    ctx.insert("disable_ipv6".to_string(), Value::from(config.disable_ipv6));
    ctx.insert(
        "enable_ufw_firewall".to_string(),
        Value::from(config.enable_ufw_firewall),
    );
    ctx.insert(
        "timezone_server".to_string(),
        Value::from(config.timezone_server.clone()),
    );

    // Whole config for custom templates
    ctx.insert("config".to_string(), Value::from_serialize(config));

    ctx
}
