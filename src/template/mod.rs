//! Jinja2-compatible template rendering
//!
//! Renders the sshd_config template using the run configuration as context.

pub mod context;

pub use context::build_context;

use crate::HardenError;
use crate::config::RunConfig;
use minijinja::{Environment, UndefinedBehavior};
use std::collections::HashMap;
use tracing::debug;

/// Built-in sshd_config template
pub const SSHD_CONFIG_TEMPLATE: &str = include_str!("../../templates/sshd_config.j2");

/// Render a Jinja template with the run configuration
pub fn render_template(template: &str, config: &RunConfig) -> Result<String, HardenError> {
    render_template_with_context(template, &build_context(config))
}

/// Render a Jinja template with a custom context
///
/// Undefined variables are an error: a typo in an sshd template must not
/// silently render an empty directive.
pub fn render_template_with_context(
    template: &str,
    context: &HashMap<String, minijinja::Value>,
) -> Result<String, HardenError> {
    debug!("Rendering Jinja template");

    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_keep_trailing_newline(true);
    env.set_trim_blocks(true);

    env.add_template("template", template)
        .map_err(|e| HardenError::Template(format!("parse error: {}", e)))?;

    let tmpl = env
        .get_template("template")
        .map_err(|e| HardenError::Template(e.to_string()))?;

    tmpl.render(context)
        .map_err(|e| HardenError::Template(format!("render error: {}", e)))
}
