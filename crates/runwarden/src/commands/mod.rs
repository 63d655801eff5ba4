//! CLI command handlers.

use std::path::Path;

use anyhow::{Context as _, Result};
use runwarden_config::RunwardenConfig;
use tracing::warn;

pub mod config;
pub mod phase;
pub mod start;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

/// Load an explicit config file, or discover and merge the layered ones.
pub fn resolve_config(explicit: Option<&Path>) -> Result<RunwardenConfig> {
    if let Some(path) = explicit {
        return runwarden_config::load_config_file(path)
            .with_context(|| format!("loading config from {}", path.display()));
    }

    let loaded = runwarden_config::load_config(None)?;
    for warning in &loaded.warnings {
        warn!("{}", warning);
    }
    Ok(loaded.config)
}
