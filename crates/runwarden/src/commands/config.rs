//! Config command - configuration management.

use anyhow::Result;
use clap::{Args, Subcommand};

use runwarden_config::{self, RunwardenConfig};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the resolved configuration, defaults filled in
    Show,

    /// Show which config files are checked and which were loaded
    Path,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Path => cmd_path(ctx),
    }
}

/// Every section present, so the output documents all effective values.
fn effective(config: &RunwardenConfig) -> RunwardenConfig {
    RunwardenConfig {
        controller: Some(config.controller()),
        rate_limit: Some(config.rate_limit()),
        history: Some(config.history()),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let loaded = runwarden_config::load_config(None)?;
    let config = effective(&loaded.config);

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let sources = loaded.loaded_from();
    if sources.is_empty() {
        println!("# No config files loaded (using defaults)");
    } else {
        for source in &sources {
            println!("# Loaded: {}", source.display());
        }
    }
    for warning in &loaded.warnings {
        println!("# Warning: {}", warning);
    }
    println!();
    print!("{}", config.to_toml()?);
    Ok(())
}

fn cmd_path(ctx: &Context) -> Result<()> {
    let loaded = runwarden_config::load_config(None)?;

    if ctx.json_output {
        let sources: Vec<_> = loaded
            .sources
            .iter()
            .map(|s| {
                serde_json::json!({
                    "path": s.path.display().to_string(),
                    "loaded": s.loaded,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&sources)?);
        return Ok(());
    }

    for source in &loaded.sources {
        let status = if source.loaded { "loaded" } else { "not found" };
        println!("{} ({})", source.path.display(), status);
    }
    Ok(())
}
