//! Phase command - aggregate stage phases into a run phase.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;

use runwarden_controller::overall_phase;
use runwarden_types::Phase;

use super::Context;

/// Arguments for the phase command.
#[derive(Args, Debug)]
pub struct PhaseArgs {
    /// JSON object mapping stage name to phase, e.g. {"build": "Succeeded"}
    pub file: PathBuf,
}

/// Run the phase command.
pub async fn run(args: PhaseArgs, ctx: &Context) -> Result<()> {
    let contents = std::fs::read_to_string(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    let stages: HashMap<String, Phase> = serde_json::from_str(&contents)
        .with_context(|| format!("parsing stage phases from {}", args.file.display()))?;

    let phase = overall_phase(stages.values().copied());

    if ctx.json_output {
        let output = serde_json::json!({
            "phase": phase,
            "stages": stages.len(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", phase);
    }
    Ok(())
}
