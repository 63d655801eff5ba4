//! Start command - runs the controllers against a local in-memory cluster.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Args;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use runwarden_cluster::{InMemoryClient, ResourceClient};
use runwarden_controller::{Clients, ControllerManager};
use runwarden_types::{Pod, WorkflowRun};

use super::{Context, resolve_config};

/// Arguments for the start command.
///
/// CLI arguments override config file values.
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Config file to use instead of discovery
    #[arg(short, long, env = "RUNWARDEN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Worker tasks per controller (overrides config)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// JSON file of runs and pods to load into the cluster before starting
    #[arg(long)]
    pub seed: Option<PathBuf>,
}

/// Objects preloaded into the in-memory cluster.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Seed {
    runs: Vec<WorkflowRun>,
    pods: Vec<Pod>,
}

/// Run the start command.
pub async fn run(args: StartArgs, ctx: &Context) -> Result<()> {
    let mut config = resolve_config(args.config.as_deref())?;
    if let Some(workers) = args.workers {
        config.controller.get_or_insert_with(Default::default).workers = workers;
    }
    config.validate()?;

    if ctx.verbose {
        info!(config = ?config, "Resolved configuration");
    }

    let runs = Arc::new(InMemoryClient::<WorkflowRun>::new());
    let pods = Arc::new(InMemoryClient::<Pod>::new());
    if let Some(path) = &args.seed {
        seed_cluster(path, &runs, &pods).await?;
    }

    let manager = Arc::new(ControllerManager::new(
        &config,
        Clients {
            runs: runs.clone(),
            pods: pods.clone(),
        },
    ));

    let shutdown = CancellationToken::new();
    let controllers = {
        let manager = manager.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { manager.run(shutdown).await })
    };

    info!("Runwarden started, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;

    info!("Shutdown requested");
    shutdown.cancel();
    controllers.await.context("controller task failed")?;
    info!(runs = runs.len(), pods = pods.len(), "Runwarden stopped");
    Ok(())
}

async fn seed_cluster(
    path: &Path,
    runs: &InMemoryClient<WorkflowRun>,
    pods: &InMemoryClient<Pod>,
) -> Result<()> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading seed file {}", path.display()))?;
    let seed: Seed = serde_json::from_str(&contents)
        .with_context(|| format!("parsing seed file {}", path.display()))?;

    for run in seed.runs {
        runs.create(run).await?;
    }
    for pod in seed.pods {
        pods.create(pod).await?;
    }
    info!(runs = runs.len(), pods = pods.len(), "Seeded cluster");
    Ok(())
}
