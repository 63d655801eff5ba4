//! Wires the workflow-run and pod controllers from configuration.

use std::sync::Arc;

use runwarden_cluster::{Informer, InformerConfig, ListParams, SharedClient};
use runwarden_config::RunwardenConfig;
use runwarden_history::{HistoryConfig, RunHistoryStore};
use runwarden_types::{Pod, WorkflowRun, workflow_pod_selector};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::controller::{Controller, ControllerOptions};
use crate::handlers::{PodHandler, WorkflowRunHandler};
use crate::rate_limit::default_controller_rate_limiter;

/// Typed clients for the kinds the manager watches.
#[derive(Clone)]
pub struct Clients {
    pub runs: SharedClient<WorkflowRun>,
    pub pods: SharedClient<Pod>,
}

/// Owns the controllers and the run history they share.
pub struct ControllerManager {
    runs: Controller<WorkflowRun>,
    pods: Controller<Pod>,
    history: Arc<RunHistoryStore>,
    workers: usize,
}

impl ControllerManager {
    /// Build every controller from `config`. Must be called inside a tokio
    /// runtime for the history sweep task to start.
    pub fn new(config: &RunwardenConfig, clients: Clients) -> Self {
        let controller = config.controller();
        let rate_limit = config.rate_limit();
        let history_section = config.history();

        let history = RunHistoryStore::new(
            HistoryConfig::new()
                .with_max_queue_size(history_section.max_queue_size)
                .with_resync_period(controller.resync_period())
                .with_sweep_interval(history_section.sweep_interval()),
            Arc::new(clients.runs.clone()),
        );

        let run_informer = Arc::new(Informer::new(
            clients.runs.clone(),
            InformerConfig::new(controller.resync_period()),
        ));
        let runs = Controller::new(
            "workflow-runs",
            run_informer,
            Arc::new(WorkflowRunHandler::new(history.clone(), clients.runs.clone())),
            Box::new(default_controller_rate_limiter(&rate_limit)),
            ControllerOptions {
                max_retries: controller.retry_limit(),
                // Resyncs must reach the handler to keep history entries fresh.
                suppress_equal_updates: false,
                selector: None,
            },
        );

        let selector = workflow_pod_selector();
        let pod_informer = Arc::new(Informer::new(
            clients.pods.clone(),
            InformerConfig::new(controller.resync_period())
                .with_params(ListParams::all().with_selector(selector.clone())),
        ));
        let pods = Controller::new(
            "stage-pods",
            pod_informer,
            Arc::new(PodHandler::new(runs.queue())),
            Box::new(default_controller_rate_limiter(&rate_limit)),
            ControllerOptions {
                max_retries: controller.retry_limit(),
                suppress_equal_updates: true,
                selector: Some(selector),
            },
        );

        Self {
            runs,
            pods,
            history,
            workers: controller.workers,
        }
    }

    pub fn history(&self) -> &Arc<RunHistoryStore> {
        &self.history
    }

    pub fn runs(&self) -> &Controller<WorkflowRun> {
        &self.runs
    }

    pub fn pods(&self) -> &Controller<Pod> {
        &self.pods
    }

    /// Run both controllers until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(workers = self.workers, "Starting controllers");
        tokio::join!(
            self.runs.run(self.workers, shutdown.clone()),
            self.pods.run(self.workers, shutdown),
        );
        info!("Controllers stopped");
    }
}
