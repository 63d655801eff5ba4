//! Run history retention.
//!
//! Keeps, for every workflow, a bounded sequence of its runs ordered by
//! creation time:
//! - inserting past the limit evicts the oldest run and deletes it from the cluster
//! - re-adding a known run only refreshes it
//! - a background sweep forgets runs that stopped being refreshed, on the
//!   assumption they were deleted without the controller noticing
//!
//! # Example
//!
//! ```rust,ignore
//! use runwarden_history::{HistoryConfig, RunHistoryStore};
//!
//! let config = HistoryConfig::default().with_max_queue_size(10);
//! let store = RunHistoryStore::new(config, Arc::new(run_client));
//! store.add_or_refresh(&workflow_key, &run.metadata).await;
//! ```

mod config;
mod deleter;
mod queue;
mod store;

pub use config::HistoryConfig;
pub use deleter::RunDeleter;
pub use queue::{RunQueue, RunRef};
pub use store::{AddOutcome, RunHistoryStore};
