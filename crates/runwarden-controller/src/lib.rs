//! Reconcile machinery for runwarden.
//!
//! ```text
//! Informer<O> ──notifications──▶ EventTranslator ──keys──▶ EventQueue
//!                                                              │
//!                          workers ◀── get / done / add_rate_limited
//!                             │
//!                             ▼
//!                        Handler<O>   (object_changed / object_deleted)
//! ```
//!
//! [`ControllerManager`] wires two controllers: workflow runs (history
//! retention and overall phase) and stage pods (requeue the owning run).

pub mod controller;
pub mod error;
pub mod handlers;
pub mod manager;
pub mod queue;
pub mod rate_limit;
pub mod status;
pub mod translator;

pub use controller::{Controller, ControllerOptions, Handler};
pub use error::{ControllerError, Result};
pub use handlers::{PodHandler, WorkflowRunHandler};
pub use manager::{Clients, ControllerManager};
pub use queue::EventQueue;
pub use rate_limit::{
    BucketRateLimiter, ItemExponentialRateLimiter, MaxOfRateLimiter, RateLimiter,
    default_controller_rate_limiter,
};
pub use status::{overall_phase, run_phase};
pub use translator::EventTranslator;
