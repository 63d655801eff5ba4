//! Cluster control-plane surface for runwarden.
//!
//! The controller talks to the cluster through three seams:
//!
//! ```text
//! ResourceClient<O> (trait)     - typed get/list/create/update/delete/patch/watch
//!     └── InMemoryClient<O>     - process-local store used by tests and local mode
//!
//! Informer<O>                   - list + watch + periodic resync over a client,
//!                                 keeps a local cache and fans notifications out to
//! ResourceEventHandler<O>       - on_add / on_update / on_delete callbacks
//! ```

pub mod client;
pub mod error;
pub mod handler;
pub mod informer;
pub mod memory;

pub use client::{ListParams, ResourceClient, SharedClient, Watch, WatchEvent};
pub use error::{ClusterError, Result};
pub use handler::ResourceEventHandler;
pub use informer::{Informer, InformerConfig};
pub use memory::InMemoryClient;
