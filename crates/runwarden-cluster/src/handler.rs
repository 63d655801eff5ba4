//! Notification callbacks delivered by an [`Informer`](crate::Informer).

/// Receives add/update/delete notifications for one resource kind.
///
/// Implementations must be cheap: they run on the informer task and should
/// only hand work off (e.g., enqueue a key), never block on I/O.
pub trait ResourceEventHandler<O>: Send + Sync {
    /// An object appeared in the cache.
    fn on_add(&self, obj: &O);

    /// An object changed, or a periodic resync re-delivered it (`old == new`).
    fn on_update(&self, old: &O, new: &O);

    /// An object disappeared; `obj` is its last known state.
    fn on_delete(&self, obj: &O);
}
