//! Event sink port — durable storage for control events.
//!
//! Persistence is fire-and-forget from the core's perspective: a sink
//! failure must never block actuation, so implementations log and
//! swallow their own errors.

use std::future::Future;

use verdant_domain::event::ControlEvent;

/// Persists control events outside the core.
pub trait EventSink {
    /// Hand a control event to the sink. Infallible by contract; sinks
    /// deal with their own failures.
    fn persist(&self, event: ControlEvent) -> impl Future<Output = ()> + Send;
}

impl<T: EventSink + Send + Sync> EventSink for std::sync::Arc<T> {
    fn persist(&self, event: ControlEvent) -> impl Future<Output = ()> + Send {
        (**self).persist(event)
    }
}
