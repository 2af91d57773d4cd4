//! Event bus port — publish/subscribe for broadcast events.

use std::future::Future;

use verdant_domain::error::VerdantError;
use verdant_domain::event::Event;

/// Publishes broadcast events to interested subscribers.
pub trait EventPublisher {
    /// Publish an event to all current subscribers.
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), VerdantError>> + Send;
}

impl<T: EventPublisher + Send + Sync> EventPublisher for std::sync::Arc<T> {
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), VerdantError>> + Send {
        (**self).publish(event)
    }
}
