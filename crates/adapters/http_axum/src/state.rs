//! Shared application state for axum handlers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use verdant_app::control::ControlHandle;
use verdant_app::event_bus::InProcessEventBus;

/// State shared across all axum handlers.
///
/// Cheap to clone: the control handle is an mpsc sender and the event
/// bus is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Command channel into the control actor.
    pub control: ControlHandle,
    /// Bus the SSE endpoint subscribes to.
    pub event_bus: Arc<InProcessEventBus>,
    /// Override duration applied when a request omits one.
    pub default_override_ttl: Duration,
    started_at: Instant,
}

impl AppState {
    #[must_use]
    pub fn new(
        control: ControlHandle,
        event_bus: Arc<InProcessEventBus>,
        default_override_ttl: Duration,
    ) -> Self {
        Self {
            control,
            event_bus,
            default_override_ttl,
            started_at: Instant::now(),
        }
    }

    /// Seconds since this state was created, for the health endpoint.
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
