//! Bounded in-memory control-event log.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Mutex, PoisonError};

use verdant_app::ports::EventSink;
use verdant_domain::event::ControlEvent;

/// Keeps the most recent control events in memory.
///
/// Oldest entries are dropped once `capacity` is reached. Persisting
/// never fails, matching the sink contract.
pub struct MemoryEventSink {
    capacity: usize,
    events: Mutex<VecDeque<ControlEvent>>,
}

impl MemoryEventSink {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            events: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<ControlEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The most recent events, newest last, at most `limit`.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<ControlEvent> {
        let events = self.lock();
        let skip = events.len().saturating_sub(limit);
        events.iter().skip(skip).cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Default for MemoryEventSink {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventSink for MemoryEventSink {
    fn persist(&self, event: ControlEvent) -> impl Future<Output = ()> + Send {
        let mut events = self.lock();
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event);
        drop(events);
        async {}
    }
}
