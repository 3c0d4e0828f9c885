use crate::domain::events::DomainEvent;
use crate::ports::event_store::{EventStore as EventStoreTrait, Result};
use async_trait::async_trait;
use std::sync::Mutex;
use uuid::Uuid;

use super::guard;

/// In-memory implementation of EventStore
///
/// Keeps a single append-only log in insertion order.
#[derive(Default)]
pub struct EventStore {
    pub(super) events: Mutex<Vec<DomainEvent>>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event appended so far, in order (test inspection)
    pub fn all(&self) -> Result<Vec<DomainEvent>> {
        Ok(guard(&self.events)?.clone())
    }
}

#[async_trait]
impl EventStoreTrait for EventStore {
    async fn append(&self, events: Vec<DomainEvent>) -> Result<()> {
        guard(&self.events)?.extend(events);
        Ok(())
    }

    async fn load(&self, aggregate_id: Uuid) -> Result<Vec<DomainEvent>> {
        Ok(guard(&self.events)?
            .iter()
            .filter(|e| e.aggregate_id() == aggregate_id)
            .cloned()
            .collect())
    }
}
