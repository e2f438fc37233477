//! Event bus adapters.

use async_trait::async_trait;
use commerce_types::{DomainEvent, EventBus, EventError};
use tokio::sync::broadcast;

/// Writes every published event to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventBus;

#[async_trait]
impl EventBus for TracingEventBus {
    async fn publish(&self, event: &DomainEvent) -> Result<(), EventError> {
        tracing::info!(event = %event.name, data = %event.data, "Event published");
        Ok(())
    }
}

/// Fans events out to in-process subscribers.
///
/// Publishing with no live subscriber fails with
/// [`EventError::NoSubscribers`]; the coordinator logs and moves on.
#[derive(Debug, Clone)]
pub struct BroadcastEventBus {
    sender: broadcast::Sender<DomainEvent>,
}

impl BroadcastEventBus {
    pub const DEFAULT_CAPACITY: usize = 64;

    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl EventBus for BroadcastEventBus {
    async fn publish(&self, event: &DomainEvent) -> Result<(), EventError> {
        self.sender
            .send(event.clone())
            .map(|_| ())
            .map_err(|_| EventError::NoSubscribers(event.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_broadcast_delivers_to_subscribers() {
        let bus = BroadcastEventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(&DomainEvent::new("customer.created", json!({"id": 1})))
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name, "customer.created");
        assert_eq!(event.data, json!({"id": 1}));
    }

    #[tokio::test]
    async fn test_broadcast_without_subscribers() {
        let bus = BroadcastEventBus::default();

        let result = bus
            .publish(&DomainEvent::new("customer.created", json!({})))
            .await;

        assert!(matches!(result, Err(EventError::NoSubscribers(name)) if name == "customer.created"));
    }

    #[tokio::test]
    async fn test_tracing_bus_accepts_events() {
        let result = TracingEventBus
            .publish(&DomainEvent::new("currency.updated", json!({"code": "usd"})))
            .await;

        assert!(result.is_ok());
    }
}
