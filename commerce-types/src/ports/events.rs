//! Event bus port.

use crate::domain::DomainEvent;
use crate::error::EventError;

/// Sink for domain events published after a transaction commits.
#[async_trait::async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: &DomainEvent) -> Result<(), EventError>;
}
