//! Domain events emitted by services.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event names emitted by the services.
pub mod names {
    pub const CURRENCY_UPDATED: &str = "currency.updated";
    pub const CUSTOMER_CREATED: &str = "customer.created";
    pub const CUSTOMER_GROUP_CREATED: &str = "customer_group.created";
    pub const CUSTOMER_GROUP_UPDATED: &str = "customer_group.updated";
    pub const CUSTOMER_GROUP_DELETED: &str = "customer_group.deleted";
}

/// Something that happened to a domain entity.
///
/// Events raised inside a unit of work are queued on its transaction and only
/// published after the owning physical transaction commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub name: String,
    pub data: Value,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent {
    pub fn new(name: impl Into<String>, data: Value) -> Self {
        Self {
            name: name.into(),
            data,
            occurred_at: Utc::now(),
        }
    }
}
