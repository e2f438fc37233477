//! Domain models for the commerce backend.

pub mod currency;
pub mod customer;
pub mod customer_group;
pub mod event;

pub use currency::Currency;
pub use customer::{Customer, CustomerId};
pub use customer_group::{CustomerGroup, CustomerGroupId, Metadata};
pub use event::DomainEvent;
