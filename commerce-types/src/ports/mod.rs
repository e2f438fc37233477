//! Port traits (interfaces for adapters).
//!
//! These are the contracts that adapters must implement.
//! The application layer depends on these traits, not concrete implementations.

mod events;
mod repository;
mod transaction;

pub use events::EventBus;
pub use repository::{
    CurrencyRepository, CustomerGroupRepository, CustomerRepository, RepositoryProvider,
};
pub use transaction::{IsolationLevel, TransactionalConnection};
