//! # Commerce Hex
//!
//! Transaction coordination and application services for the commerce backend.
//!
//! ## Architecture
//!
//! - `transaction/` - Nested transaction coordinator
//! - `service/` - Application services (orchestrate domain operations)
//! - `events` - Event bus adapters
//!
//! Everything is generic over `C: TransactionalConnection`, so the database
//! adapter is injected at compile time.

pub mod events;
pub mod service;
pub mod transaction;

#[cfg(test)]
mod transaction_tests;

pub use events::{BroadcastEventBus, TracingEventBus};
pub use service::{CurrencyService, CustomerGroupService, CustomerService};
pub use transaction::{ErrorHandler, RunOptions, TransactionCoordinator, TransactionManager};
