//! Nested transaction coordination.
//!
//! - `coordinator` - begins, joins, commits and rolls back physical transactions
//! - `manager` - the per-transaction context passed to units of work

mod coordinator;
mod manager;

pub use coordinator::{ErrorHandler, RunOptions, TransactionCoordinator};
pub use manager::TransactionManager;
