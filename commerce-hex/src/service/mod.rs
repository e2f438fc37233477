//! Application services.
//!
//! Every public operation takes an optional [`TransactionManager`]. Passing
//! the caller's manager makes the operation join the caller's transaction;
//! passing `None` runs it in a transaction of its own. Operations that
//! compose other operations forward their own manager with `Some(&mut *tx)`.

mod currency;
mod customer;
mod customer_group;

pub use currency::CurrencyService;
pub use customer::CustomerService;
pub use customer_group::CustomerGroupService;

use commerce_types::{AppError, TransactionalConnection};

use crate::transaction::{RunOptions, TransactionCoordinator, TransactionManager};

/// Runs `work` in the forwarded transaction, or in a new one when there is none.
pub(crate) async fn atomically<C, T, F>(
    coordinator: &TransactionCoordinator<C>,
    tx: Option<&mut TransactionManager<C>>,
    work: F,
) -> Result<T, AppError>
where
    C: TransactionalConnection,
    F: AsyncFnOnce(&mut TransactionManager<C>) -> Result<T, AppError>,
{
    coordinator.run(RunOptions::inherit(tx), work).await
}
