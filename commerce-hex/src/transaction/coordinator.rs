//! Runs units of work inside physical transactions.

use std::fmt;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::pin::Pin;
use std::sync::Arc;

use commerce_types::{DomainEvent, EventBus, IsolationLevel, RepoError, TransactionalConnection};
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::TransactionManager;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Called with the error of a failed unit of work before it propagates.
///
/// The handler resolves to the error to propagate: the one it was given to
/// keep it, or a replacement.
pub type ErrorHandler<'a, E> = Box<dyn FnOnce(E) -> BoxFuture<'a, E> + Send + 'a>;

/// Options for a single [`TransactionCoordinator::run`] invocation.
pub struct RunOptions<'a, C: TransactionalConnection, E> {
    transaction: Option<&'a mut TransactionManager<C>>,
    error_handler: Option<ErrorHandler<'a, E>>,
    isolation: Option<IsolationLevel>,
}

impl<'a, C: TransactionalConnection, E> RunOptions<'a, C, E> {
    /// Starts a new physical transaction.
    pub fn new() -> Self {
        Self {
            transaction: None,
            error_handler: None,
            isolation: None,
        }
    }

    /// Joins the caller's transaction instead of starting one.
    pub fn joined(transaction: &'a mut TransactionManager<C>) -> Self {
        Self::inherit(Some(transaction))
    }

    /// Joins `transaction` when present, otherwise starts a new one.
    pub fn inherit(transaction: Option<&'a mut TransactionManager<C>>) -> Self {
        Self {
            transaction,
            ..Self::new()
        }
    }

    /// Runs `handler` on failure. It may await, e.g. to record the failure
    /// elsewhere, and returns the error `run` should propagate.
    pub fn with_error_handler<H, Fut>(mut self, handler: H) -> Self
    where
        H: FnOnce(E) -> Fut + Send + 'a,
        Fut: Future<Output = E> + Send + 'a,
    {
        self.error_handler = Some(Box::new(move |err| Box::pin(handler(err)) as BoxFuture<'a, E>));
        self
    }

    /// Isolation level for a new physical transaction. Ignored when joining.
    pub fn with_isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = Some(isolation);
        self
    }
}

impl<C: TransactionalConnection, E> Default for RunOptions<'_, C, E> {
    fn default() -> Self {
        Self::new()
    }
}

/// A joined invocation's hold on the shared transaction.
///
/// Restores the depth when dropped. Unless the unit of work finished
/// successfully, it also marks the transaction rollback-only, which covers a
/// joined future that is cancelled midway.
struct JoinedScope<'a, C: TransactionalConnection> {
    tx: &'a mut TransactionManager<C>,
    /// `None` until the unit of work resolves, then whether it succeeded.
    outcome: Option<bool>,
}

impl<'a, C: TransactionalConnection> JoinedScope<'a, C> {
    fn enter(tx: &'a mut TransactionManager<C>) -> Self {
        tx.depth += 1;
        Self { tx, outcome: None }
    }
}

impl<C: TransactionalConnection> Deref for JoinedScope<'_, C> {
    type Target = TransactionManager<C>;

    fn deref(&self) -> &Self::Target {
        self.tx
    }
}

impl<C: TransactionalConnection> DerefMut for JoinedScope<'_, C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.tx
    }
}

impl<C: TransactionalConnection> Drop for JoinedScope<'_, C> {
    fn drop(&mut self) {
        match self.outcome {
            Some(true) => {}
            Some(false) => self.tx.mark_rollback_only(),
            None => {
                warn!(tx_id = %self.tx.id(), depth = self.tx.depth, "Joined unit of work cancelled, transaction marked rollback-only");
                self.tx.mark_rollback_only();
            }
        }
        self.tx.depth -= 1;
    }
}

/// Executes units of work atomically, letting nested invocations join the
/// outermost physical transaction.
///
/// An invocation given a [`TransactionManager`] through its options joins it;
/// one given nothing begins, and later commits or rolls back, its own physical
/// transaction. There is no ambient state: nesting only happens when the
/// caller forwards its manager.
pub struct TransactionCoordinator<C: TransactionalConnection> {
    connection: Arc<C>,
    events: Arc<dyn EventBus>,
}

impl<C: TransactionalConnection> Clone for TransactionCoordinator<C> {
    fn clone(&self) -> Self {
        Self {
            connection: Arc::clone(&self.connection),
            events: Arc::clone(&self.events),
        }
    }
}

impl<C: TransactionalConnection> TransactionCoordinator<C> {
    pub fn new(connection: C, events: Arc<dyn EventBus>) -> Self {
        Self {
            connection: Arc::new(connection),
            events,
        }
    }

    /// Returns a reference to the underlying connection.
    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// Runs `work` atomically.
    ///
    /// Outermost invocations commit when `work` succeeds and roll back when
    /// it fails. Joined invocations never commit or roll back; a failure, or
    /// a joined future dropped before it finishes, marks the shared
    /// transaction rollback-only, so the outermost invocation rolls back even
    /// if it returns `Ok` (reported as [`RepoError::RollbackOnly`]).
    ///
    /// Events emitted through the manager are published only after the
    /// outermost commit. No retries are attempted.
    pub async fn run<T, E, F>(&self, options: RunOptions<'_, C, E>, work: F) -> Result<T, E>
    where
        F: AsyncFnOnce(&mut TransactionManager<C>) -> Result<T, E>,
        E: From<RepoError> + fmt::Display,
    {
        let RunOptions {
            transaction,
            error_handler,
            isolation,
        } = options;

        match transaction {
            Some(tx) => {
                if let Some(level) = isolation {
                    debug!(tx_id = %tx.id(), %level, "Isolation level ignored when joining a transaction");
                }
                Self::run_joined(tx, error_handler, work).await
            }
            None => self.run_outermost(isolation, error_handler, work).await,
        }
    }

    async fn run_joined<T, E, F>(
        tx: &mut TransactionManager<C>,
        error_handler: Option<ErrorHandler<'_, E>>,
        work: F,
    ) -> Result<T, E>
    where
        F: AsyncFnOnce(&mut TransactionManager<C>) -> Result<T, E>,
        E: fmt::Display,
    {
        let mut scope = JoinedScope::enter(tx);
        let (tx_id, depth) = (scope.id(), scope.depth());
        debug!(%tx_id, depth, "Joined transaction");

        let result = work(&mut *scope).await;
        scope.outcome = Some(result.is_ok());
        drop(scope);

        match result {
            Ok(value) => Ok(value),
            Err(err) => {
                debug!(%tx_id, depth, error = %err, "Joined unit of work failed, transaction marked rollback-only");
                Err(handle_error(error_handler, err, tx_id, depth).await)
            }
        }
    }

    async fn run_outermost<T, E, F>(
        &self,
        isolation: Option<IsolationLevel>,
        error_handler: Option<ErrorHandler<'_, E>>,
        work: F,
    ) -> Result<T, E>
    where
        F: AsyncFnOnce(&mut TransactionManager<C>) -> Result<T, E>,
        E: From<RepoError> + fmt::Display,
    {
        let handle = self.connection.begin(isolation).await?;
        let mut tx = TransactionManager::<C>::new(handle);
        let tx_id = tx.id();
        debug!(%tx_id, isolation = ?isolation, "Began transaction");

        let result = work(&mut tx).await;
        let (handle, events, rollback_only) = tx.into_parts();

        match result {
            Ok(value) if !rollback_only => {
                self.connection.commit(handle).await?;
                debug!(%tx_id, events = events.len(), "Committed transaction");
                self.publish(tx_id, &events).await;
                Ok(value)
            }
            Ok(_) => {
                warn!(%tx_id, "Unit of work succeeded but a joined unit of work failed, rolling back");
                self.rollback(tx_id, handle).await;
                Err(RepoError::RollbackOnly.into())
            }
            Err(err) => {
                let err = handle_error(error_handler, err, tx_id, 0).await;
                self.rollback(tx_id, handle).await;
                Err(err)
            }
        }
    }

    // A failed rollback is logged; the unit of work's error is what the caller sees.
    async fn rollback(&self, tx_id: Uuid, handle: C::Handle) {
        match self.connection.rollback(handle).await {
            Ok(()) => debug!(%tx_id, "Rolled back transaction"),
            Err(e) => error!(%tx_id, error = %e, "Rollback failed"),
        }
    }

    async fn publish(&self, tx_id: Uuid, events: &[DomainEvent]) {
        for event in events {
            if let Err(e) = self.events.publish(event).await {
                warn!(%tx_id, event = %event.name, error = %e, "Failed to publish event");
            }
        }
    }
}

async fn handle_error<E: fmt::Display>(
    handler: Option<ErrorHandler<'_, E>>,
    err: E,
    tx_id: Uuid,
    depth: usize,
) -> E {
    let Some(handler) = handler else {
        return err;
    };

    let original = err.to_string();
    let err = handler(err).await;
    debug!(%tx_id, depth, %original, propagated = %err, "Error handler ran");
    err
}
