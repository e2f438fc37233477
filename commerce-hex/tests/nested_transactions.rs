//! Integration tests for nested transactions against SQLite.
//!
//! A counting wrapper around the SQLite adapter records how many physical
//! transactions were begun, committed and rolled back, so each scenario can
//! assert both the persisted rows and the transaction boundaries.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use commerce_hex::{RunOptions, TracingEventBus, TransactionCoordinator, TransactionManager};
use commerce_repo::SqliteRepo;
use commerce_types::{
    AppError, Customer, CustomerRepository, IsolationLevel, Pagination, RepoError,
    TransactionalConnection,
};

struct CountingConnection<C> {
    inner: C,
    begins: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

impl<C> CountingConnection<C> {
    fn new(inner: C) -> Self {
        Self {
            inner,
            begins: AtomicUsize::new(0),
            commits: AtomicUsize::new(0),
            rollbacks: AtomicUsize::new(0),
        }
    }

    fn counts(&self) -> (usize, usize, usize) {
        (
            self.begins.load(Ordering::SeqCst),
            self.commits.load(Ordering::SeqCst),
            self.rollbacks.load(Ordering::SeqCst),
        )
    }
}

#[async_trait]
impl<C: TransactionalConnection> TransactionalConnection for CountingConnection<C> {
    type Handle = C::Handle;

    async fn begin(&self, isolation: Option<IsolationLevel>) -> Result<C::Handle, RepoError> {
        self.begins.fetch_add(1, Ordering::SeqCst);
        self.inner.begin(isolation).await
    }

    async fn commit(&self, handle: C::Handle) -> Result<(), RepoError> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        self.inner.commit(handle).await
    }

    async fn rollback(&self, handle: C::Handle) -> Result<(), RepoError> {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        self.inner.rollback(handle).await
    }
}

type Connection = CountingConnection<SqliteRepo>;
type Tx = TransactionManager<Connection>;

async fn setup() -> TransactionCoordinator<Connection> {
    let repo = SqliteRepo::new("sqlite::memory:").await.unwrap();
    TransactionCoordinator::new(CountingConnection::new(repo), Arc::new(TracingEventBus))
}

async fn insert(tx: &mut Tx, email: &str) -> Result<(), AppError> {
    let customer = Customer::new(email, None, None)?;
    tx.customers().save(&customer).await?;
    Ok(())
}

/// Emails of all committed customers, read in a fresh transaction.
async fn committed_emails(coordinator: &TransactionCoordinator<Connection>) -> Vec<String> {
    let customers: Result<Vec<Customer>, AppError> = coordinator
        .run(RunOptions::new(), async |tx: &mut Tx| {
            Ok(tx.customers().list(Pagination::new(0, 100)).await?)
        })
        .await;
    customers
        .unwrap()
        .into_iter()
        .map(|c| c.email)
        .collect()
}

#[tokio::test]
async fn test_single_unit_commits() {
    let coordinator = setup().await;

    let result = coordinator
        .run(RunOptions::new(), async |tx: &mut Tx| {
            insert(tx, "a@example.com").await
        })
        .await;

    assert!(result.is_ok());
    assert_eq!(coordinator.connection().counts(), (1, 1, 0));
    assert_eq!(committed_emails(&coordinator).await, ["a@example.com"]);
}

#[tokio::test]
async fn test_joined_unit_commits_with_outer() {
    let coordinator = setup().await;

    let result = coordinator
        .run(RunOptions::new(), async |tx: &mut Tx| {
            insert(tx, "a@example.com").await?;
            coordinator
                .run(RunOptions::joined(tx), async |tx: &mut Tx| {
                    insert(tx, "b@example.com").await
                })
                .await
        })
        .await;

    assert!(result.is_ok());
    assert_eq!(coordinator.connection().counts(), (1, 1, 0));
    assert_eq!(
        committed_emails(&coordinator).await,
        ["a@example.com", "b@example.com"]
    );
}

#[tokio::test]
async fn test_single_unit_failure_rolls_back() {
    let coordinator = setup().await;

    let result: Result<(), AppError> = coordinator
        .run(RunOptions::new(), async |tx: &mut Tx| {
            insert(tx, "a@example.com").await?;
            Err(AppError::BadRequest("boom".into()))
        })
        .await;

    assert!(matches!(result, Err(AppError::BadRequest(msg)) if msg == "boom"));
    assert_eq!(coordinator.connection().counts(), (1, 0, 1));
    assert!(committed_emails(&coordinator).await.is_empty());
}

#[tokio::test]
async fn test_nested_failure_rolls_back_outer_writes() {
    let coordinator = setup().await;

    let result: Result<(), AppError> = coordinator
        .run(RunOptions::new(), async |tx: &mut Tx| {
            insert(tx, "a@example.com").await?;
            coordinator
                .run(RunOptions::joined(tx), async |tx: &mut Tx| {
                    insert(tx, "b@example.com").await?;
                    Err(AppError::BadRequest("boom".into()))
                })
                .await
        })
        .await;

    assert!(matches!(result, Err(AppError::BadRequest(msg)) if msg == "boom"));
    assert_eq!(coordinator.connection().counts(), (1, 0, 1));
    assert!(committed_emails(&coordinator).await.is_empty());
}

#[tokio::test]
async fn test_nested_error_handler_replacement() {
    let coordinator = setup().await;

    let result: Result<(), AppError> = coordinator
        .run(RunOptions::new(), async |tx: &mut Tx| {
            insert(tx, "a@example.com").await?;
            let options = RunOptions::joined(tx)
                .with_error_handler(|_: AppError| async { AppError::Conflict("custom".into()) });
            coordinator
                .run(options, async |tx: &mut Tx| {
                    insert(tx, "b@example.com").await?;
                    Err(AppError::BadRequest("boom".into()))
                })
                .await
        })
        .await;

    assert!(matches!(result, Err(AppError::Conflict(msg)) if msg == "custom"));
    assert_eq!(coordinator.connection().counts(), (1, 0, 1));
    assert!(committed_emails(&coordinator).await.is_empty());
}

#[tokio::test]
async fn test_database_error_in_joined_unit() {
    let coordinator = setup().await;

    let result: Result<(), AppError> = coordinator
        .run(RunOptions::new(), async |tx: &mut Tx| {
            insert(tx, "a@example.com").await?;
            coordinator
                .run(RunOptions::joined(tx), async |tx: &mut Tx| {
                    insert(tx, "a@example.com").await
                })
                .await
        })
        .await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert_eq!(coordinator.connection().counts(), (1, 0, 1));
    assert!(committed_emails(&coordinator).await.is_empty());
}

#[tokio::test]
async fn test_sequential_runs_are_independent() {
    let coordinator = setup().await;

    let first = coordinator
        .run(RunOptions::new(), async |tx: &mut Tx| {
            insert(tx, "a@example.com").await
        })
        .await;
    let second: Result<(), AppError> = coordinator
        .run(RunOptions::new(), async |tx: &mut Tx| {
            insert(tx, "b@example.com").await?;
            Err(AppError::BadRequest("boom".into()))
        })
        .await;

    assert!(first.is_ok());
    assert!(second.is_err());
    assert_eq!(coordinator.connection().counts(), (2, 1, 1));
    assert_eq!(committed_emails(&coordinator).await, ["a@example.com"]);
}
