//! Transactional connection port.
//!
//! The database layer the transaction coordinator drives. Adapters wrap a
//! connection pool; the `Handle` they hand out is a live session bound to one
//! physical transaction.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RepoError;

/// SQL transaction isolation levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// Returns the level as it appears in `SET TRANSACTION ISOLATION LEVEL`.
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// A connection capable of opening physical transactions.
///
/// `commit` and `rollback` consume the handle, so a physical transaction ends
/// exactly once. Dropping a handle without either must roll back.
#[async_trait::async_trait]
pub trait TransactionalConnection: Send + Sync + 'static {
    /// Live session bound to one physical transaction.
    type Handle: Send + 'static;

    /// Begins a new physical transaction.
    async fn begin(&self, isolation: Option<IsolationLevel>) -> Result<Self::Handle, RepoError>;

    /// Commits the physical transaction.
    async fn commit(&self, handle: Self::Handle) -> Result<(), RepoError>;

    /// Rolls back the physical transaction.
    async fn rollback(&self, handle: Self::Handle) -> Result<(), RepoError>;
}
