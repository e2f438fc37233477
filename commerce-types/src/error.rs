//! Error types for the commerce backend.

/// Domain-level errors (business rule violations).
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Repository-level errors (data access and transaction failures).
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Database error: {0}")]
    Database(String),

    /// Beginning, committing or rolling back a physical transaction failed.
    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Entity not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),

    /// A joined unit of work failed but the outermost one returned success.
    /// The physical transaction was rolled back regardless.
    #[error("Transaction rolled back: a nested unit of work failed")]
    RollbackOnly,
}

/// Errors raised by an event bus while publishing.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("No subscribers for event {0}")]
    NoSubscribers(String),

    #[error("Event bus unavailable: {0}")]
    Unavailable(String),
}

/// Application-level errors returned by the services.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Domain(DomainError::ValidationError(msg)) => AppError::BadRequest(msg),
            RepoError::Domain(e) => AppError::BadRequest(e.to_string()),
            RepoError::NotFound => AppError::NotFound("Resource not found".into()),
            RepoError::Conflict(e) => AppError::Conflict(e),
            RepoError::Database(e) => AppError::Internal(e),
            RepoError::Transaction(e) => AppError::Internal(e),
            RepoError::RollbackOnly => AppError::Internal(RepoError::RollbackOnly.to_string()),
        }
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}
