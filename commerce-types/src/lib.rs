//! # Commerce Types
//!
//! Domain types and port traits for the commerce backend.
//! This crate has ZERO external IO dependencies - only data structures,
//! business rules, and trait definitions.
//!
//! ## Architecture
//!
//! This crate represents the **innermost core** of the hexagonal architecture:
//! - `domain/` - Pure domain types (Currency, Customer, CustomerGroup, events)
//! - `ports/` - Trait definitions that adapters must implement
//! - `dto/` - Service inputs and list results
//! - `error/` - Domain, repository and application error types

pub mod domain;
pub mod dto;
pub mod error;
pub mod ports;

// Re-export commonly used types
pub use domain::{
    Currency, Customer, CustomerGroup, CustomerGroupId, CustomerId, DomainEvent, Metadata,
};
pub use dto::*;
pub use error::{AppError, DomainError, EventError, RepoError};
pub use ports::{
    CurrencyRepository, CustomerGroupRepository, CustomerRepository, EventBus, IsolationLevel,
    RepositoryProvider, TransactionalConnection,
};
