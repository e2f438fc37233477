//! Database row types shared by the SQLite and PostgreSQL adapters.
//!
//! Identifiers are stored as text in both backends; timestamps and JSON use
//! each backend's native encoding through sqlx.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

use commerce_types::{
    Currency, Customer, CustomerGroup, CustomerGroupId, CustomerId, Metadata, RepoError,
};

// ─────────────────────────────────────────────────────────────────────────────
// Database row structs (derive FromRow for automatic mapping)
// ─────────────────────────────────────────────────────────────────────────────

/// Currency row from database.
#[derive(FromRow)]
pub struct DbCurrency {
    pub code: String,
    pub symbol: String,
    pub symbol_native: String,
    pub name: String,
    pub includes_tax: bool,
}

impl DbCurrency {
    pub fn into_domain(self) -> Currency {
        Currency {
            code: self.code,
            symbol: self.symbol,
            symbol_native: self.symbol_native,
            name: self.name,
            includes_tax: self.includes_tax,
        }
    }
}

/// Customer row from database.
#[derive(FromRow)]
pub struct DbCustomer {
    pub id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DbCustomer {
    pub fn into_domain(self) -> Result<Customer, RepoError> {
        Ok(Customer {
            id: CustomerId::from_uuid(parse_uuid(&self.id)?),
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            created_at: self.created_at,
        })
    }
}

/// Customer group row from database.
#[derive(FromRow)]
pub struct DbCustomerGroup {
    pub id: String,
    pub name: String,
    pub metadata: Option<Json<Metadata>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbCustomerGroup {
    pub fn into_domain(self) -> Result<CustomerGroup, RepoError> {
        Ok(CustomerGroup {
            id: CustomerGroupId::from_uuid(parse_uuid(&self.id)?),
            name: self.name,
            metadata: self.metadata.map(|Json(metadata)| metadata),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Row count result.
#[derive(FromRow)]
pub struct DbCount {
    pub count: i64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn parse_uuid(s: &str) -> Result<Uuid, RepoError> {
    Uuid::parse_str(s).map_err(|e| RepoError::Database(format!("Invalid UUID '{}': {}", s, e)))
}

/// Maps a sqlx error to a repository error. Unique violations become conflicts.
pub fn db_error(err: sqlx::Error) -> RepoError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepoError::Conflict(db.message().to_string())
        }
        _ => RepoError::Database(err.to_string()),
    }
}

/// Maps a failure to begin, commit or roll back a transaction.
pub fn tx_error(err: sqlx::Error) -> RepoError {
    RepoError::Transaction(err.to_string())
}
