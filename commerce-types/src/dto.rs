//! Data Transfer Objects (DTOs) for service inputs and list results.

use serde::{Deserialize, Serialize};

use crate::domain::Metadata;

// ─────────────────────────────────────────────────────────────────────────────
// Listing
// ─────────────────────────────────────────────────────────────────────────────

/// Offset pagination for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Number of rows to skip
    #[serde(default)]
    pub skip: i64,
    /// Maximum number of rows to return
    #[serde(default = "default_take")]
    pub take: i64,
}

fn default_take() -> i64 {
    Pagination::DEFAULT_TAKE
}

impl Pagination {
    pub const DEFAULT_TAKE: i64 = 20;

    pub fn new(skip: i64, take: i64) -> Self {
        Self {
            skip: skip.max(0),
            take: take.max(0),
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            skip: 0,
            take: Self::DEFAULT_TAKE,
        }
    }
}

/// Free-text filter applied to list queries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListFilter {
    /// Case-insensitive substring match
    pub q: Option<String>,
}

impl ListFilter {
    pub fn q(q: impl Into<String>) -> Self {
        Self { q: Some(q.into()) }
    }

    /// Returns the search term as a SQL `LIKE` pattern, or `%` when unset.
    ///
    /// `%`, `_` and `\` in the term match literally; queries must declare
    /// `ESCAPE '\'`.
    pub fn like_pattern(&self) -> String {
        match self.q.as_deref().map(str::trim) {
            Some(q) if !q.is_empty() => {
                let mut pattern = String::with_capacity(q.len() + 2);
                pattern.push('%');
                for c in q.to_lowercase().chars() {
                    if matches!(c, '%' | '_' | '\\') {
                        pattern.push('\\');
                    }
                    pattern.push(c);
                }
                pattern.push('%');
                pattern
            }
            _ => "%".to_string(),
        }
    }
}

/// A page of results plus the total number of matching rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub count: i64,
    pub skip: i64,
    pub take: i64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Currency DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to update a currency.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCurrencyRequest {
    pub includes_tax: Option<bool>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Customer DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to create a customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCustomerRequest {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Customer group DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to create a customer group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCustomerGroupRequest {
    pub name: String,
    pub metadata: Option<Metadata>,
}

/// Request to update a customer group.
///
/// `metadata` is merged into the stored metadata; `null` values delete keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCustomerGroupRequest {
    pub name: Option<String>,
    pub metadata: Option<Metadata>,
}
