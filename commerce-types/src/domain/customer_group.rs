//! Customer group domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::DomainError;

/// Free-form key/value data attached to an entity.
pub type Metadata = Map<String, Value>;

/// Unique identifier for a CustomerGroup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerGroupId(Uuid);

impl CustomerGroupId {
    /// Creates a new random CustomerGroupId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a CustomerGroupId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CustomerGroupId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CustomerGroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for CustomerGroupId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A named set of customers, used for pricing and discounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerGroup {
    pub id: CustomerGroupId,
    /// Unique across groups
    pub name: String,
    pub metadata: Option<Metadata>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CustomerGroup {
    /// Creates a new customer group.
    ///
    /// # Validation
    /// - Name cannot be empty
    pub fn new(name: &str, metadata: Option<Metadata>) -> Result<Self, DomainError> {
        let name = Self::validate_name(name)?;
        let now = Utc::now();

        Ok(Self {
            id: CustomerGroupId::new(),
            name,
            metadata,
            created_at: now,
            updated_at: now,
        })
    }

    /// Renames the group.
    pub fn rename(&mut self, name: &str) -> Result<(), DomainError> {
        self.name = Self::validate_name(name)?;
        Ok(())
    }

    /// Merges `changes` into the existing metadata.
    ///
    /// Keys with a `null` value are removed; every other key overwrites the
    /// stored value. An empty result clears the metadata entirely.
    pub fn merge_metadata(&mut self, changes: Metadata) {
        let mut merged = self.metadata.take().unwrap_or_default();
        for (key, value) in changes {
            if value.is_null() {
                merged.remove(&key);
            } else {
                merged.insert(key, value);
            }
        }
        self.metadata = (!merged.is_empty()).then_some(merged);
    }

    /// Marks the group as modified now.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    fn validate_name(name: &str) -> Result<String, DomainError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::ValidationError(
                "Customer group name cannot be empty".into(),
            ));
        }
        Ok(name.to_string())
    }
}
