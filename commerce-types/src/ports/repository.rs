//! Repository port traits.
//!
//! One trait per entity. Repository values are constructed against a live
//! transaction handle through [`RepositoryProvider`], so every query they issue
//! runs inside that handle's physical transaction.

use crate::domain::{Currency, Customer, CustomerGroup, CustomerGroupId, CustomerId};
use crate::dto::{ListFilter, Pagination};
use crate::error::RepoError;

#[async_trait::async_trait]
pub trait CurrencyRepository: Send {
    /// Finds a currency by its lower-case code.
    async fn find_by_code(&mut self, code: &str) -> Result<Option<Currency>, RepoError>;

    /// Lists currencies ordered by code.
    async fn list(
        &mut self,
        filter: &ListFilter,
        page: Pagination,
    ) -> Result<Vec<Currency>, RepoError>;

    /// Counts currencies matching the filter.
    async fn count(&mut self, filter: &ListFilter) -> Result<i64, RepoError>;

    /// Persists the mutable attributes of an existing currency.
    async fn save(&mut self, currency: &Currency) -> Result<(), RepoError>;
}

#[async_trait::async_trait]
pub trait CustomerRepository: Send {
    async fn find(&mut self, id: CustomerId) -> Result<Option<Customer>, RepoError>;

    async fn find_by_email(&mut self, email: &str) -> Result<Option<Customer>, RepoError>;

    /// Lists customers ordered by email.
    async fn list(&mut self, page: Pagination) -> Result<Vec<Customer>, RepoError>;

    async fn count(&mut self) -> Result<i64, RepoError>;

    /// Inserts or updates the customer. A duplicate email is a `Conflict`.
    async fn save(&mut self, customer: &Customer) -> Result<(), RepoError>;
}

#[async_trait::async_trait]
pub trait CustomerGroupRepository: Send {
    async fn find(&mut self, id: CustomerGroupId) -> Result<Option<CustomerGroup>, RepoError>;

    async fn find_by_name(&mut self, name: &str) -> Result<Option<CustomerGroup>, RepoError>;

    /// Lists groups ordered by name.
    async fn list(
        &mut self,
        filter: &ListFilter,
        page: Pagination,
    ) -> Result<Vec<CustomerGroup>, RepoError>;

    async fn count(&mut self, filter: &ListFilter) -> Result<i64, RepoError>;

    /// Inserts or updates the group. A duplicate name is a `Conflict`.
    async fn save(&mut self, group: &CustomerGroup) -> Result<(), RepoError>;

    /// Deletes the group and its memberships. Returns false if it did not exist.
    async fn delete(&mut self, id: CustomerGroupId) -> Result<bool, RepoError>;

    /// Adds memberships, ignoring ones that already exist.
    async fn add_customers(
        &mut self,
        id: CustomerGroupId,
        customer_ids: &[CustomerId],
    ) -> Result<(), RepoError>;

    async fn remove_customers(
        &mut self,
        id: CustomerGroupId,
        customer_ids: &[CustomerId],
    ) -> Result<(), RepoError>;

    /// Lists member customers ordered by email.
    async fn list_customers(&mut self, id: CustomerGroupId) -> Result<Vec<Customer>, RepoError>;
}

/// Builds entity repositories bound to a transaction handle.
pub trait RepositoryProvider: Send {
    type Currencies<'h>: CurrencyRepository
    where
        Self: 'h;
    type Customers<'h>: CustomerRepository
    where
        Self: 'h;
    type CustomerGroups<'h>: CustomerGroupRepository
    where
        Self: 'h;

    fn currencies(&mut self) -> Self::Currencies<'_>;

    fn customers(&mut self) -> Self::Customers<'_>;

    fn customer_groups(&mut self) -> Self::CustomerGroups<'_>;
}
