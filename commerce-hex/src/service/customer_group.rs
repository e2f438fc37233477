//! Customer Group Application Service
//!
//! Group management plus membership. Operations that touch memberships
//! first load the group through [`CustomerGroupService::retrieve`], joining
//! the same transaction, so a missing group fails before anything is written.

use commerce_types::domain::event::names;
use commerce_types::{
    AppError, CreateCustomerGroupRequest, Customer, CustomerGroup, CustomerGroupId,
    CustomerGroupRepository, CustomerId, CustomerRepository, DomainEvent, ListFilter, Page,
    Pagination, RepositoryProvider, TransactionalConnection, UpdateCustomerGroupRequest,
};
use serde_json::json;

use super::atomically;
use crate::transaction::{TransactionCoordinator, TransactionManager};

/// Application service for customer groups.
pub struct CustomerGroupService<C: TransactionalConnection> {
    coordinator: TransactionCoordinator<C>,
}

impl<C> CustomerGroupService<C>
where
    C: TransactionalConnection,
    C::Handle: RepositoryProvider,
{
    pub fn new(coordinator: TransactionCoordinator<C>) -> Self {
        Self { coordinator }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Group Operations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Creates a group. Names are unique.
    #[tracing::instrument(skip(self, tx))]
    pub async fn create(
        &self,
        tx: Option<&mut TransactionManager<C>>,
        req: CreateCustomerGroupRequest,
    ) -> Result<CustomerGroup, AppError> {
        let group = CustomerGroup::new(&req.name, req.metadata)?;

        atomically(&self.coordinator, tx, async |tx| {
            ensure_name_available(tx, &group.name).await?;

            tx.customer_groups().save(&group).await?;
            tx.emit(DomainEvent::new(
                names::CUSTOMER_GROUP_CREATED,
                json!({ "id": group.id }),
            ));

            Ok(())
        })
        .await?;

        Ok(group)
    }

    /// Gets a group by ID.
    #[tracing::instrument(skip(self, tx))]
    pub async fn retrieve(
        &self,
        tx: Option<&mut TransactionManager<C>>,
        id: CustomerGroupId,
    ) -> Result<CustomerGroup, AppError> {
        atomically(&self.coordinator, tx, async |tx| {
            tx.customer_groups().find(id).await?.ok_or_else(|| {
                AppError::NotFound(format!("CustomerGroup with id {} was not found", id))
            })
        })
        .await
    }

    /// Renames a group and/or merges metadata into it.
    #[tracing::instrument(skip(self, tx))]
    pub async fn update(
        &self,
        tx: Option<&mut TransactionManager<C>>,
        id: CustomerGroupId,
        req: UpdateCustomerGroupRequest,
    ) -> Result<CustomerGroup, AppError> {
        atomically(&self.coordinator, tx, async |tx| {
            let mut group = self.retrieve(Some(&mut *tx), id).await?;

            if let Some(name) = &req.name {
                if name.trim() != group.name {
                    ensure_name_available(tx, name.trim()).await?;
                }
                group.rename(name)?;
            }
            if let Some(metadata) = &req.metadata {
                group.merge_metadata(metadata.clone());
            }
            group.touch();

            tx.customer_groups().save(&group).await?;
            tx.emit(DomainEvent::new(
                names::CUSTOMER_GROUP_UPDATED,
                json!({ "id": group.id }),
            ));

            Ok(group)
        })
        .await
    }

    /// Deletes a group and its memberships. Deleting a missing group succeeds.
    #[tracing::instrument(skip(self, tx))]
    pub async fn delete(
        &self,
        tx: Option<&mut TransactionManager<C>>,
        id: CustomerGroupId,
    ) -> Result<(), AppError> {
        atomically(&self.coordinator, tx, async |tx| {
            if tx.customer_groups().delete(id).await? {
                tx.emit(DomainEvent::new(
                    names::CUSTOMER_GROUP_DELETED,
                    json!({ "id": id }),
                ));
            }
            Ok(())
        })
        .await
    }

    /// Lists groups matching `filter`, with the total match count.
    #[tracing::instrument(skip(self, tx))]
    pub async fn list_and_count(
        &self,
        tx: Option<&mut TransactionManager<C>>,
        filter: ListFilter,
        page: Pagination,
    ) -> Result<Page<CustomerGroup>, AppError> {
        atomically(&self.coordinator, tx, async |tx| {
            let items = tx.customer_groups().list(&filter, page).await?;
            let count = tx.customer_groups().count(&filter).await?;

            Ok(Page {
                items,
                count,
                skip: page.skip,
                take: page.take,
            })
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Membership Operations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Adds customers to a group. Every customer must exist; existing
    /// memberships are left as they are.
    #[tracing::instrument(skip(self, tx))]
    pub async fn add_customers(
        &self,
        tx: Option<&mut TransactionManager<C>>,
        id: CustomerGroupId,
        customer_ids: &[CustomerId],
    ) -> Result<CustomerGroup, AppError> {
        atomically(&self.coordinator, tx, async |tx| {
            let group = self.retrieve(Some(&mut *tx), id).await?;

            let mut missing = Vec::new();
            for customer_id in customer_ids {
                if tx.customers().find(*customer_id).await?.is_none() {
                    missing.push(customer_id.to_string());
                }
            }
            if !missing.is_empty() {
                return Err(AppError::NotFound(format!(
                    "The following customer ids do not exist: {}",
                    missing.join(", ")
                )));
            }

            tx.customer_groups()
                .add_customers(id, customer_ids)
                .await?;

            Ok(group)
        })
        .await
    }

    /// Removes customers from a group. Non-members are ignored.
    #[tracing::instrument(skip(self, tx))]
    pub async fn remove_customers(
        &self,
        tx: Option<&mut TransactionManager<C>>,
        id: CustomerGroupId,
        customer_ids: &[CustomerId],
    ) -> Result<CustomerGroup, AppError> {
        atomically(&self.coordinator, tx, async |tx| {
            let group = self.retrieve(Some(&mut *tx), id).await?;

            tx.customer_groups()
                .remove_customers(id, customer_ids)
                .await?;

            Ok(group)
        })
        .await
    }

    /// Lists a group's members ordered by email.
    #[tracing::instrument(skip(self, tx))]
    pub async fn list_customers(
        &self,
        tx: Option<&mut TransactionManager<C>>,
        id: CustomerGroupId,
    ) -> Result<Vec<Customer>, AppError> {
        atomically(&self.coordinator, tx, async |tx| {
            self.retrieve(Some(&mut *tx), id).await?;

            Ok(tx.customer_groups().list_customers(id).await?)
        })
        .await
    }

    /// Creates a group and adds customers to it as one unit of work.
    ///
    /// If any customer is missing the group is not created either.
    #[tracing::instrument(skip(self, tx))]
    pub async fn create_with_customers(
        &self,
        tx: Option<&mut TransactionManager<C>>,
        req: CreateCustomerGroupRequest,
        customer_ids: &[CustomerId],
    ) -> Result<CustomerGroup, AppError> {
        atomically(&self.coordinator, tx, async |tx| {
            let group = self.create(Some(&mut *tx), req.clone()).await?;
            self.add_customers(Some(&mut *tx), group.id, customer_ids)
                .await
        })
        .await
    }
}

async fn ensure_name_available<C>(
    tx: &mut TransactionManager<C>,
    name: &str,
) -> Result<(), AppError>
where
    C: TransactionalConnection,
    C::Handle: RepositoryProvider,
{
    if tx.customer_groups().find_by_name(name).await?.is_some() {
        return Err(AppError::Conflict(format!(
            "A customer group with the name {} already exists",
            name
        )));
    }
    Ok(())
}
