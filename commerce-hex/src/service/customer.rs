//! Customer Application Service

use commerce_types::domain::event::names;
use commerce_types::{
    AppError, CreateCustomerRequest, Customer, CustomerId, CustomerRepository, DomainEvent, Page,
    Pagination, RepositoryProvider, TransactionalConnection,
};
use serde_json::json;

use super::atomically;
use crate::transaction::{TransactionCoordinator, TransactionManager};

/// Application service for customers.
pub struct CustomerService<C: TransactionalConnection> {
    coordinator: TransactionCoordinator<C>,
}

impl<C> CustomerService<C>
where
    C: TransactionalConnection,
    C::Handle: RepositoryProvider,
{
    pub fn new(coordinator: TransactionCoordinator<C>) -> Self {
        Self { coordinator }
    }

    /// Creates a customer. Emails are unique, case-insensitively.
    #[tracing::instrument(skip(self, tx))]
    pub async fn create(
        &self,
        tx: Option<&mut TransactionManager<C>>,
        req: CreateCustomerRequest,
    ) -> Result<Customer, AppError> {
        let customer = Customer::new(&req.email, req.first_name, req.last_name)?;

        atomically(&self.coordinator, tx, async |tx| {
            if tx
                .customers()
                .find_by_email(&customer.email)
                .await?
                .is_some()
            {
                return Err(AppError::Conflict(format!(
                    "A customer with the email {} already exists",
                    customer.email
                )));
            }

            tx.customers().save(&customer).await?;
            tx.emit(DomainEvent::new(
                names::CUSTOMER_CREATED,
                json!({ "id": customer.id, "email": customer.email }),
            ));

            Ok(())
        })
        .await?;

        Ok(customer)
    }

    /// Gets a customer by ID.
    #[tracing::instrument(skip(self, tx))]
    pub async fn retrieve(
        &self,
        tx: Option<&mut TransactionManager<C>>,
        id: CustomerId,
    ) -> Result<Customer, AppError> {
        atomically(&self.coordinator, tx, async |tx| {
            tx.customers().find(id).await?.ok_or_else(|| {
                AppError::NotFound(format!("Customer with id {} was not found", id))
            })
        })
        .await
    }

    /// Lists customers ordered by email, with the total count.
    #[tracing::instrument(skip(self, tx))]
    pub async fn list_and_count(
        &self,
        tx: Option<&mut TransactionManager<C>>,
        page: Pagination,
    ) -> Result<Page<Customer>, AppError> {
        atomically(&self.coordinator, tx, async |tx| {
            let items = tx.customers().list(page).await?;
            let count = tx.customers().count().await?;

            Ok(Page {
                items,
                count,
                skip: page.skip,
                take: page.take,
            })
        })
        .await
    }
}
