//! Currency Application Service

use commerce_types::domain::event::names;
use commerce_types::{
    AppError, Currency, CurrencyRepository, DomainEvent, ListFilter, Page, Pagination,
    RepositoryProvider, TransactionalConnection, UpdateCurrencyRequest,
};
use serde_json::json;

use super::atomically;
use crate::transaction::{TransactionCoordinator, TransactionManager};

/// Application service for currencies.
///
/// Currencies are seeded by migrations; they can be read and have their tax
/// settings changed, but not created or deleted.
pub struct CurrencyService<C: TransactionalConnection> {
    coordinator: TransactionCoordinator<C>,
}

impl<C> CurrencyService<C>
where
    C: TransactionalConnection,
    C::Handle: RepositoryProvider,
{
    pub fn new(coordinator: TransactionCoordinator<C>) -> Self {
        Self { coordinator }
    }

    /// Gets a currency by code. The code is matched case-insensitively.
    #[tracing::instrument(skip(self, tx))]
    pub async fn retrieve_by_code(
        &self,
        tx: Option<&mut TransactionManager<C>>,
        code: &str,
    ) -> Result<Currency, AppError> {
        let code = Currency::normalize_code(code);

        atomically(&self.coordinator, tx, async |tx| {
            tx.currencies().find_by_code(&code).await?.ok_or_else(|| {
                AppError::NotFound(format!("Currency with code {} was not found", code))
            })
        })
        .await
    }

    /// Lists currencies matching `filter`, with the total match count.
    #[tracing::instrument(skip(self, tx))]
    pub async fn list_and_count(
        &self,
        tx: Option<&mut TransactionManager<C>>,
        filter: ListFilter,
        page: Pagination,
    ) -> Result<Page<Currency>, AppError> {
        atomically(&self.coordinator, tx, async |tx| {
            let items = tx.currencies().list(&filter, page).await?;
            let count = tx.currencies().count(&filter).await?;

            Ok(Page {
                items,
                count,
                skip: page.skip,
                take: page.take,
            })
        })
        .await
    }

    /// Updates a currency's tax settings.
    #[tracing::instrument(skip(self, tx))]
    pub async fn update(
        &self,
        tx: Option<&mut TransactionManager<C>>,
        code: &str,
        req: UpdateCurrencyRequest,
    ) -> Result<Currency, AppError> {
        atomically(&self.coordinator, tx, async |tx| {
            let mut currency = self.retrieve_by_code(Some(&mut *tx), code).await?;

            if let Some(includes_tax) = req.includes_tax {
                currency.includes_tax = includes_tax;
            }

            tx.currencies().save(&currency).await?;
            tx.emit(DomainEvent::new(
                names::CURRENCY_UPDATED,
                json!({ "code": currency.code }),
            ));

            Ok(currency)
        })
        .await
    }
}
