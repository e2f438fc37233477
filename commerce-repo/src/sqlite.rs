//! SQLite adapter.
#![allow(clippy::collapsible_if)]

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::types::Json;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use std::str::FromStr;

use commerce_types::{
    Currency, CurrencyRepository, Customer, CustomerGroup, CustomerGroupId,
    CustomerGroupRepository, CustomerId, CustomerRepository, IsolationLevel, ListFilter,
    Pagination, RepoError, RepositoryProvider, TransactionalConnection,
};

use crate::types::{DbCount, DbCurrency, DbCustomer, DbCustomerGroup, db_error, tx_error};

// ─────────────────────────────────────────────────────────────────────────────
// SQLite Repository
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite connection pool that opens physical transactions.
pub struct SqliteRepo {
    pool: SqlitePool,
}

/// Runs all database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), RepoError> {
    for ddl in [
        include_str!("../migrations/0001_create_tables.sql"),
        include_str!("../migrations/0002_seed_currencies.sql"),
    ] {
        sqlx::query(ddl).execute(pool).await.map_err(db_error)?;
    }
    Ok(())
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

impl SqliteRepo {
    /// Creates a new SQLite repository with automatic migration.
    ///
    /// In-memory databases live inside a single connection, so their pool is
    /// capped at one connection that is never recycled.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Ensure on-disk SQLite target directory exists (no-op for in-memory).
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            // Remove query parameters
            let path = path.split('?').next().unwrap_or(path);
            if path != ":memory:" {
                let p = std::path::Path::new(path);
                if let Some(parent) = p.parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = if is_in_memory(database_url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new().connect_with(options).await?
        };

        run_migrations(&pool).await?;

        Ok(Self { pool })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Transactions
// ─────────────────────────────────────────────────────────────────────────────

/// A live SQLite session bound to one physical transaction.
///
/// Dropping the session without committing rolls the transaction back.
pub struct SqliteSession {
    tx: sqlx::Transaction<'static, Sqlite>,
}

impl SqliteSession {
    /// Returns the underlying connection for ad-hoc queries.
    pub fn connection(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }
}

#[async_trait]
impl TransactionalConnection for SqliteRepo {
    type Handle = SqliteSession;

    async fn begin(&self, isolation: Option<IsolationLevel>) -> Result<SqliteSession, RepoError> {
        if let Some(level) = isolation {
            tracing::debug!(%level, "SQLite transactions are serializable, ignoring isolation level");
        }
        let tx = self.pool.begin().await.map_err(tx_error)?;
        Ok(SqliteSession { tx })
    }

    async fn commit(&self, handle: SqliteSession) -> Result<(), RepoError> {
        handle.tx.commit().await.map_err(tx_error)
    }

    async fn rollback(&self, handle: SqliteSession) -> Result<(), RepoError> {
        handle.tx.rollback().await.map_err(tx_error)
    }
}

impl RepositoryProvider for SqliteSession {
    type Currencies<'h> = SqliteCurrencies<'h>;
    type Customers<'h> = SqliteCustomers<'h>;
    type CustomerGroups<'h> = SqliteCustomerGroups<'h>;

    fn currencies(&mut self) -> SqliteCurrencies<'_> {
        SqliteCurrencies {
            conn: self.connection(),
        }
    }

    fn customers(&mut self) -> SqliteCustomers<'_> {
        SqliteCustomers {
            conn: self.connection(),
        }
    }

    fn customer_groups(&mut self) -> SqliteCustomerGroups<'_> {
        SqliteCustomerGroups {
            conn: self.connection(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Currencies
// ─────────────────────────────────────────────────────────────────────────────

pub struct SqliteCurrencies<'h> {
    conn: &'h mut SqliteConnection,
}

#[async_trait]
impl CurrencyRepository for SqliteCurrencies<'_> {
    async fn find_by_code(&mut self, code: &str) -> Result<Option<Currency>, RepoError> {
        let row: Option<DbCurrency> = sqlx::query_as(
            r#"SELECT code, symbol, symbol_native, name, includes_tax FROM currencies WHERE code = ?"#,
        )
        .bind(code)
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(db_error)?;

        Ok(row.map(DbCurrency::into_domain))
    }

    async fn list(
        &mut self,
        filter: &ListFilter,
        page: Pagination,
    ) -> Result<Vec<Currency>, RepoError> {
        let pattern = filter.like_pattern();

        let rows: Vec<DbCurrency> = sqlx::query_as(
            r#"SELECT code, symbol, symbol_native, name, includes_tax FROM currencies
               WHERE LOWER(code) LIKE ? ESCAPE '\' OR LOWER(name) LIKE ? ESCAPE '\'
               ORDER BY code ASC LIMIT ? OFFSET ?"#,
        )
        .bind(&pattern)
        .bind(&pattern)
        .bind(page.take)
        .bind(page.skip)
        .fetch_all(&mut *self.conn)
        .await
        .map_err(db_error)?;

        Ok(rows.into_iter().map(DbCurrency::into_domain).collect())
    }

    async fn count(&mut self, filter: &ListFilter) -> Result<i64, RepoError> {
        let pattern = filter.like_pattern();

        let row: DbCount = sqlx::query_as(
            r#"SELECT COUNT(*) AS count FROM currencies WHERE LOWER(code) LIKE ? ESCAPE '\' OR LOWER(name) LIKE ? ESCAPE '\'"#,
        )
        .bind(&pattern)
        .bind(&pattern)
        .fetch_one(&mut *self.conn)
        .await
        .map_err(db_error)?;

        Ok(row.count)
    }

    async fn save(&mut self, currency: &Currency) -> Result<(), RepoError> {
        let result = sqlx::query(
            r#"UPDATE currencies SET symbol = ?, symbol_native = ?, name = ?, includes_tax = ? WHERE code = ?"#,
        )
        .bind(&currency.symbol)
        .bind(&currency.symbol_native)
        .bind(&currency.name)
        .bind(currency.includes_tax)
        .bind(&currency.code)
        .execute(&mut *self.conn)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Customers
// ─────────────────────────────────────────────────────────────────────────────

pub struct SqliteCustomers<'h> {
    conn: &'h mut SqliteConnection,
}

#[async_trait]
impl CustomerRepository for SqliteCustomers<'_> {
    async fn find(&mut self, id: CustomerId) -> Result<Option<Customer>, RepoError> {
        let row: Option<DbCustomer> = sqlx::query_as(
            r#"SELECT id, email, first_name, last_name, created_at FROM customers WHERE id = ?"#,
        )
        .bind(id.to_string())
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(db_error)?;

        row.map(DbCustomer::into_domain).transpose()
    }

    async fn find_by_email(&mut self, email: &str) -> Result<Option<Customer>, RepoError> {
        let row: Option<DbCustomer> = sqlx::query_as(
            r#"SELECT id, email, first_name, last_name, created_at FROM customers WHERE email = ?"#,
        )
        .bind(email)
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(db_error)?;

        row.map(DbCustomer::into_domain).transpose()
    }

    async fn list(&mut self, page: Pagination) -> Result<Vec<Customer>, RepoError> {
        let rows: Vec<DbCustomer> = sqlx::query_as(
            r#"SELECT id, email, first_name, last_name, created_at FROM customers
               ORDER BY email ASC LIMIT ? OFFSET ?"#,
        )
        .bind(page.take)
        .bind(page.skip)
        .fetch_all(&mut *self.conn)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(DbCustomer::into_domain).collect()
    }

    async fn count(&mut self) -> Result<i64, RepoError> {
        let row: DbCount = sqlx::query_as(r#"SELECT COUNT(*) AS count FROM customers"#)
            .fetch_one(&mut *self.conn)
            .await
            .map_err(db_error)?;

        Ok(row.count)
    }

    async fn save(&mut self, customer: &Customer) -> Result<(), RepoError> {
        sqlx::query(
            r#"INSERT INTO customers (id, email, first_name, last_name, created_at) VALUES (?, ?, ?, ?, ?)
               ON CONFLICT (id) DO UPDATE SET
                   email = excluded.email,
                   first_name = excluded.first_name,
                   last_name = excluded.last_name"#,
        )
        .bind(customer.id.to_string())
        .bind(&customer.email)
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(customer.created_at)
        .execute(&mut *self.conn)
        .await
        .map_err(db_error)?;

        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Customer groups
// ─────────────────────────────────────────────────────────────────────────────

pub struct SqliteCustomerGroups<'h> {
    conn: &'h mut SqliteConnection,
}

#[async_trait]
impl CustomerGroupRepository for SqliteCustomerGroups<'_> {
    async fn find(&mut self, id: CustomerGroupId) -> Result<Option<CustomerGroup>, RepoError> {
        let row: Option<DbCustomerGroup> = sqlx::query_as(
            r#"SELECT id, name, metadata, created_at, updated_at FROM customer_groups WHERE id = ?"#,
        )
        .bind(id.to_string())
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(db_error)?;

        row.map(DbCustomerGroup::into_domain).transpose()
    }

    async fn find_by_name(&mut self, name: &str) -> Result<Option<CustomerGroup>, RepoError> {
        let row: Option<DbCustomerGroup> = sqlx::query_as(
            r#"SELECT id, name, metadata, created_at, updated_at FROM customer_groups WHERE name = ?"#,
        )
        .bind(name)
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(db_error)?;

        row.map(DbCustomerGroup::into_domain).transpose()
    }

    async fn list(
        &mut self,
        filter: &ListFilter,
        page: Pagination,
    ) -> Result<Vec<CustomerGroup>, RepoError> {
        let rows: Vec<DbCustomerGroup> = sqlx::query_as(
            r#"SELECT id, name, metadata, created_at, updated_at FROM customer_groups
               WHERE LOWER(name) LIKE ? ESCAPE '\'
               ORDER BY name ASC LIMIT ? OFFSET ?"#,
        )
        .bind(filter.like_pattern())
        .bind(page.take)
        .bind(page.skip)
        .fetch_all(&mut *self.conn)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(DbCustomerGroup::into_domain).collect()
    }

    async fn count(&mut self, filter: &ListFilter) -> Result<i64, RepoError> {
        let row: DbCount = sqlx::query_as(
            r#"SELECT COUNT(*) AS count FROM customer_groups WHERE LOWER(name) LIKE ? ESCAPE '\'"#,
        )
        .bind(filter.like_pattern())
        .fetch_one(&mut *self.conn)
        .await
        .map_err(db_error)?;

        Ok(row.count)
    }

    async fn save(&mut self, group: &CustomerGroup) -> Result<(), RepoError> {
        sqlx::query(
            r#"INSERT INTO customer_groups (id, name, metadata, created_at, updated_at) VALUES (?, ?, ?, ?, ?)
               ON CONFLICT (id) DO UPDATE SET
                   name = excluded.name,
                   metadata = excluded.metadata,
                   updated_at = excluded.updated_at"#,
        )
        .bind(group.id.to_string())
        .bind(&group.name)
        .bind(group.metadata.as_ref().map(Json))
        .bind(group.created_at)
        .bind(group.updated_at)
        .execute(&mut *self.conn)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn delete(&mut self, id: CustomerGroupId) -> Result<bool, RepoError> {
        let id_str = id.to_string();

        sqlx::query(r#"DELETE FROM customer_group_customers WHERE customer_group_id = ?"#)
            .bind(&id_str)
            .execute(&mut *self.conn)
            .await
            .map_err(db_error)?;

        let result = sqlx::query(r#"DELETE FROM customer_groups WHERE id = ?"#)
            .bind(&id_str)
            .execute(&mut *self.conn)
            .await
            .map_err(db_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn add_customers(
        &mut self,
        id: CustomerGroupId,
        customer_ids: &[CustomerId],
    ) -> Result<(), RepoError> {
        let id_str = id.to_string();

        for customer_id in customer_ids {
            sqlx::query(
                r#"INSERT INTO customer_group_customers (customer_group_id, customer_id) VALUES (?, ?)
                   ON CONFLICT (customer_group_id, customer_id) DO NOTHING"#,
            )
            .bind(&id_str)
            .bind(customer_id.to_string())
            .execute(&mut *self.conn)
            .await
            .map_err(db_error)?;
        }
        Ok(())
    }

    async fn remove_customers(
        &mut self,
        id: CustomerGroupId,
        customer_ids: &[CustomerId],
    ) -> Result<(), RepoError> {
        let id_str = id.to_string();

        for customer_id in customer_ids {
            sqlx::query(
                r#"DELETE FROM customer_group_customers WHERE customer_group_id = ? AND customer_id = ?"#,
            )
            .bind(&id_str)
            .bind(customer_id.to_string())
            .execute(&mut *self.conn)
            .await
            .map_err(db_error)?;
        }
        Ok(())
    }

    async fn list_customers(&mut self, id: CustomerGroupId) -> Result<Vec<Customer>, RepoError> {
        let rows: Vec<DbCustomer> = sqlx::query_as(
            r#"SELECT c.id, c.email, c.first_name, c.last_name, c.created_at
               FROM customers c
               JOIN customer_group_customers m ON m.customer_id = c.id
               WHERE m.customer_group_id = ?
               ORDER BY c.email ASC"#,
        )
        .bind(id.to_string())
        .fetch_all(&mut *self.conn)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(DbCustomer::into_domain).collect()
    }
}
