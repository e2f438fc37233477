//! PostgreSQL adapter.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Postgres};

use commerce_types::{
    Currency, CurrencyRepository, Customer, CustomerGroup, CustomerGroupId,
    CustomerGroupRepository, CustomerId, CustomerRepository, IsolationLevel, ListFilter,
    Pagination, RepoError, RepositoryProvider, TransactionalConnection,
};

use crate::types::{DbCount, DbCurrency, DbCustomer, DbCustomerGroup, db_error, tx_error};

// ─────────────────────────────────────────────────────────────────────────────
// PostgreSQL Repository
// ─────────────────────────────────────────────────────────────────────────────

/// PostgreSQL connection pool that opens physical transactions.
pub struct PostgresRepo {
    pool: PgPool,
}

/// Executes SQL statements from a migration file, splitting by semicolons.
async fn execute_migration(pool: &PgPool, sql: &str, name: &str) -> Result<(), anyhow::Error> {
    for statement in sql.split(';') {
        let stmt = statement.trim();
        if !stmt.is_empty() {
            sqlx::query(stmt)
                .execute(pool)
                .await
                .map_err(|e| anyhow::anyhow!("Migration {} failed: {}", name, e))?;
        }
    }
    Ok(())
}

/// Runs all database migrations.
async fn run_migrations(pool: &PgPool) -> Result<(), anyhow::Error> {
    execute_migration(
        pool,
        include_str!("../migrations/0001_create_tables_pg.sql"),
        "0001",
    )
    .await?;

    execute_migration(
        pool,
        include_str!("../migrations/0002_seed_currencies.sql"),
        "0002",
    )
    .await?;

    Ok(())
}

impl PostgresRepo {
    /// Creates a new PostgreSQL repository with automatic migration.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Transactions
// ─────────────────────────────────────────────────────────────────────────────

/// A live PostgreSQL session bound to one physical transaction.
///
/// Dropping the session without committing rolls the transaction back.
pub struct PostgresSession {
    tx: sqlx::Transaction<'static, Postgres>,
}

impl PostgresSession {
    /// Returns the underlying connection for ad-hoc queries.
    pub fn connection(&mut self) -> &mut PgConnection {
        &mut self.tx
    }
}

#[async_trait]
impl TransactionalConnection for PostgresRepo {
    type Handle = PostgresSession;

    async fn begin(
        &self,
        isolation: Option<IsolationLevel>,
    ) -> Result<PostgresSession, RepoError> {
        let mut tx = self.pool.begin().await.map_err(tx_error)?;

        // Must be the first statement of the transaction.
        if let Some(level) = isolation {
            let stmt = format!("SET TRANSACTION ISOLATION LEVEL {}", level.as_sql());
            sqlx::query(&stmt)
                .execute(&mut *tx)
                .await
                .map_err(tx_error)?;
        }

        Ok(PostgresSession { tx })
    }

    async fn commit(&self, handle: PostgresSession) -> Result<(), RepoError> {
        handle.tx.commit().await.map_err(tx_error)
    }

    async fn rollback(&self, handle: PostgresSession) -> Result<(), RepoError> {
        handle.tx.rollback().await.map_err(tx_error)
    }
}

impl RepositoryProvider for PostgresSession {
    type Currencies<'h> = PostgresCurrencies<'h>;
    type Customers<'h> = PostgresCustomers<'h>;
    type CustomerGroups<'h> = PostgresCustomerGroups<'h>;

    fn currencies(&mut self) -> PostgresCurrencies<'_> {
        PostgresCurrencies {
            conn: self.connection(),
        }
    }

    fn customers(&mut self) -> PostgresCustomers<'_> {
        PostgresCustomers {
            conn: self.connection(),
        }
    }

    fn customer_groups(&mut self) -> PostgresCustomerGroups<'_> {
        PostgresCustomerGroups {
            conn: self.connection(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Currencies
// ─────────────────────────────────────────────────────────────────────────────

pub struct PostgresCurrencies<'h> {
    conn: &'h mut PgConnection,
}

#[async_trait]
impl CurrencyRepository for PostgresCurrencies<'_> {
    async fn find_by_code(&mut self, code: &str) -> Result<Option<Currency>, RepoError> {
        let row: Option<DbCurrency> = sqlx::query_as(
            r#"SELECT code, symbol, symbol_native, name, includes_tax FROM currencies WHERE code = $1"#,
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
        let rows: Vec<DbCurrency> = sqlx::query_as(
            r#"SELECT code, symbol, symbol_native, name, includes_tax FROM currencies
               WHERE LOWER(code) LIKE $1 ESCAPE '\' OR LOWER(name) LIKE $1 ESCAPE '\'
               ORDER BY code ASC LIMIT $2 OFFSET $3"#,
        )
        .bind(filter.like_pattern())
        .bind(page.take)
        .bind(page.skip)
        .fetch_all(&mut *self.conn)
        .await
        .map_err(db_error)?;

        Ok(rows.into_iter().map(DbCurrency::into_domain).collect())
    }

    async fn count(&mut self, filter: &ListFilter) -> Result<i64, RepoError> {
        let row: DbCount = sqlx::query_as(
            r#"SELECT COUNT(*) AS count FROM currencies WHERE LOWER(code) LIKE $1 ESCAPE '\' OR LOWER(name) LIKE $1 ESCAPE '\'"#,
        )
        .bind(filter.like_pattern())
        .fetch_one(&mut *self.conn)
        .await
        .map_err(db_error)?;

        Ok(row.count)
    }

    async fn save(&mut self, currency: &Currency) -> Result<(), RepoError> {
        let result = sqlx::query(
            r#"UPDATE currencies SET symbol = $1, symbol_native = $2, name = $3, includes_tax = $4 WHERE code = $5"#,
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

pub struct PostgresCustomers<'h> {
    conn: &'h mut PgConnection,
}

#[async_trait]
impl CustomerRepository for PostgresCustomers<'_> {
    async fn find(&mut self, id: CustomerId) -> Result<Option<Customer>, RepoError> {
        let row: Option<DbCustomer> = sqlx::query_as(
            r#"SELECT id, email, first_name, last_name, created_at FROM customers WHERE id = $1"#,
        )
        .bind(id.to_string())
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(db_error)?;

        row.map(DbCustomer::into_domain).transpose()
    }

    async fn find_by_email(&mut self, email: &str) -> Result<Option<Customer>, RepoError> {
        let row: Option<DbCustomer> = sqlx::query_as(
            r#"SELECT id, email, first_name, last_name, created_at FROM customers WHERE email = $1"#,
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
               ORDER BY email ASC LIMIT $1 OFFSET $2"#,
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
            r#"INSERT INTO customers (id, email, first_name, last_name, created_at) VALUES ($1, $2, $3, $4, $5)
               ON CONFLICT (id) DO UPDATE SET
                   email = EXCLUDED.email,
                   first_name = EXCLUDED.first_name,
                   last_name = EXCLUDED.last_name"#,
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

pub struct PostgresCustomerGroups<'h> {
    conn: &'h mut PgConnection,
}

#[async_trait]
impl CustomerGroupRepository for PostgresCustomerGroups<'_> {
    async fn find(&mut self, id: CustomerGroupId) -> Result<Option<CustomerGroup>, RepoError> {
        let row: Option<DbCustomerGroup> = sqlx::query_as(
            r#"SELECT id, name, metadata, created_at, updated_at FROM customer_groups WHERE id = $1"#,
        )
        .bind(id.to_string())
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(db_error)?;

        row.map(DbCustomerGroup::into_domain).transpose()
    }

    async fn find_by_name(&mut self, name: &str) -> Result<Option<CustomerGroup>, RepoError> {
        let row: Option<DbCustomerGroup> = sqlx::query_as(
            r#"SELECT id, name, metadata, created_at, updated_at FROM customer_groups WHERE name = $1"#,
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
               WHERE LOWER(name) LIKE $1 ESCAPE '\'
               ORDER BY name ASC LIMIT $2 OFFSET $3"#,
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
            r#"SELECT COUNT(*) AS count FROM customer_groups WHERE LOWER(name) LIKE $1 ESCAPE '\'"#,
        )
        .bind(filter.like_pattern())
        .fetch_one(&mut *self.conn)
        .await
        .map_err(db_error)?;

        Ok(row.count)
    }

    async fn save(&mut self, group: &CustomerGroup) -> Result<(), RepoError> {
        sqlx::query(
            r#"INSERT INTO customer_groups (id, name, metadata, created_at, updated_at) VALUES ($1, $2, $3, $4, $5)
               ON CONFLICT (id) DO UPDATE SET
                   name = EXCLUDED.name,
                   metadata = EXCLUDED.metadata,
                   updated_at = EXCLUDED.updated_at"#,
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

        sqlx::query(r#"DELETE FROM customer_group_customers WHERE customer_group_id = $1"#)
            .bind(&id_str)
            .execute(&mut *self.conn)
            .await
            .map_err(db_error)?;

        let result = sqlx::query(r#"DELETE FROM customer_groups WHERE id = $1"#)
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
        let ids: Vec<String> = customer_ids.iter().map(ToString::to_string).collect();

        sqlx::query(
            r#"INSERT INTO customer_group_customers (customer_group_id, customer_id)
               SELECT $1, UNNEST($2::TEXT[])
               ON CONFLICT (customer_group_id, customer_id) DO NOTHING"#,
        )
        .bind(id.to_string())
        .bind(ids)
        .execute(&mut *self.conn)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn remove_customers(
        &mut self,
        id: CustomerGroupId,
        customer_ids: &[CustomerId],
    ) -> Result<(), RepoError> {
        let ids: Vec<String> = customer_ids.iter().map(ToString::to_string).collect();

        sqlx::query(
            r#"DELETE FROM customer_group_customers
               WHERE customer_group_id = $1 AND customer_id = ANY($2)"#,
        )
        .bind(id.to_string())
        .bind(ids)
        .execute(&mut *self.conn)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn list_customers(&mut self, id: CustomerGroupId) -> Result<Vec<Customer>, RepoError> {
        let rows: Vec<DbCustomer> = sqlx::query_as(
            r#"SELECT c.id, c.email, c.first_name, c.last_name, c.created_at
               FROM customers c
               JOIN customer_group_customers m ON m.customer_id = c.id
               WHERE m.customer_group_id = $1
               ORDER BY c.email ASC"#,
        )
        .bind(id.to_string())
        .fetch_all(&mut *self.conn)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(DbCustomer::into_domain).collect()
    }
}
