//! Customer repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{conflict_or, page_offset, RepositoryError};
use crate::domain::aggregates::customer::normalize_email;
use crate::domain::aggregates::{Address, Customer, CustomerDetails, CustomerDraft};

const CUSTOMER_COLUMNS: &str = "id, name, email, phone, addresses, order_count, total_spent, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: Uuid,
    name: String,
    email: String,
    phone: Option<String>,
    addresses: Json<Vec<Address>>,
    order_count: i32,
    total_spent: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = RepositoryError;

    fn try_from(r: CustomerRow) -> Result<Self, Self::Error> {
        let order_count = u32::try_from(r.order_count)
            .map_err(|_| RepositoryError::DataCorruption(format!("negative order count for customer {}", r.id)))?;
        Ok(Self {
            id: r.id,
            name: r.name,
            email: r.email,
            phone: r.phone,
            addresses: r.addresses.0,
            order_count,
            total_spent: r.total_spent,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Repository for customer database operations.
pub struct CustomerRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CustomerRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List customers, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        search: Option<&str>,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<Customer>, i64), RepositoryError> {
        const WHERE: &str = "WHERE ($1::text IS NULL OR name ILIKE '%' || $1 || '%' OR email ILIKE '%' || $1 || '%' \
             OR phone ILIKE '%' || $1 || '%')";
        let search = search.map(str::trim).filter(|s| !s.is_empty());

        let rows = sqlx::query_as::<_, CustomerRow>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers {WHERE} ORDER BY updated_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(search)
        .bind(i64::from(per_page))
        .bind(page_offset(page, per_page))
        .fetch_all(self.pool)
        .await?;

        let total: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM customers {WHERE}"))
            .bind(search)
            .fetch_one(self.pool)
            .await?;

        let customers = rows.into_iter().map(Customer::try_from).collect::<Result<Vec<_>, _>>()?;
        Ok((customers, total.0))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Customer>, RepositoryError> {
        sqlx::query_as::<_, CustomerRow>(&format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .map(Customer::try_from)
            .transpose()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email is already registered.
    pub async fn insert(&self, customer: &Customer) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        Self::write(&mut tx, customer, false).await?;
        tx.commit().await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the customer no longer exists,
    /// or `RepositoryError::Conflict` if the new email is taken.
    pub async fn update(&self, customer: &Customer) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        Self::write(&mut tx, customer, true).await?;
        tx.commit().await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such customer exists.
    pub async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM customers WHERE id = $1").bind(id).execute(self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Creates or updates the customer behind a placed order and bumps their
    /// order count and lifetime spend.
    ///
    /// The row is created with `ON CONFLICT (email) DO NOTHING` before it is
    /// locked, so concurrent first orders from one email serialize on the
    /// same row instead of racing to insert it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn record_order(
        tx: &mut Transaction<'_, Postgres>,
        details: &CustomerDetails,
        address: &Address,
        total: Decimal,
    ) -> Result<Customer, RepositoryError> {
        let email = normalize_email(&details.email);
        let fresh = Customer::create(CustomerDraft {
            name: details.name.trim().to_string(),
            email: email.clone(),
            phone: Some(details.phone.clone()),
            addresses: vec![],
        });

        sqlx::query(
            "INSERT INTO customers (id, name, email, phone, addresses, order_count, total_spent, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, 0, 0, $6, $6) \
             ON CONFLICT (email) DO NOTHING",
        )
        .bind(fresh.id)
        .bind(&fresh.name)
        .bind(&fresh.email)
        .bind(fresh.phone.as_deref())
        .bind(Json(&fresh.addresses))
        .bind(fresh.created_at)
        .execute(&mut **tx)
        .await?;

        let mut customer: Customer = sqlx::query_as::<_, CustomerRow>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE email = $1 FOR UPDATE"
        ))
        .bind(&email)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(RepositoryError::NotFound)?
        .try_into()?;

        customer.name = details.name.trim().to_string();
        customer.phone = Some(details.phone.clone());
        customer.remember_address(address.clone());
        customer.record_order(total);

        Self::write(tx, &customer, true).await?;
        Ok(customer)
    }

    async fn write(
        tx: &mut Transaction<'_, Postgres>,
        customer: &Customer,
        exists: bool,
    ) -> Result<(), RepositoryError> {
        let order_count = i32::try_from(customer.order_count).unwrap_or(i32::MAX);
        if exists {
            let result = sqlx::query(
                "UPDATE customers SET name = $2, email = $3, phone = $4, addresses = $5, order_count = $6, \
                 total_spent = $7, updated_at = $8 WHERE id = $1",
            )
            .bind(customer.id)
            .bind(&customer.name)
            .bind(&customer.email)
            .bind(customer.phone.as_deref())
            .bind(Json(&customer.addresses))
            .bind(order_count)
            .bind(customer.total_spent)
            .bind(customer.updated_at)
            .execute(&mut **tx)
            .await
            .map_err(|e| conflict_or(e, "a customer with this email already exists"))?;
            if result.rows_affected() == 0 {
                return Err(RepositoryError::NotFound);
            }
        } else {
            sqlx::query(
                "INSERT INTO customers (id, name, email, phone, addresses, order_count, total_spent, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(customer.id)
            .bind(&customer.name)
            .bind(&customer.email)
            .bind(customer.phone.as_deref())
            .bind(Json(&customer.addresses))
            .bind(order_count)
            .bind(customer.total_spent)
            .bind(customer.created_at)
            .bind(customer.updated_at)
            .execute(&mut **tx)
            .await
            .map_err(|e| conflict_or(e, "a customer with this email already exists"))?;
        }
        Ok(())
    }
}
