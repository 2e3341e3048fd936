//! Database access for the store.
//!
//! # Tables
//!
//! - `products` - Catalog
//! - `orders` - Placed orders; items, address and shipment as JSONB
//! - `customers` - One row per shopper email
//! - `coupons` - Discount codes and their usage counters
//! - `users` - Login accounts (admin and customer roles)
//! - `settings` - Key/value JSONB (shipping provider credentials)
//!
//! Migrations live in `migrations/` and run at startup.

pub mod coupons;
pub mod customers;
pub mod orders;
pub mod products;
pub mod settings;
pub mod stats;
pub mod users;

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use thiserror::Error;

pub use coupons::CouponRepository;
pub use customers::CustomerRepository;
pub use orders::{OrderFilter, OrderRepository};
pub use products::{ProductFilter, ProductRepository};
pub use users::{User, UserRepository, UserRole};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// The generated order number is already in use.
    #[error("order number already taken")]
    OrderNumberTaken,
}

/// Maps a unique violation to `Conflict(message)`, anything else to `Database`.
pub(crate) fn conflict_or(err: sqlx::Error, message: &str) -> RepositoryError {
    match err {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            RepositoryError::Conflict(message.to_owned())
        }
        other => RepositoryError::Database(other),
    }
}

/// Create a `PostgreSQL` connection pool.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Apply pending migrations.
///
/// # Errors
///
/// Returns an error when a migration fails.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Offset for 1-based `page` with `per_page` rows.
pub(crate) fn page_offset(page: u32, per_page: u32) -> i64 {
    i64::from(page.max(1) - 1) * i64::from(per_page)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_offset() {
        assert_eq!(page_offset(1, 20), 0);
        assert_eq!(page_offset(0, 20), 0);
        assert_eq!(page_offset(3, 25), 50);
    }

    #[test]
    fn test_repository_error_display() {
        assert_eq!(RepositoryError::NotFound.to_string(), "not found");
        assert_eq!(
            RepositoryError::Conflict("sku already exists".into()).to_string(),
            "constraint violation: sku already exists"
        );
    }
}
