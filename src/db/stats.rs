//! Dashboard aggregates for the admin panel.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::RepositoryError;

/// Products at or below this stock level are flagged on the dashboard.
pub const LOW_STOCK_THRESHOLD: i32 = 5;

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub total_orders: i64,
    pub pending_orders: i64,
    /// Sum of paid order totals.
    pub revenue: Decimal,
    pub total_products: i64,
    pub total_customers: i64,
    pub orders_by_status: Vec<StatusCount>,
    pub low_stock: Vec<LowStockProduct>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LowStockProduct {
    pub id: Uuid,
    pub name: String,
    pub sku: String,
    pub stock: i32,
}

/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn dashboard(pool: &PgPool) -> Result<DashboardStats, RepositoryError> {
    let (total_orders, pending_orders, revenue): (i64, i64, Decimal) = sqlx::query_as(
        "SELECT COUNT(*), \
                COUNT(*) FILTER (WHERE status = 'pending'), \
                COALESCE(SUM(total) FILTER (WHERE payment_status = 'paid'), 0) \
         FROM orders",
    )
    .fetch_one(pool)
    .await?;

    let (total_products,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products WHERE status <> 'archived'")
        .fetch_one(pool)
        .await?;
    let (total_customers,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM customers").fetch_one(pool).await?;

    let orders_by_status = sqlx::query_as::<_, StatusCount>(
        "SELECT status, COUNT(*) AS count FROM orders GROUP BY status ORDER BY status",
    )
    .fetch_all(pool)
    .await?;

    let low_stock = sqlx::query_as::<_, LowStockProduct>(
        "SELECT id, name, sku, stock FROM products WHERE status = 'active' AND stock <= $1 ORDER BY stock, name",
    )
    .bind(LOW_STOCK_THRESHOLD)
    .fetch_all(pool)
    .await?;

    Ok(DashboardStats {
        total_orders,
        pending_orders,
        revenue,
        total_products,
        total_customers,
        orders_by_status,
        low_stock,
    })
}
