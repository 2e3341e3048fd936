//! Order updates after placement: gateway payment reconciliation and admin
//! status changes.

use sqlx::PgPool;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::db::{OrderRepository, ProductRepository, RepositoryError};
use crate::domain::aggregates::{Order, OrderStatus, PaymentStatus};
use crate::error::ApiError;
use crate::services::events::EventPublisher;

/// Order service.
pub struct OrderService<'a> {
    pool: &'a PgPool,
    events: &'a EventPublisher,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, events: &'a EventPublisher) -> Self {
        Self { pool, events }
    }

    /// Applies a gateway payment status to the order it belongs to, found by
    /// gateway order id and then by payment id. Returns `None` when no order
    /// matches.
    ///
    /// Re-delivered notifications leave the order unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    #[instrument(skip(self))]
    pub async fn apply_gateway_status(
        &self,
        gateway_order_id: Option<&str>,
        gateway_payment_id: Option<&str>,
        status: PaymentStatus,
    ) -> Result<Option<Order>, ApiError> {
        let repo = OrderRepository::new(self.pool);
        let found = match gateway_order_id {
            Some(id) => repo.find_by_gateway_order_id(id).await?,
            None => None,
        };
        let found = match (found, gateway_payment_id) {
            (None, Some(id)) => repo.find_by_gateway_payment_id(id).await?,
            (found, _) => found,
        };
        let Some(found) = found else {
            return Ok(None);
        };

        let mut tx = self.pool.begin().await?;
        let mut order = OrderRepository::lock(&mut tx, found.id()).await?.ok_or(RepositoryError::NotFound)?;
        let before = order.payment_status();
        if !order.apply_payment_status(status, gateway_payment_id) {
            info!(order_number = %order.order_number(), status = status.as_str(), "Payment status unchanged");
            return Ok(Some(order));
        }
        OrderRepository::save(&mut tx, &order).await?;
        tx.commit().await?;

        info!(
            order_number = %order.order_number(),
            from = before.as_str(),
            to = order.payment_status().as_str(),
            order_status = order.status().as_str(),
            "Payment status updated"
        );
        self.events.publish(order.take_events()).await;
        Ok(Some(order))
    }

    /// Admin status change. Cancelling returns the items to stock.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::InvalidTransition` for a disallowed change, or
    /// `RepositoryError::NotFound` for an unknown order.
    #[instrument(skip(self))]
    pub async fn update_status(&self, id: Uuid, next: OrderStatus) -> Result<Order, ApiError> {
        let mut tx = self.pool.begin().await?;
        let mut order = OrderRepository::lock(&mut tx, id).await?.ok_or(RepositoryError::NotFound)?;
        let before = order.status();
        order.transition_to(next)?;
        if before == next {
            return Ok(order);
        }

        if next == OrderStatus::Cancelled {
            for item in order.items() {
                ProductRepository::release_stock(&mut tx, item.product_id, item.quantity).await?;
            }
            if order.payment_status() == PaymentStatus::Paid {
                warn!(order_number = %order.order_number(), "Paid order cancelled; refund it from the gateway dashboard");
            }
        }
        OrderRepository::save(&mut tx, &order).await?;
        tx.commit().await?;

        info!(order_number = %order.order_number(), from = before.as_str(), to = next.as_str(), "Order status updated");
        self.events.publish(order.take_events()).await;
        Ok(order)
    }
}
