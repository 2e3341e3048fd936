//! Shipment booking and tracking with the logistics provider.

use chrono::Utc;
use sqlx::PgPool;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::db::{settings, OrderRepository, RepositoryError};
use crate::domain::aggregates::{Order, OrderError, Shipment};
use crate::error::ApiError;
use crate::services::events::EventPublisher;
use crate::shipping::{
    CreateOrderRequest, PackageDetails, ShippingClient, ShippingCredentials, ShippingError, TrackingSummary,
};

/// Fulfillment service.
pub struct FulfillmentService<'a> {
    pool: &'a PgPool,
    shipping: &'a ShippingClient,
    events: &'a EventPublisher,
}

impl<'a> FulfillmentService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, shipping: &'a ShippingClient, events: &'a EventPublisher) -> Self {
        Self { pool, shipping, events }
    }

    /// Book a shipment for a confirmed order: create the provider order,
    /// request an AWB and store both on the order, which moves to
    /// `processing`.
    ///
    /// The order is claimed before the provider is called, so a repeated
    /// request cannot book a second provider shipment. When no courier can
    /// be assigned the provider order is still recorded, and
    /// [`Self::assign_awb`] can be retried later.
    ///
    /// # Errors
    ///
    /// Returns `ShippingError::InvalidPackage` for bad dimensions,
    /// `ShippingError::NotConfigured` without credentials, an `OrderError`
    /// when the order cannot ship, `ApiError::Conflict` while another booking
    /// is in flight, or a provider error.
    #[instrument(skip(self, package))]
    pub async fn create_shipment(&self, order_id: Uuid, package: &PackageDetails) -> Result<Order, ApiError> {
        if !package.is_valid() {
            return Err(ShippingError::InvalidPackage.into());
        }
        let credentials = self.credentials().await?;
        let repo = OrderRepository::new(self.pool);
        let order = repo.find_by_id(order_id).await?.ok_or(RepositoryError::NotFound)?;
        order.ensure_shippable()?;
        if !repo.claim_shipment_booking(order_id).await? {
            return Err(ApiError::Conflict("A shipment is already being booked for this order".to_string()));
        }

        let shipment = match self.book(&order, &credentials, package).await {
            Ok(shipment) => shipment,
            Err(e) => {
                if let Err(release) = OrderRepository::release_shipment_booking(self.pool, order_id).await {
                    warn!(error = %release, "Could not release shipment booking claim");
                }
                return Err(e);
            }
        };

        let (provider_order_id, shipment_id) = (shipment.provider_order_id.clone(), shipment.shipment_id.clone());
        let mut order = match self.record_shipment(order_id, shipment).await {
            Ok(order) => order,
            Err(e) => {
                error!(
                    order_number = %order.order_number(),
                    %provider_order_id,
                    %shipment_id,
                    error = %e,
                    "Provider shipment booked but not stored; cancel it with the provider or attach it by hand"
                );
                return Err(e);
            }
        };

        info!(
            order_number = %order.order_number(),
            awb = order.shipment().and_then(|s| s.awb_code.as_deref()).unwrap_or("-"),
            "Shipment booked"
        );
        self.events.publish(order.take_events()).await;
        Ok(order)
    }

    async fn book(
        &self,
        order: &Order,
        credentials: &ShippingCredentials,
        package: &PackageDetails,
    ) -> Result<Shipment, ApiError> {
        let request = CreateOrderRequest::from_order(
            order,
            package,
            &credentials.pickup_location,
            credentials.channel_id.clone(),
        );
        let created = self.shipping.create_order(credentials, &request).await?;
        let awb = match self.shipping.assign_awb(credentials, &created.shipment_id, package.courier_id).await {
            Ok(awb) => Some(awb),
            Err(ShippingError::AwbNotAssigned(reason)) => {
                warn!(order_number = %order.order_number(), %reason, "Shipment created without AWB");
                None
            }
            Err(e) => {
                error!(
                    order_number = %order.order_number(),
                    provider_order_id = %created.order_id,
                    shipment_id = %created.shipment_id,
                    error = %e,
                    "AWB request failed after the provider order was created"
                );
                None
            }
        };

        Ok(Shipment {
            provider_order_id: created.order_id,
            shipment_id: created.shipment_id,
            awb_code: awb.as_ref().map(|a| a.awb_code.clone()),
            courier_name: awb.and_then(|a| a.courier_name),
            created_at: Utc::now(),
        })
    }

    async fn record_shipment(&self, order_id: Uuid, shipment: Shipment) -> Result<Order, ApiError> {
        let mut tx = self.pool.begin().await?;
        let mut order = OrderRepository::lock(&mut tx, order_id).await?.ok_or(RepositoryError::NotFound)?;
        order.record_shipment(shipment)?;
        OrderRepository::save(&mut tx, &order).await?;
        OrderRepository::release_shipment_booking(&mut *tx, order_id).await?;
        tx.commit().await?;
        Ok(order)
    }

    /// Retry courier assignment for a shipment booked without an AWB.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NoShipment` / `OrderError::ShipmentExists` when
    /// there is nothing to assign, or a provider error.
    #[instrument(skip(self))]
    pub async fn assign_awb(&self, order_id: Uuid, courier_id: Option<u32>) -> Result<Order, ApiError> {
        let credentials = self.credentials().await?;
        let order = OrderRepository::new(self.pool).find_by_id(order_id).await?.ok_or(RepositoryError::NotFound)?;
        let shipment_id = match order.shipment() {
            Some(s) if s.awb_code.is_some() => return Err(OrderError::ShipmentExists.into()),
            Some(s) => s.shipment_id.clone(),
            None => return Err(OrderError::NoShipment.into()),
        };

        let awb = self.shipping.assign_awb(&credentials, &shipment_id, courier_id).await?;

        let mut tx = self.pool.begin().await?;
        let mut order = OrderRepository::lock(&mut tx, order_id).await?.ok_or(RepositoryError::NotFound)?;
        order.assign_awb(awb.awb_code, awb.courier_name)?;
        OrderRepository::save(&mut tx, &order).await?;
        tx.commit().await?;

        info!(order_number = %order.order_number(), "AWB assigned");
        Ok(order)
    }

    /// Tracking for an order that has an AWB.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Conflict` when the order has no AWB yet, or a
    /// provider error.
    pub async fn track(&self, order: &Order) -> Result<TrackingSummary, ApiError> {
        let awb = order
            .shipment()
            .and_then(|s| s.awb_code.as_deref())
            .ok_or_else(|| ApiError::Conflict("Order has not been shipped yet".to_string()))?;
        let credentials = self.credentials().await?;
        Ok(self.shipping.track_awb(&credentials, awb).await?)
    }

    async fn credentials(&self) -> Result<ShippingCredentials, ApiError> {
        settings::shipping(self.pool)
            .await?
            .credentials()
            .ok_or_else(|| ShippingError::NotConfigured.into())
    }
}
