//! Order repository.
//!
//! Mutations go through a transaction that first locks the row with
//! [`OrderRepository::lock`], so concurrent webhook deliveries and admin
//! updates apply one after the other.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{conflict_or, page_offset, RepositoryError};
use crate::domain::aggregates::{
    Address, CustomerDetails, LineItem, Order, OrderRecord, OrderStatus, PaymentStatus, Shipment,
};
use crate::domain::value_objects::OrderNumber;

const ORDER_NUMBER_CONSTRAINT: &str = "orders_order_number_key";

/// A booking claim older than this is considered abandoned.
const SHIPMENT_BOOKING_TIMEOUT_MINUTES: i32 = 10;

const ORDER_COLUMNS: &str = "id, order_number, customer_name, customer_email, customer_phone, shipping_address, \
     items, subtotal, discount, shipping_fee, total, currency, coupon_code, payment_method, payment_status, status, \
     gateway_order_id, gateway_payment_id, shipment, notes, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    customer_name: String,
    customer_email: String,
    customer_phone: String,
    shipping_address: Json<Address>,
    items: Json<Vec<LineItem>>,
    subtotal: Decimal,
    discount: Decimal,
    shipping_fee: Decimal,
    total: Decimal,
    currency: String,
    coupon_code: Option<String>,
    payment_method: String,
    payment_status: String,
    status: String,
    gateway_order_id: Option<String>,
    gateway_payment_id: Option<String>,
    shipment: Option<Json<Shipment>>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(r: OrderRow) -> Result<Self, Self::Error> {
        let corrupt = |e: &dyn std::fmt::Display| RepositoryError::DataCorruption(format!("order {}: {e}", r.id));
        let order_number = OrderNumber::parse(&r.order_number).map_err(|e| corrupt(&e))?;
        let payment_method = r.payment_method.parse().map_err(|e| corrupt(&e))?;
        let payment_status = r.payment_status.parse().map_err(|e| corrupt(&e))?;
        let status = r.status.parse().map_err(|e| corrupt(&e))?;

        Ok(Order::restore(OrderRecord {
            id: r.id,
            order_number,
            customer: CustomerDetails { name: r.customer_name, email: r.customer_email, phone: r.customer_phone },
            shipping_address: r.shipping_address.0,
            items: r.items.0,
            subtotal: r.subtotal,
            discount: r.discount,
            shipping_fee: r.shipping_fee,
            total: r.total,
            currency: r.currency,
            coupon_code: r.coupon_code,
            payment_method,
            payment_status,
            status,
            gateway_order_id: r.gateway_order_id,
            gateway_payment_id: r.gateway_payment_id,
            shipment: r.shipment.map(|s| s.0),
            notes: r.notes,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }))
    }
}

/// Admin order listing filters.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    /// Exact customer email, compared case-insensitively.
    pub email: Option<String>,
    /// Matched against order number and customer name/email/phone.
    pub search: Option<String>,
    pub page: u32,
    pub per_page: u32,
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, RepositoryError> {
        self.find_one("id = $1::uuid", &id.to_string()).await
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, RepositoryError> {
        self.find_one("order_number = $1", number.as_str()).await
    }

    /// Looks an order up by id or order number. A reference that parses as a
    /// UUID is only ever matched against ids.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_reference(&self, reference: &str) -> Result<Option<Order>, RepositoryError> {
        let reference = reference.trim();
        if let Ok(id) = Uuid::parse_str(reference) {
            return self.find_by_id(id).await;
        }
        match OrderNumber::parse(reference) {
            Ok(number) => self.find_by_number(&number).await,
            Err(_) => Ok(None),
        }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_gateway_order_id(&self, gateway_order_id: &str) -> Result<Option<Order>, RepositoryError> {
        self.find_one("gateway_order_id = $1", gateway_order_id).await
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_gateway_payment_id(
        &self,
        gateway_payment_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        self.find_one("gateway_payment_id = $1", gateway_payment_id).await
    }

    async fn find_one(&self, condition: &str, value: &str) -> Result<Option<Order>, RepositoryError> {
        sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE {condition}"))
            .bind(value)
            .fetch_optional(self.pool)
            .await?
            .map(Order::try_from)
            .transpose()
    }

    /// List orders matching `filter`, newest first, with the total count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &OrderFilter) -> Result<(Vec<Order>, i64), RepositoryError> {
        const WHERE: &str = "WHERE ($1::text IS NULL OR status = $1) \
             AND ($2::text IS NULL OR payment_status = $2) \
             AND ($3::text IS NULL OR LOWER(customer_email) = LOWER($3)) \
             AND ($4::text IS NULL OR order_number ILIKE '%' || $4 || '%' OR customer_name ILIKE '%' || $4 || '%' \
                  OR customer_email ILIKE '%' || $4 || '%' OR customer_phone ILIKE '%' || $4 || '%')";

        let status = filter.status.map(|s| s.as_str());
        let payment_status = filter.payment_status.map(|s| s.as_str());
        let search = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty());

        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders {WHERE} ORDER BY created_at DESC LIMIT $5 OFFSET $6"
        ))
        .bind(status)
        .bind(payment_status)
        .bind(filter.email.as_deref())
        .bind(search)
        .bind(i64::from(filter.per_page))
        .bind(page_offset(filter.page, filter.per_page))
        .fetch_all(self.pool)
        .await?;

        let total: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM orders {WHERE}"))
            .bind(status)
            .bind(payment_status)
            .bind(filter.email.as_deref())
            .bind(search)
            .fetch_one(self.pool)
            .await?;

        let orders = rows.into_iter().map(Order::try_from).collect::<Result<Vec<_>, _>>()?;
        Ok((orders, total.0))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::OrderNumberTaken` if the order number is
    /// already used, or `RepositoryError::Conflict` if the gateway order id is.
    pub async fn insert(tx: &mut Transaction<'_, Postgres>, order: &Order) -> Result<(), RepositoryError> {
        let r = order.record();
        sqlx::query(
            "INSERT INTO orders (id, order_number, customer_name, customer_email, customer_phone, shipping_address, \
             items, subtotal, discount, shipping_fee, total, currency, coupon_code, payment_method, payment_status, \
             status, gateway_order_id, gateway_payment_id, shipment, notes, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)",
        )
        .bind(r.id)
        .bind(r.order_number.as_str())
        .bind(&r.customer.name)
        .bind(&r.customer.email)
        .bind(&r.customer.phone)
        .bind(Json(&r.shipping_address))
        .bind(Json(&r.items))
        .bind(r.subtotal)
        .bind(r.discount)
        .bind(r.shipping_fee)
        .bind(r.total)
        .bind(&r.currency)
        .bind(r.coupon_code.as_deref())
        .bind(r.payment_method.as_str())
        .bind(r.payment_status.as_str())
        .bind(r.status.as_str())
        .bind(r.gateway_order_id.as_deref())
        .bind(r.gateway_payment_id.as_deref())
        .bind(r.shipment.as_ref().map(Json))
        .bind(r.notes.as_deref())
        .bind(r.created_at)
        .bind(r.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            let number_taken = matches!(
                &e,
                sqlx::Error::Database(db_err) if db_err.constraint() == Some(ORDER_NUMBER_CONSTRAINT)
            );
            if number_taken {
                RepositoryError::OrderNumberTaken
            } else {
                conflict_or(e, "order already exists for this payment")
            }
        })?;
        Ok(())
    }

    /// Loads the order and holds a row lock until `tx` ends.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lock(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<Option<Order>, RepositoryError> {
        sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"))
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
            .map(Order::try_from)
            .transpose()
    }

    /// Marks a shippable order as being booked with the logistics provider.
    /// Returns `false` when the order already has a shipment, cannot ship,
    /// or another booking started in the last few minutes.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn claim_shipment_booking(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE orders SET shipment_booking_at = NOW() \
             WHERE id = $1 AND shipment IS NULL AND status IN ($2, $3) \
             AND (shipment_booking_at IS NULL OR shipment_booking_at < NOW() - make_interval(mins => $4))",
        )
        .bind(id)
        .bind(OrderStatus::Confirmed.as_str())
        .bind(OrderStatus::Processing.as_str())
        .bind(SHIPMENT_BOOKING_TIMEOUT_MINUTES)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Clears the booking claim taken by [`Self::claim_shipment_booking`].
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn release_shipment_booking<'e>(executor: impl PgExecutor<'e>, id: Uuid) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE orders SET shipment_booking_at = NULL WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Persists the mutable parts of an order: statuses, payment id and shipment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order no longer exists.
    pub async fn save(tx: &mut Transaction<'_, Postgres>, order: &Order) -> Result<(), RepositoryError> {
        let r = order.record();
        let result = sqlx::query(
            "UPDATE orders SET status = $2, payment_status = $3, gateway_payment_id = $4, shipment = $5, \
             updated_at = $6 WHERE id = $1",
        )
        .bind(r.id)
        .bind(r.status.as_str())
        .bind(r.payment_status.as_str())
        .bind(r.gateway_payment_id.as_deref())
        .bind(r.shipment.as_ref().map(Json))
        .bind(r.updated_at)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
