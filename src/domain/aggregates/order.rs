//! Order Aggregate
//!
//! Status rules:
//! - cash on delivery starts `pending`/`pending`; a verified gateway payment
//!   starts `confirmed`/`paid`
//! - a `paid` notification moves a `pending` order to `confirmed` once;
//!   repeats change nothing and `paid` is never downgraded
//! - admins move orders along [`OrderStatus::can_transition_to`]

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;
use crate::domain::aggregates::cart::Quote;
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::OrderNumber;

#[derive(Clone, Debug, Serialize)]
pub struct Order {
    #[serde(flatten)]
    record: OrderRecord,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

/// Stored shape of an order.
#[derive(Clone, Debug, Serialize)]
pub struct OrderRecord {
    pub id: Uuid,
    pub order_number: OrderNumber,
    pub customer: CustomerDetails,
    pub shipping_address: Address,
    pub items: Vec<LineItem>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping_fee: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub coupon_code: Option<String>,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub status: OrderStatus,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub shipment: Option<Shipment>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: Uuid,
    pub name: String,
    pub sku: String,
    #[serde(default)]
    pub image: Option<String>,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub total: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CustomerDetails {
    #[validate(length(min = 2, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 10, max = 15))]
    pub phone: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Address {
    #[validate(length(min = 3, max = 200))]
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    #[validate(length(min = 2, max = 100))]
    pub city: String,
    #[validate(length(min = 2, max = 100))]
    pub state: String,
    #[validate(length(equal = 6))]
    pub pincode: String,
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_country() -> String { "India".to_string() }

/// Identifiers returned by the logistics provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipment {
    pub provider_order_id: String,
    pub shipment_id: String,
    pub awb_code: Option<String>,
    pub courier_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus { #[default] Pending, Confirmed, Processing, Shipped, Delivered, Cancelled }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus { #[default] Pending, Authorized, Paid, Failed, Refunded }

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cod,
    #[serde(alias = "razorpay", alias = "online")]
    Prepaid,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending", Self::Confirmed => "confirmed", Self::Processing => "processing",
            Self::Shipped => "shipped", Self::Delivered => "delivered", Self::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (*self, next),
            (Pending, Confirmed | Cancelled)
                | (Confirmed, Processing | Shipped | Cancelled)
                | (Processing, Shipped | Cancelled)
                | (Shipped, Delivered)
        )
    }
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending", Self::Authorized => "authorized", Self::Paid => "paid",
            Self::Failed => "failed", Self::Refunded => "refunded",
        }
    }
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Cod => "cod", Self::Prepaid => "prepaid" }
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending), "confirmed" => Ok(Self::Confirmed),
            "processing" => Ok(Self::Processing), "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered), "cancelled" => Ok(Self::Cancelled),
            other => Err(OrderError::UnknownValue(other.to_string())),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending), "authorized" => Ok(Self::Authorized), "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed), "refunded" => Ok(Self::Refunded),
            other => Err(OrderError::UnknownValue(other.to_string())),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cod" => Ok(Self::Cod), "prepaid" => Ok(Self::Prepaid),
            other => Err(OrderError::UnknownValue(other.to_string())),
        }
    }
}

/// How the shopper settles the order at checkout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckoutPayment {
    CashOnDelivery,
    /// Gateway order created but not paid yet; the payment webhook settles it.
    AwaitingGateway { gateway_order_id: String },
    /// Gateway payment whose checkout signature has already been verified.
    Prepaid { gateway_order_id: String, gateway_payment_id: String },
}

/// Everything needed to place an order.
#[derive(Clone, Debug)]
pub struct NewOrder {
    pub customer: CustomerDetails,
    pub shipping_address: Address,
    pub quote: Quote,
    pub coupon_code: Option<String>,
    pub payment: CheckoutPayment,
    pub notes: Option<String>,
}

impl Order {
    pub fn place(new: NewOrder) -> Result<Self, OrderError> {
        if new.quote.items.is_empty() { return Err(OrderError::NoItems); }
        let now = Utc::now();
        let id = Uuid::now_v7();
        let (payment_method, payment_status, status, gateway_order_id, gateway_payment_id) = match new.payment {
            CheckoutPayment::CashOnDelivery => (PaymentMethod::Cod, PaymentStatus::Pending, OrderStatus::Pending, None, None),
            CheckoutPayment::AwaitingGateway { gateway_order_id } => (
                PaymentMethod::Prepaid, PaymentStatus::Pending, OrderStatus::Pending, Some(gateway_order_id), None,
            ),
            CheckoutPayment::Prepaid { gateway_order_id, gateway_payment_id } => (
                PaymentMethod::Prepaid, PaymentStatus::Paid, OrderStatus::Confirmed,
                Some(gateway_order_id), Some(gateway_payment_id),
            ),
        };
        let record = OrderRecord {
            id, order_number: OrderNumber::generate(now), customer: new.customer,
            shipping_address: new.shipping_address, items: new.quote.items, subtotal: new.quote.subtotal,
            discount: new.quote.discount, shipping_fee: new.quote.shipping_fee, total: new.quote.total,
            currency: new.quote.currency, coupon_code: new.coupon_code, payment_method, payment_status, status,
            gateway_order_id, gateway_payment_id, shipment: None, notes: new.notes, created_at: now, updated_at: now,
        };
        let mut order = Self { record, events: vec![] };
        order.raise_event(OrderEvent::Created {
            order_id: id, order_number: order.record.order_number.to_string(), total: order.record.total,
        });
        if payment_status == PaymentStatus::Paid {
            let gateway_payment_id = order.record.gateway_payment_id.clone();
            order.raise_event(OrderEvent::Paid { order_id: id, gateway_payment_id });
            order.raise_event(OrderEvent::Confirmed { order_id: id });
        }
        Ok(order)
    }

    /// Rebuilds an order loaded from storage; raises no events.
    pub fn restore(record: OrderRecord) -> Self { Self { record, events: vec![] } }

    pub fn record(&self) -> &OrderRecord { &self.record }
    pub fn id(&self) -> Uuid { self.record.id }
    pub fn order_number(&self) -> &OrderNumber { &self.record.order_number }
    pub fn status(&self) -> OrderStatus { self.record.status }
    pub fn payment_status(&self) -> PaymentStatus { self.record.payment_status }
    pub fn payment_method(&self) -> PaymentMethod { self.record.payment_method }
    pub fn items(&self) -> &[LineItem] { &self.record.items }
    pub fn total(&self) -> Decimal { self.record.total }
    pub fn shipment(&self) -> Option<&Shipment> { self.record.shipment.as_ref() }

    /// Whether `email` matches the customer on the order, ignoring case.
    pub fn belongs_to(&self, email: &str) -> bool {
        self.record.customer.email.trim().eq_ignore_ascii_case(email.trim())
    }

    /// Applies a payment status reported by the gateway. Returns whether the
    /// order changed.
    pub fn apply_payment_status(&mut self, next: PaymentStatus, gateway_payment_id: Option<&str>) -> bool {
        let current = self.record.payment_status;
        let downgrade = current == PaymentStatus::Paid
            && matches!(next, PaymentStatus::Pending | PaymentStatus::Authorized | PaymentStatus::Failed);
        if downgrade || current == PaymentStatus::Refunded { return false; }
        let confirms = next == PaymentStatus::Paid && self.record.status == OrderStatus::Pending;
        if current == next && !confirms { return false; }

        self.record.payment_status = next;
        // The attempt that succeeded is the one refunds will reference.
        let succeeded = matches!(next, PaymentStatus::Paid | PaymentStatus::Authorized);
        if let Some(id) = gateway_payment_id.filter(|_| succeeded || self.record.gateway_payment_id.is_none()) {
            self.record.gateway_payment_id = Some(id.to_string());
        }
        if next == PaymentStatus::Paid && current != PaymentStatus::Paid {
            let gateway_payment_id = self.record.gateway_payment_id.clone();
            self.raise_event(OrderEvent::Paid { order_id: self.record.id, gateway_payment_id });
        }
        if confirms {
            self.record.status = OrderStatus::Confirmed;
            self.raise_event(OrderEvent::Confirmed { order_id: self.record.id });
        }
        self.touch();
        true
    }

    /// Admin-driven status change.
    pub fn transition_to(&mut self, next: OrderStatus) -> Result<(), OrderError> {
        let current = self.record.status;
        if current == next { return Ok(()); }
        if !current.can_transition_to(next) { return Err(OrderError::InvalidTransition { from: current, to: next }); }
        self.record.status = next;
        let id = self.record.id;
        match next {
            OrderStatus::Confirmed => self.raise_event(OrderEvent::Confirmed { order_id: id }),
            OrderStatus::Shipped => {
                let awb_code = self.record.shipment.as_ref().and_then(|s| s.awb_code.clone());
                self.raise_event(OrderEvent::Shipped { order_id: id, awb_code });
            }
            OrderStatus::Delivered => {
                if self.record.payment_method == PaymentMethod::Cod && self.record.payment_status == PaymentStatus::Pending {
                    self.record.payment_status = PaymentStatus::Paid;
                    self.raise_event(OrderEvent::Paid { order_id: id, gateway_payment_id: None });
                }
                self.raise_event(OrderEvent::Delivered { order_id: id });
            }
            OrderStatus::Cancelled => self.raise_event(OrderEvent::Cancelled { order_id: id }),
            OrderStatus::Pending | OrderStatus::Processing => {}
        }
        self.touch();
        Ok(())
    }

    /// Fails unless a shipment can be booked for this order.
    pub fn ensure_shippable(&self) -> Result<(), OrderError> {
        if self.record.shipment.is_some() { return Err(OrderError::ShipmentExists); }
        if !matches!(self.record.status, OrderStatus::Confirmed | OrderStatus::Processing) {
            return Err(OrderError::NotReadyToShip(self.record.status));
        }
        Ok(())
    }

    pub fn record_shipment(&mut self, shipment: Shipment) -> Result<(), OrderError> {
        self.ensure_shippable()?;
        self.record.shipment = Some(shipment);
        self.record.status = OrderStatus::Processing;
        self.touch();
        Ok(())
    }

    /// Fills in the AWB on a shipment booked without one.
    pub fn assign_awb(&mut self, awb_code: String, courier_name: Option<String>) -> Result<(), OrderError> {
        let shipment = self.record.shipment.as_mut().ok_or(OrderError::NoShipment)?;
        if shipment.awb_code.is_some() { return Err(OrderError::ShipmentExists); }
        shipment.awb_code = Some(awb_code);
        shipment.courier_name = courier_name;
        self.touch();
        Ok(())
    }

    /// Draws a fresh order number when the generated one is already taken.
    pub fn renumber(&mut self) {
        let number = OrderNumber::generate(self.record.created_at);
        for event in &mut self.events {
            if let DomainEvent::Order(OrderEvent::Created { order_number, .. }) = event {
                *order_number = number.to_string();
            }
        }
        self.record.order_number = number;
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: OrderEvent) { self.events.push(DomainEvent::Order(e)); }
    fn touch(&mut self) { self.record.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("Order has no items")]
    NoItems,
    #[error("Cannot move order from {} to {}", .from.as_str(), .to.as_str())]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("Order already has a shipment")]
    ShipmentExists,
    #[error("Order has no shipment yet")]
    NoShipment,
    #[error("Order in status {} cannot be shipped", .0.as_str())]
    NotReadyToShip(OrderStatus),
    #[error("Unknown value: {0}")]
    UnknownValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote() -> Quote {
        Quote {
            items: vec![LineItem {
                product_id: Uuid::now_v7(), name: "Triphala Churna".into(), sku: "TRI-100".into(), image: None,
                quantity: 2, unit_price: Decimal::new(180, 0), total: Decimal::new(360, 0),
            }],
            subtotal: Decimal::new(360, 0), discount: Decimal::ZERO, shipping_fee: Decimal::new(50, 0),
            total: Decimal::new(410, 0), currency: "INR".into(),
        }
    }

    fn new_order(payment: CheckoutPayment) -> NewOrder {
        NewOrder {
            customer: CustomerDetails { name: "Meera Nair".into(), email: "meera@example.com".into(), phone: "9876543210".into() },
            shipping_address: Address { line1: "12 MG Road".into(), line2: None, city: "Kochi".into(), state: "Kerala".into(), pincode: "682001".into(), country: "India".into() },
            quote: quote(), coupon_code: None, payment, notes: None,
        }
    }

    fn prepaid() -> CheckoutPayment {
        CheckoutPayment::Prepaid { gateway_order_id: "order_P1".into(), gateway_payment_id: "pay_P1".into() }
    }

    #[test]
    fn test_cod_starts_pending() {
        let mut order = Order::place(new_order(CheckoutPayment::CashOnDelivery)).unwrap();
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.payment_status(), PaymentStatus::Pending);
        assert_eq!(order.take_events().len(), 1);
    }

    #[test]
    fn test_prepaid_starts_confirmed_and_paid() {
        let order = Order::place(new_order(prepaid())).unwrap();
        assert_eq!(order.status(), OrderStatus::Confirmed);
        assert_eq!(order.payment_status(), PaymentStatus::Paid);
        assert_eq!(order.record().gateway_order_id.as_deref(), Some("order_P1"));
    }

    #[test]
    fn test_awaiting_gateway_confirmed_by_webhook() {
        let mut order = Order::place(new_order(CheckoutPayment::AwaitingGateway { gateway_order_id: "order_P2".into() })).unwrap();
        assert_eq!(order.payment_method(), PaymentMethod::Prepaid);
        assert_eq!(order.status(), OrderStatus::Pending);
        assert!(order.apply_payment_status(PaymentStatus::Authorized, Some("pay_P2")));
        assert_eq!(order.status(), OrderStatus::Pending);
        assert!(order.apply_payment_status(PaymentStatus::Paid, Some("pay_P2")));
        assert_eq!(order.status(), OrderStatus::Confirmed);
    }

    #[test]
    fn test_successful_retry_replaces_failed_payment_id() {
        let mut order = Order::place(new_order(CheckoutPayment::AwaitingGateway { gateway_order_id: "order_P3".into() })).unwrap();
        assert!(order.apply_payment_status(PaymentStatus::Failed, Some("pay_failed")));
        assert_eq!(order.record().gateway_payment_id.as_deref(), Some("pay_failed"));
        assert!(order.apply_payment_status(PaymentStatus::Paid, Some("pay_ok")));
        assert_eq!(order.status(), OrderStatus::Confirmed);
        assert_eq!(order.record().gateway_payment_id.as_deref(), Some("pay_ok"));

        // A late failure for the first attempt does not touch the paid order.
        assert!(!order.apply_payment_status(PaymentStatus::Failed, Some("pay_failed")));
        assert_eq!(order.record().gateway_payment_id.as_deref(), Some("pay_ok"));
    }

    #[test]
    fn test_renumber_keeps_created_event_in_step() {
        let mut order = Order::place(new_order(CheckoutPayment::CashOnDelivery)).unwrap();
        let created_on = order.record().created_at.format("%Y%m%d").to_string();
        order.renumber();
        assert!(order.order_number().as_str().contains(&created_on));
        let number = order.order_number().to_string();
        match order.take_events().as_slice() {
            [DomainEvent::Order(OrderEvent::Created { order_number, .. })] => assert_eq!(*order_number, number),
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[test]
    fn test_empty_order_rejected() {
        let mut n = new_order(CheckoutPayment::CashOnDelivery);
        n.quote.items.clear();
        assert_eq!(Order::place(n).unwrap_err(), OrderError::NoItems);
    }

    #[test]
    fn test_paid_webhook_confirms_once() {
        let mut order = Order::place(new_order(CheckoutPayment::CashOnDelivery)).unwrap();
        order.take_events();
        assert!(order.apply_payment_status(PaymentStatus::Paid, Some("pay_1")));
        assert_eq!(order.status(), OrderStatus::Confirmed);
        assert_eq!(order.take_events().len(), 2);
        assert!(!order.apply_payment_status(PaymentStatus::Paid, Some("pay_1")));
        assert!(order.take_events().is_empty());
        assert_eq!(order.record().gateway_payment_id.as_deref(), Some("pay_1"));
    }

    #[test]
    fn test_paid_not_downgraded() {
        let mut order = Order::place(new_order(prepaid())).unwrap();
        assert!(!order.apply_payment_status(PaymentStatus::Failed, None));
        assert!(!order.apply_payment_status(PaymentStatus::Authorized, None));
        assert_eq!(order.payment_status(), PaymentStatus::Paid);
        assert!(order.apply_payment_status(PaymentStatus::Refunded, None));
        assert!(!order.apply_payment_status(PaymentStatus::Paid, None));
    }

    #[test]
    fn test_paid_on_cancelled_order_keeps_status() {
        let mut order = Order::place(new_order(CheckoutPayment::CashOnDelivery)).unwrap();
        order.transition_to(OrderStatus::Cancelled).unwrap();
        assert!(order.apply_payment_status(PaymentStatus::Paid, None));
        assert_eq!(order.status(), OrderStatus::Cancelled);
    }

    #[test]
    fn test_order_workflow() {
        let mut order = Order::place(new_order(CheckoutPayment::CashOnDelivery)).unwrap();
        order.transition_to(OrderStatus::Confirmed).unwrap();
        order.record_shipment(Shipment {
            provider_order_id: "SR1".into(), shipment_id: "SH1".into(), awb_code: Some("AWB1".into()),
            courier_name: Some("Delhivery".into()), created_at: Utc::now(),
        }).unwrap();
        assert_eq!(order.status(), OrderStatus::Processing);
        assert_eq!(order.ensure_shippable(), Err(OrderError::ShipmentExists));
        order.transition_to(OrderStatus::Shipped).unwrap();
        order.transition_to(OrderStatus::Delivered).unwrap();
        assert_eq!(order.payment_status(), PaymentStatus::Paid);
        assert!(order.transition_to(OrderStatus::Cancelled).is_err());
    }

    #[test]
    fn test_assign_awb_later() {
        let mut order = Order::place(new_order(prepaid())).unwrap();
        assert_eq!(order.assign_awb("AWB9".into(), None), Err(OrderError::NoShipment));
        order.record_shipment(Shipment {
            provider_order_id: "SR2".into(), shipment_id: "SH2".into(), awb_code: None, courier_name: None,
            created_at: Utc::now(),
        }).unwrap();
        order.assign_awb("AWB9".into(), Some("Blue Dart".into())).unwrap();
        assert_eq!(order.shipment().and_then(|s| s.awb_code.as_deref()), Some("AWB9"));
        assert_eq!(order.assign_awb("AWB10".into(), None), Err(OrderError::ShipmentExists));
    }

    #[test]
    fn test_cannot_ship_pending() {
        let order = Order::place(new_order(CheckoutPayment::CashOnDelivery)).unwrap();
        assert_eq!(order.ensure_shippable(), Err(OrderError::NotReadyToShip(OrderStatus::Pending)));
    }

    #[test]
    fn test_belongs_to() {
        let order = Order::place(new_order(CheckoutPayment::CashOnDelivery)).unwrap();
        assert!(order.belongs_to(" Meera@Example.com"));
        assert!(!order.belongs_to("someone@example.com"));
    }
}
