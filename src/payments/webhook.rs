//! Gateway webhook payloads and their mapping onto local payment statuses.

use std::str::FromStr;

use serde::Deserialize;

use super::PaymentError;
use crate::domain::aggregates::PaymentStatus;

/// Webhook events the store acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    PaymentAuthorized,
    PaymentCaptured,
    PaymentFailed,
    OrderPaid,
    RefundCreated,
    RefundProcessed,
}

impl WebhookEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PaymentAuthorized => "payment.authorized",
            Self::PaymentCaptured => "payment.captured",
            Self::PaymentFailed => "payment.failed",
            Self::OrderPaid => "order.paid",
            Self::RefundCreated => "refund.created",
            Self::RefundProcessed => "refund.processed",
        }
    }

    /// Local payment status the event implies.
    pub fn payment_status(&self) -> PaymentStatus {
        match self {
            Self::PaymentAuthorized => PaymentStatus::Authorized,
            Self::PaymentCaptured | Self::OrderPaid => PaymentStatus::Paid,
            Self::PaymentFailed => PaymentStatus::Failed,
            Self::RefundCreated | Self::RefundProcessed => PaymentStatus::Refunded,
        }
    }
}

impl FromStr for WebhookEvent {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "payment.authorized" => Ok(Self::PaymentAuthorized),
            "payment.captured" => Ok(Self::PaymentCaptured),
            "payment.failed" => Ok(Self::PaymentFailed),
            "order.paid" => Ok(Self::OrderPaid),
            "refund.created" => Ok(Self::RefundCreated),
            "refund.processed" => Ok(Self::RefundProcessed),
            other => Err(other.to_string()),
        }
    }
}

/// A supported webhook reduced to what the order needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentNotification {
    pub event: WebhookEvent,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    /// Amount in paise, when the payload carries one.
    pub amount: Option<i64>,
}

impl PaymentNotification {
    pub fn payment_status(&self) -> PaymentStatus {
        self.event.payment_status()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedWebhook {
    Notification(PaymentNotification),
    /// Event the store does not handle; acknowledged and dropped.
    Unsupported(String),
}

#[derive(Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    payload: Payload,
}

#[derive(Deserialize, Default)]
struct Payload {
    #[serde(default)]
    payment: Option<Wrapped<PaymentEntity>>,
    #[serde(default)]
    order: Option<Wrapped<OrderEntity>>,
    #[serde(default)]
    refund: Option<Wrapped<RefundEntity>>,
}

#[derive(Deserialize)]
struct Wrapped<T> {
    entity: T,
}

#[derive(Deserialize)]
struct PaymentEntity {
    id: String,
    #[serde(default)]
    order_id: Option<String>,
    #[serde(default)]
    amount: Option<i64>,
}

#[derive(Deserialize)]
struct OrderEntity {
    id: String,
    #[serde(default)]
    amount_paid: Option<i64>,
}

#[derive(Deserialize)]
struct RefundEntity {
    #[serde(default)]
    payment_id: Option<String>,
    #[serde(default)]
    amount: Option<i64>,
}

/// Parse an already authenticated webhook body.
///
/// # Errors
///
/// Returns `PaymentError::MalformedPayload` for invalid JSON and
/// `PaymentError::MissingField` when a supported event carries neither an
/// order id nor a payment id.
pub fn parse(body: &[u8]) -> Result<ParsedWebhook, PaymentError> {
    let envelope: Envelope = serde_json::from_slice(body)?;
    let event = match envelope.event.parse::<WebhookEvent>() {
        Ok(event) => event,
        Err(name) => return Ok(ParsedWebhook::Unsupported(name)),
    };

    let Payload { payment, order, refund } = envelope.payload;
    let payment = payment.map(|w| w.entity);
    let order = order.map(|w| w.entity);
    let refund = refund.map(|w| w.entity);

    let gateway_order_id = order
        .as_ref()
        .map(|o| o.id.clone())
        .or_else(|| payment.as_ref().and_then(|p| p.order_id.clone()));
    let gateway_payment_id = payment
        .as_ref()
        .map(|p| p.id.clone())
        .or_else(|| refund.as_ref().and_then(|r| r.payment_id.clone()));
    let amount = match event {
        WebhookEvent::RefundCreated | WebhookEvent::RefundProcessed => refund.as_ref().and_then(|r| r.amount),
        WebhookEvent::OrderPaid => order.as_ref().and_then(|o| o.amount_paid),
        _ => payment.as_ref().and_then(|p| p.amount),
    };

    if gateway_order_id.is_none() && gateway_payment_id.is_none() {
        return Err(PaymentError::MissingField("order or payment id"));
    }

    Ok(ParsedWebhook::Notification(PaymentNotification { event, gateway_order_id, gateway_payment_id, amount }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_captured() {
        let body = br#"{
            "entity": "event",
            "event": "payment.captured",
            "payload": {"payment": {"entity": {"id": "pay_A1", "order_id": "order_A1", "amount": 41000, "status": "captured"}}},
            "created_at": 1760690000
        }"#;
        let ParsedWebhook::Notification(n) = parse(body).unwrap() else { panic!("expected notification") };
        assert_eq!(n.event, WebhookEvent::PaymentCaptured);
        assert_eq!(n.payment_status(), PaymentStatus::Paid);
        assert_eq!(n.gateway_order_id.as_deref(), Some("order_A1"));
        assert_eq!(n.gateway_payment_id.as_deref(), Some("pay_A1"));
        assert_eq!(n.amount, Some(41000));
    }

    #[test]
    fn test_order_paid_prefers_order_entity() {
        let body = br#"{"event": "order.paid", "payload": {
            "payment": {"entity": {"id": "pay_B1", "order_id": "order_B1"}},
            "order": {"entity": {"id": "order_B1", "amount_paid": 99900}}
        }}"#;
        let ParsedWebhook::Notification(n) = parse(body).unwrap() else { panic!("expected notification") };
        assert_eq!(n.gateway_order_id.as_deref(), Some("order_B1"));
        assert_eq!(n.amount, Some(99900));
    }

    #[test]
    fn test_refund_without_order_id() {
        let body = br#"{"event": "refund.processed", "payload": {"refund": {"entity": {"id": "rfnd_1", "payment_id": "pay_C1", "amount": 5000}}}}"#;
        let ParsedWebhook::Notification(n) = parse(body).unwrap() else { panic!("expected notification") };
        assert_eq!(n.payment_status(), PaymentStatus::Refunded);
        assert_eq!(n.gateway_order_id, None);
        assert_eq!(n.gateway_payment_id.as_deref(), Some("pay_C1"));
        assert_eq!(n.amount, Some(5000));
    }

    #[test]
    fn test_unsupported_event() {
        let body = br#"{"event": "subscription.charged", "payload": {}}"#;
        assert_eq!(parse(body).unwrap(), ParsedWebhook::Unsupported("subscription.charged".to_string()));
    }

    #[test]
    fn test_missing_ids() {
        let body = br#"{"event": "payment.failed", "payload": {}}"#;
        assert!(matches!(parse(body), Err(PaymentError::MissingField(_))));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(parse(b"not json"), Err(PaymentError::MalformedPayload(_))));
    }
}
