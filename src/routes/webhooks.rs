//! Payment gateway webhook.
//!
//! The signature is checked against the raw body before anything is parsed
//! or touched. Events the store does not handle and notifications for
//! unknown orders are acknowledged with 200 so the gateway stops retrying.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::ApiError;
use crate::payments::signature::WEBHOOK_SIGNATURE_HEADER;
use crate::payments::webhook;
use crate::payments::{ParsedWebhook, PaymentError};
use crate::services::OrderService;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/webhooks/payments", post(payment_webhook))
}

async fn payment_webhook(State(s): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Json<Value>, ApiError> {
    let signature = headers
        .get(WEBHOOK_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| PaymentError::InvalidSignature("missing signature header".to_string()))?;
    if let Err(e) = s.gateway.verify_webhook(&body, signature) {
        warn!(error = %e, "Rejected webhook");
        return Err(e.into());
    }

    let notification = match webhook::parse(&body)? {
        ParsedWebhook::Notification(n) => n,
        ParsedWebhook::Unsupported(event) => {
            info!(%event, "Ignoring webhook event");
            return Ok(Json(json!({"status": "ignored"})));
        }
    };

    let updated = OrderService::new(&s.db, &s.events)
        .apply_gateway_status(
            notification.gateway_order_id.as_deref(),
            notification.gateway_payment_id.as_deref(),
            notification.payment_status(),
        )
        .await?;

    match updated {
        Some(order) => {
            info!(
                event = notification.event.as_str(),
                order_number = %order.order_number(),
                amount = ?notification.amount,
                "Webhook processed"
            );
            Ok(Json(json!({"status": "processed", "order_number": order.order_number().as_str()})))
        }
        None => {
            warn!(
                event = notification.event.as_str(),
                gateway_order_id = ?notification.gateway_order_id,
                gateway_payment_id = ?notification.gateway_payment_id,
                "Webhook for unknown order"
            );
            Ok(Json(json!({"status": "order_not_found"})))
        }
    }
}
