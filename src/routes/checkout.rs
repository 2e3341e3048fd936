//! Checkout, payment and order tracking endpoints used by the storefront.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::db::OrderRepository;
use crate::domain::aggregates::{CouponVerdict, Order};
use crate::error::ApiError;
use crate::routes::extract::{ApiJson, ApiQuery};
use crate::services::checkout::{
    CartRequest, CouponCheckRequest, GatewayCheckout, PaymentVerification, PlaceOrderRequest, QuoteResponse,
    VerifyPaymentRequest,
};
use crate::services::{CheckoutService, FulfillmentService};
use crate::shipping::TrackingSummary;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/checkout/quote", post(quote))
        .route("/api/coupons/validate", post(validate_coupon))
        .route("/api/payments/orders", post(create_payment_order))
        .route("/api/payments/verify", post(verify_payment))
        .route("/api/orders", post(place_order))
        .route("/api/orders/track", get(track_order))
}

fn checkout(s: &AppState) -> CheckoutService<'_> {
    CheckoutService::new(&s.db, &s.gateway, &s.config.pricing, &s.events)
}

async fn quote(State(s): State<AppState>, ApiJson(r): ApiJson<CartRequest>) -> Result<Json<QuoteResponse>, ApiError> {
    Ok(Json(checkout(&s).quote(&r).await?))
}

async fn validate_coupon(
    State(s): State<AppState>,
    ApiJson(r): ApiJson<CouponCheckRequest>,
) -> Result<Json<CouponVerdict>, ApiError> {
    Ok(Json(checkout(&s).validate_coupon(&r).await?))
}

async fn create_payment_order(
    State(s): State<AppState>,
    ApiJson(r): ApiJson<CartRequest>,
) -> Result<(StatusCode, Json<GatewayCheckout>), ApiError> {
    Ok((StatusCode::CREATED, Json(checkout(&s).create_gateway_order(&r).await?)))
}

async fn verify_payment(
    State(s): State<AppState>,
    ApiJson(r): ApiJson<VerifyPaymentRequest>,
) -> Result<Json<PaymentVerification>, ApiError> {
    Ok(Json(checkout(&s).verify_payment(&r).await?))
}

async fn place_order(
    State(s): State<AppState>,
    ApiJson(r): ApiJson<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    Ok((StatusCode::CREATED, Json(checkout(&s).place_order(r).await?)))
}

#[derive(Debug, Deserialize)]
pub struct TrackQuery {
    /// Order number or order id.
    pub reference: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct TrackResponse {
    pub order: Order,
    /// Carrier status; absent until the order has an AWB or when the
    /// provider cannot be reached.
    pub tracking: Option<TrackingSummary>,
}

/// Shopper-facing lookup. The email must match the order, and a mismatch
/// answers the same 404 as an unknown reference.
async fn track_order(State(s): State<AppState>, ApiQuery(q): ApiQuery<TrackQuery>) -> Result<Json<TrackResponse>, ApiError> {
    let order = OrderRepository::new(&s.db)
        .find_by_reference(&q.reference)
        .await?
        .filter(|o| o.belongs_to(&q.email))
        .ok_or_else(|| ApiError::NotFound("Order not found".to_string()))?;

    let tracking = match order.shipment().and_then(|sh| sh.awb_code.as_ref()) {
        Some(_) => match FulfillmentService::new(&s.db, &s.shipping, &s.events).track(&order).await {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!(order_number = %order.order_number(), error = %e, "Tracking unavailable");
                None
            }
        },
        None => None,
    };
    Ok(Json(TrackResponse { order, tracking }))
}
