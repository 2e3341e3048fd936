use axum::extract::{Path, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::{OrderFilter, OrderRepository};
use crate::domain::aggregates::{Order, OrderStatus, PaymentStatus};
use crate::error::ApiError;
use crate::middleware::RequireAdmin;
use crate::routes::extract::{ApiJson, ApiQuery};
use crate::routes::{PaginatedResponse, Pagination};
use crate::services::{FulfillmentService, OrderService};
use crate::shipping::{PackageDetails, TrackingSummary};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/status", put(update_status))
        .route("/orders/:id/shipment", post(create_shipment))
        .route("/orders/:id/awb", post(assign_awb))
        .route("/orders/:id/tracking", get(tracking))
}

#[derive(Debug, Deserialize)]
pub struct AdminOrderQuery {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub email: Option<String>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

async fn list_orders(
    State(s): State<AppState>,
    _admin: RequireAdmin,
    ApiQuery(q): ApiQuery<AdminOrderQuery>,
) -> Result<Json<PaginatedResponse<Order>>, ApiError> {
    let pagination = Pagination { page: q.page, per_page: q.per_page };
    let filter = OrderFilter {
        status: q.status,
        payment_status: q.payment_status,
        email: q.email,
        search: q.search,
        page: pagination.page(),
        per_page: pagination.per_page(),
    };
    let (orders, total) = OrderRepository::new(&s.db).list(&filter).await?;
    Ok(Json(PaginatedResponse::new(orders, total, pagination)))
}

async fn load(s: &AppState, reference: &str) -> Result<Order, ApiError> {
    OrderRepository::new(&s.db)
        .find_by_reference(reference)
        .await?
        .ok_or_else(|| ApiError::NotFound("Order not found".to_string()))
}

/// Accepts an order id or an order number.
async fn get_order(
    State(s): State<AppState>,
    _admin: RequireAdmin,
    Path(reference): Path<String>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(load(&s, &reference).await?))
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
}

async fn update_status(
    State(s): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<Uuid>,
    ApiJson(r): ApiJson<StatusUpdate>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(OrderService::new(&s.db, &s.events).update_status(id, r.status).await?))
}

async fn create_shipment(
    State(s): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<Uuid>,
    ApiJson(package): ApiJson<PackageDetails>,
) -> Result<Json<Order>, ApiError> {
    let order = FulfillmentService::new(&s.db, &s.shipping, &s.events).create_shipment(id, &package).await?;
    Ok(Json(order))
}

#[derive(Debug, Default, Deserialize)]
pub struct AwbRequest {
    #[serde(default)]
    pub courier_id: Option<u32>,
}

async fn assign_awb(
    State(s): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<Uuid>,
    ApiJson(r): ApiJson<AwbRequest>,
) -> Result<Json<Order>, ApiError> {
    let order = FulfillmentService::new(&s.db, &s.shipping, &s.events).assign_awb(id, r.courier_id).await?;
    Ok(Json(order))
}

async fn tracking(
    State(s): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<Json<TrackingSummary>, ApiError> {
    let order = OrderRepository::new(&s.db)
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Order not found".to_string()))?;
    Ok(Json(FulfillmentService::new(&s.db, &s.shipping, &s.events).track(&order).await?))
}
