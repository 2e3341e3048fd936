use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::db::CustomerRepository;
use crate::domain::aggregates::{Customer, CustomerDraft};
use crate::error::ApiError;
use crate::middleware::RequireAdmin;
use crate::routes::extract::{ApiJson, ApiQuery};
use crate::routes::{PaginatedResponse, Pagination};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/customers", get(list_customers).post(create_customer))
        .route("/customers/:id", get(get_customer).put(update_customer).delete(delete_customer))
}

#[derive(Debug, Deserialize)]
pub struct CustomerQuery {
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

async fn list_customers(
    State(s): State<AppState>,
    _admin: RequireAdmin,
    ApiQuery(q): ApiQuery<CustomerQuery>,
) -> Result<Json<PaginatedResponse<Customer>>, ApiError> {
    let pagination = Pagination { page: q.page, per_page: q.per_page };
    let search = q.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let (customers, total) = CustomerRepository::new(&s.db)
        .list(search, pagination.page(), pagination.per_page())
        .await?;
    Ok(Json(PaginatedResponse::new(customers, total, pagination)))
}

async fn load(s: &AppState, id: Uuid) -> Result<Customer, ApiError> {
    CustomerRepository::new(&s.db)
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Customer not found".to_string()))
}

async fn get_customer(State(s): State<AppState>, _admin: RequireAdmin, Path(id): Path<Uuid>) -> Result<Json<Customer>, ApiError> {
    Ok(Json(load(&s, id).await?))
}

async fn create_customer(
    State(s): State<AppState>,
    _admin: RequireAdmin,
    ApiJson(draft): ApiJson<CustomerDraft>,
) -> Result<(StatusCode, Json<Customer>), ApiError> {
    draft.validate()?;
    let customer = Customer::create(draft);
    CustomerRepository::new(&s.db).insert(&customer).await?;
    info!(customer_id = %customer.id, "Customer created");
    Ok((StatusCode::CREATED, Json(customer)))
}

async fn update_customer(
    State(s): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<Uuid>,
    ApiJson(draft): ApiJson<CustomerDraft>,
) -> Result<Json<Customer>, ApiError> {
    draft.validate()?;
    let mut customer = load(&s, id).await?;
    customer.apply_draft(draft);
    CustomerRepository::new(&s.db).update(&customer).await?;
    Ok(Json(customer))
}

async fn delete_customer(State(s): State<AppState>, _admin: RequireAdmin, Path(id): Path<Uuid>) -> Result<StatusCode, ApiError> {
    CustomerRepository::new(&s.db).delete(id).await?;
    info!(customer_id = %id, "Customer deleted");
    Ok(StatusCode::NO_CONTENT)
}
