use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::db::{ProductFilter, ProductRepository};
use crate::domain::aggregates::{Product, ProductDraft};
use crate::error::ApiError;
use crate::middleware::RequireAdmin;
use crate::routes::extract::{ApiJson, ApiQuery};
use crate::routes::{PaginatedResponse, Pagination};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route("/products/:id", get(get_product).put(update_product).delete(archive_product))
}

#[derive(Debug, Deserialize)]
pub struct AdminProductQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

async fn list_products(
    State(s): State<AppState>,
    _admin: RequireAdmin,
    ApiQuery(q): ApiQuery<AdminProductQuery>,
) -> Result<Json<PaginatedResponse<Product>>, ApiError> {
    let pagination = Pagination { page: q.page, per_page: q.per_page };
    let filter = ProductFilter {
        category: q.category,
        search: q.search,
        featured: None,
        include_unpublished: true,
        page: pagination.page(),
        per_page: pagination.per_page(),
    };
    let (products, total) = ProductRepository::new(&s.db).list(&filter).await?;
    Ok(Json(PaginatedResponse::new(products, total, pagination)))
}

async fn load(s: &AppState, id: Uuid) -> Result<Product, ApiError> {
    ProductRepository::new(&s.db)
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Product not found".to_string()))
}

async fn get_product(State(s): State<AppState>, _admin: RequireAdmin, Path(id): Path<Uuid>) -> Result<Json<Product>, ApiError> {
    Ok(Json(load(&s, id).await?))
}

async fn create_product(
    State(s): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(draft): ApiJson<ProductDraft>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    draft.validate()?;
    let mut product = Product::create(draft)?;
    ProductRepository::new(&s.db).insert(&product).await?;
    info!(product_id = %product.id, sku = %product.sku, admin = %admin.email, "Product created");
    s.events.publish(product.take_events()).await;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn update_product(
    State(s): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<Uuid>,
    ApiJson(draft): ApiJson<ProductDraft>,
) -> Result<Json<Product>, ApiError> {
    draft.validate()?;
    let mut product = load(&s, id).await?;
    product.apply_draft(draft)?;
    ProductRepository::new(&s.db).update(&product).await?;
    info!(product_id = %product.id, admin = %admin.email, "Product updated");
    s.events.publish(product.take_events()).await;
    Ok(Json(product))
}

/// Products are archived rather than deleted so past orders keep resolving.
async fn archive_product(
    State(s): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let mut product = load(&s, id).await?;
    product.archive();
    ProductRepository::new(&s.db).update(&product).await?;
    info!(product_id = %product.id, admin = %admin.email, "Product archived");
    s.events.publish(product.take_events()).await;
    Ok(StatusCode::NO_CONTENT)
}
