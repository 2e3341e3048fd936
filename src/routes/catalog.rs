//! Public catalog.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::products::CategorySummary;
use crate::db::{ProductFilter, ProductRepository};
use crate::domain::aggregates::{Product, ProductStatus};
use crate::error::ApiError;
use crate::routes::extract::ApiQuery;
use crate::routes::{PaginatedResponse, Pagination};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/products", get(list_products))
        .route("/api/products/:slug_or_id", get(get_product))
        .route("/api/categories", get(list_categories))
}

#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub featured: Option<bool>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

async fn list_products(
    State(s): State<AppState>,
    ApiQuery(q): ApiQuery<ProductQuery>,
) -> Result<Json<PaginatedResponse<Product>>, ApiError> {
    let pagination = Pagination { page: q.page, per_page: q.per_page };
    let filter = ProductFilter {
        category: q.category,
        search: q.search,
        featured: q.featured,
        include_unpublished: false,
        page: pagination.page(),
        per_page: pagination.per_page(),
    };
    let (products, total) = ProductRepository::new(&s.db).list(&filter).await?;
    Ok(Json(PaginatedResponse::new(products, total, pagination)))
}

/// Draft and archived products are hidden from shoppers.
async fn get_product(State(s): State<AppState>, Path(slug_or_id): Path<String>) -> Result<Json<Product>, ApiError> {
    let repo = ProductRepository::new(&s.db);
    let product = match Uuid::parse_str(&slug_or_id) {
        Ok(id) => repo.find_by_id(id).await?,
        Err(_) => repo.find_by_slug(&slug_or_id).await?,
    };
    product
        .filter(|p| p.status == ProductStatus::Active)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Product not found".to_string()))
}

async fn list_categories(State(s): State<AppState>) -> Result<Json<Vec<CategorySummary>>, ApiError> {
    Ok(Json(ProductRepository::new(&s.db).categories().await?))
}
