//! HTTP routes.
//!
//! - `/health`
//! - `/api/...` storefront: catalog, checkout, order tracking, accounts
//! - `/api/webhooks/payments` gateway notifications
//! - `/api/admin/...` back office, admin session required

pub mod account;
pub mod admin;
pub mod catalog;
pub mod checkout;
pub mod extract;
pub mod webhooks;

use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::create_session_layer;
use crate::state::AppState;

/// Default page size for listings.
pub const DEFAULT_PER_PAGE: u32 = 20;
/// Largest page size a client may ask for.
pub const MAX_PER_PAGE: u32 = 100;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Pagination {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl Pagination {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> u32 {
        self.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE)
    }
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, total: i64, pagination: Pagination) -> Self {
        Self { data, total, page: pagination.page(), per_page: pagination.per_page() }
    }
}

/// Builds the full application router.
pub fn router(state: AppState) -> Router {
    let session_layer = create_session_layer(state.config.cookie_secure);

    Router::new()
        .route("/health", get(|| async { Json(json!({"status": "healthy", "service": "ayurvedic-store"})) }))
        .merge(catalog::routes())
        .merge(checkout::routes())
        .merge(account::routes())
        .merge(webhooks::routes())
        .nest("/api/admin", admin::routes())
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
