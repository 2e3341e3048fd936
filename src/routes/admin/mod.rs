//! Back office API, mounted at `/api/admin`.
//!
//! Every handler takes [`RequireAdmin`](crate::middleware::RequireAdmin), so
//! a signed-out request gets 401 and a customer account gets 403.

mod coupons;
mod customers;
mod orders;
mod products;
mod settings;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::db::stats::{self, DashboardStats};
use crate::error::ApiError;
use crate::middleware::RequireAdmin;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/stats", get(dashboard))
        .merge(products::routes())
        .merge(orders::routes())
        .merge(customers::routes())
        .merge(coupons::routes())
        .merge(settings::routes())
}

async fn dashboard(State(s): State<AppState>, _admin: RequireAdmin) -> Result<Json<DashboardStats>, ApiError> {
    Ok(Json(stats::dashboard(&s.db).await?))
}
