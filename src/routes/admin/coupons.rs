use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::db::CouponRepository;
use crate::domain::aggregates::{Coupon, CouponDraft};
use crate::error::ApiError;
use crate::middleware::RequireAdmin;
use crate::routes::extract::ApiJson;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/coupons", get(list_coupons).post(create_coupon))
        .route("/coupons/:id", get(get_coupon).put(update_coupon).delete(delete_coupon))
}

async fn list_coupons(State(s): State<AppState>, _admin: RequireAdmin) -> Result<Json<Vec<Coupon>>, ApiError> {
    Ok(Json(CouponRepository::new(&s.db).list().await?))
}

async fn load(s: &AppState, id: Uuid) -> Result<Coupon, ApiError> {
    CouponRepository::new(&s.db)
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Coupon not found".to_string()))
}

async fn get_coupon(State(s): State<AppState>, _admin: RequireAdmin, Path(id): Path<Uuid>) -> Result<Json<Coupon>, ApiError> {
    Ok(Json(load(&s, id).await?))
}

async fn create_coupon(
    State(s): State<AppState>,
    _admin: RequireAdmin,
    ApiJson(draft): ApiJson<CouponDraft>,
) -> Result<(StatusCode, Json<Coupon>), ApiError> {
    draft.validate()?;
    let coupon = Coupon::create(draft)?;
    CouponRepository::new(&s.db).insert(&coupon).await?;
    info!(code = %coupon.code, "Coupon created");
    Ok((StatusCode::CREATED, Json(coupon)))
}

/// Edits keep the usage counter.
async fn update_coupon(
    State(s): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<Uuid>,
    ApiJson(draft): ApiJson<CouponDraft>,
) -> Result<Json<Coupon>, ApiError> {
    draft.validate()?;
    let mut coupon = load(&s, id).await?;
    coupon.apply_draft(draft)?;
    CouponRepository::new(&s.db).update(&coupon).await?;
    Ok(Json(coupon))
}

async fn delete_coupon(State(s): State<AppState>, _admin: RequireAdmin, Path(id): Path<Uuid>) -> Result<StatusCode, ApiError> {
    CouponRepository::new(&s.db).delete(id).await?;
    info!(coupon_id = %id, "Coupon deleted");
    Ok(StatusCode::NO_CONTENT)
}
