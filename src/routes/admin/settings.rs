use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use secrecy::SecretString;
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::db::settings::{self, ShippingSettingsView};
use crate::error::ApiError;
use crate::middleware::RequireAdmin;
use crate::routes::extract::ApiJson;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/settings/shipping", get(get_shipping).put(update_shipping))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ShippingSettingsUpdate {
    #[validate(email)]
    pub email: String,
    /// Blank or absent keeps the stored password.
    #[serde(default)]
    pub password: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub pickup_location: String,
    #[serde(default)]
    pub channel_id: Option<String>,
}

async fn get_shipping(State(s): State<AppState>, _admin: RequireAdmin) -> Result<Json<ShippingSettingsView>, ApiError> {
    Ok(Json(settings::shipping(&s.db).await?.view()))
}

/// Saving drops the cached provider token so the next call logs in with the
/// new credentials.
async fn update_shipping(
    State(s): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(r): ApiJson<ShippingSettingsUpdate>,
) -> Result<Json<ShippingSettingsView>, ApiError> {
    r.validate()?;
    let mut current = settings::shipping(&s.db).await?;
    let password = r.password.map(SecretString::from);
    let channel_id = r.channel_id.filter(|c| !c.trim().is_empty());
    current.merge(r.email, password.as_ref(), r.pickup_location, channel_id);
    settings::save_shipping(&s.db, &current).await?;
    s.shipping.invalidate_token().await;
    info!(admin = %admin.email, "Shipping settings updated");
    Ok(Json(current.view()))
}
