//! Sign-up, sign-in and the shopper's own order history.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_sessions::Session;
use tracing::info;
use validator::Validate;

use crate::db::{OrderFilter, OrderRepository};
use crate::domain::aggregates::Order;
use crate::error::ApiError;
use crate::middleware::session::keys;
use crate::middleware::RequireUser;
use crate::routes::extract::{ApiJson, ApiQuery};
use crate::routes::{PaginatedResponse, Pagination};
use crate::services::{AuthService, CurrentUser};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/session", get(current_session))
        .route("/api/account/orders", get(my_orders))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Starts a fresh session for `user`, dropping any previous session id.
async fn sign_in(session: &Session, user: &CurrentUser) -> Result<(), ApiError> {
    session.cycle_id().await?;
    session.insert(keys::CURRENT_USER, user).await?;
    Ok(())
}

async fn register(
    State(s): State<AppState>,
    session: Session,
    ApiJson(r): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<CurrentUser>), ApiError> {
    r.validate()?;
    let password = SecretString::from(r.password);
    let user = AuthService::new(&s.db).register(&r.name, &r.email, &password).await?;
    sign_in(&session, &user).await?;
    info!(user_id = %user.id, "Account registered");
    Ok((StatusCode::CREATED, Json(user)))
}

async fn login(
    State(s): State<AppState>,
    session: Session,
    ApiJson(r): ApiJson<LoginRequest>,
) -> Result<Json<CurrentUser>, ApiError> {
    let password = SecretString::from(r.password);
    let user = AuthService::new(&s.db).login(&r.email, &password).await?;
    sign_in(&session, &user).await?;
    info!(user_id = %user.id, admin = user.is_admin(), "Signed in");
    Ok(Json(user))
}

async fn logout(session: Session) -> Result<StatusCode, ApiError> {
    session.flush().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Current identity, re-read from the database so a deleted account or a
/// changed role takes effect without waiting for the cookie to expire.
async fn current_session(State(s): State<AppState>, session: Session) -> Result<Json<Value>, ApiError> {
    let Some(user) = session.get::<CurrentUser>(keys::CURRENT_USER).await? else {
        return Ok(Json(json!({"authenticated": false})));
    };
    match AuthService::new(&s.db).refresh(user.id).await? {
        Some(fresh) => {
            if fresh != user {
                session.insert(keys::CURRENT_USER, &fresh).await?;
            }
            Ok(Json(json!({"authenticated": true, "user": fresh})))
        }
        None => {
            session.flush().await?;
            Ok(Json(json!({"authenticated": false})))
        }
    }
}

async fn my_orders(
    State(s): State<AppState>,
    RequireUser(user): RequireUser,
    ApiQuery(p): ApiQuery<Pagination>,
) -> Result<Json<PaginatedResponse<Order>>, ApiError> {
    let filter = OrderFilter { email: Some(user.email), page: p.page(), per_page: p.per_page(), ..Default::default() };
    let (orders, total) = OrderRepository::new(&s.db).list(&filter).await?;
    Ok(Json(PaginatedResponse::new(orders, total, p)))
}
