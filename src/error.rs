//! API error type.
//!
//! Handlers return `Result<T, ApiError>`. Every error renders as
//! `{"error": "<message>"}`; server-side failures are logged and answered
//! with a generic message.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::domain::aggregates::{CartError, CouponError, CouponRejection, OrderError, ProductError};
use crate::domain::value_objects::{CouponCodeError, MoneyError};
use crate::payments::PaymentError;
use crate::services::auth::AuthError;
use crate::shipping::ShippingError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Shipping(#[from] ShippingError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Product(#[from] ProductError),

    #[error(transparent)]
    Coupon(#[from] CouponError),

    #[error(transparent)]
    CouponRejected(#[from] CouponRejection),

    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Admin access required")]
    Forbidden,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

impl From<CouponCodeError> for ApiError {
    fn from(e: CouponCodeError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

impl From<MoneyError> for ApiError {
    fn from(e: MoneyError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self::BadRequest(e.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        Self::BadRequest(e.body_text())
    }
}

impl From<tower_sessions::session::Error> for ApiError {
    fn from(e: tower_sessions::session::Error) -> Self {
        Self::Internal(format!("session error: {e}"))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Repository(RepositoryError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Repository(RepositoryError::Conflict(_)) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Repository(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Payment(e) => match e {
                PaymentError::InvalidSignature(_)
                | PaymentError::MalformedPayload(_)
                | PaymentError::MissingField(_)
                | PaymentError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
                PaymentError::Http(_) | PaymentError::Api { .. } => StatusCode::BAD_GATEWAY,
            },
            Self::Shipping(e) => match e {
                ShippingError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
                ShippingError::InvalidPackage => StatusCode::BAD_REQUEST,
                ShippingError::AwbNotAssigned(_) => StatusCode::UNPROCESSABLE_ENTITY,
                ShippingError::Http(_) | ShippingError::Api { .. } | ShippingError::AuthenticationFailed(_) => {
                    StatusCode::BAD_GATEWAY
                }
            },
            Self::Auth(e) => match e {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::WeakPassword(_) => StatusCode::BAD_REQUEST,
                AuthError::Repository(_) | AuthError::PasswordHash => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Cart(CartError::InsufficientStock { .. }) => StatusCode::CONFLICT,
            Self::Order(OrderError::InvalidTransition { .. }
                | OrderError::ShipmentExists
                | OrderError::NoShipment
                | OrderError::NotReadyToShip(_)) => {
                StatusCode::CONFLICT
            }
            Self::Cart(_)
            | Self::Order(_)
            | Self::Product(_)
            | Self::Coupon(_)
            | Self::CouponRejected(_)
            | Self::Validation(_)
            | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            match (status, &self) {
                // shipping errors only reach admins, who need the provider's reason
                (_, Self::Shipping(_)) => self.to_string(),
                (StatusCode::BAD_GATEWAY, _) => "Upstream service error".to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            self.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::Repository(RepositoryError::NotFound).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Shipping(ShippingError::NotConfigured).status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            ApiError::Payment(PaymentError::InvalidSignature("Signature mismatch".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::CouponRejected(CouponRejection::Expired).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::Cart(CartError::InsufficientStock { product: "Chyawanprash".into(), available: 1 }).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(ApiError::Forbidden.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_internal_details_hidden() {
        let response = ApiError::Internal("pool timed out".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
