//! Logistics provider integration (Shiprocket-compatible REST API).
//!
//! # Architecture
//!
//! - Two-step authentication: stored email/password → bearer token → API
//! - Credentials live in the `settings` table and are edited from the admin
//!   panel; the integration is optional and reports `NotConfigured` until set
//! - Tokens are cached in memory and dropped whenever credentials change

pub mod auth;
pub mod client;
pub mod types;

pub use client::{ShippingClient, ShippingCredentials};
pub use types::{AwbAssignment, CreateOrderRequest, PackageDetails, TrackingSummary};

use thiserror::Error;

/// Errors that can occur when interacting with the logistics API.
#[derive(Debug, Error)]
pub enum ShippingError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider returned a non-success response.
    #[error("Provider error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Login with the stored credentials failed.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Credentials were never saved.
    #[error("Shipping provider is not configured")]
    NotConfigured,

    /// Courier could not be assigned.
    #[error("AWB assignment failed: {0}")]
    AwbNotAssigned(String),

    /// Package dimensions missing or non-positive.
    #[error("Invalid package details")]
    InvalidPackage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shipping_error_display() {
        let err = ShippingError::AuthenticationFailed("Invalid credentials".to_string());
        assert_eq!(err.to_string(), "Authentication failed: Invalid credentials");

        let err = ShippingError::Api { status: 422, message: "Pincode not serviceable".to_string() };
        assert_eq!(err.to_string(), "Provider error (422): Pincode not serviceable");

        assert_eq!(ShippingError::NotConfigured.to_string(), "Shipping provider is not configured");
    }
}
