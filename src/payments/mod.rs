//! Payment gateway integration (Razorpay-compatible API).
//!
//! # Flow
//!
//! 1. The storefront asks for a gateway order; the amount comes from the
//!    server-side quote, never from the browser.
//! 2. The browser completes checkout and returns `order_id`, `payment_id` and
//!    a signature, verified with [`signature::verify_checkout_signature`].
//! 3. The gateway also calls the webhook; the raw body is authenticated with
//!    [`signature::verify_webhook_signature`] before anything is parsed.

pub mod client;
pub mod signature;
pub mod webhook;

pub use client::{GatewayClient, GatewayOrder};
pub use webhook::{ParsedWebhook, PaymentNotification, WebhookEvent};

use thiserror::Error;

/// Errors that can occur when talking to the payment gateway.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Gateway rejected the request.
    #[error("Gateway error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Signature missing, malformed or not matching.
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// Webhook body could not be parsed.
    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    /// Webhook body lacks a field the event needs.
    #[error("Webhook payload missing {0}")]
    MissingField(&'static str),

    /// Amount cannot be charged.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_error_display() {
        let err = PaymentError::Api { status: 400, message: "amount too low".to_string() };
        assert_eq!(err.to_string(), "Gateway error (400): amount too low");

        let err = PaymentError::InvalidSignature("Signature mismatch".to_string());
        assert_eq!(err.to_string(), "Invalid signature: Signature mismatch");
    }
}
