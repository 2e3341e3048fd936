//! Payment gateway REST client.

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use super::signature;
use super::PaymentError;
use crate::config::GatewayConfig;

/// Orders below ₹1 are rejected by the gateway.
const MIN_AMOUNT_MINOR: i64 = 100;

/// Gateway API client.
#[derive(Clone)]
pub struct GatewayClient {
    client: Client,
    base_url: String,
    key_id: String,
    key_secret: SecretString,
    webhook_secret: SecretString,
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("base_url", &self.base_url)
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    notes: &'a serde_json::Value,
}

/// Order as created on the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayOrder {
    pub id: String,
    /// Amount in paise.
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    pub status: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

impl GatewayClient {
    #[must_use]
    pub fn new(config: &GatewayConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    #[must_use]
    pub fn with_client(client: Client, config: &GatewayConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
            webhook_secret: config.webhook_secret.clone(),
        }
    }

    /// Public key id handed to the browser checkout.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Create a gateway order for `amount_minor` paise.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidAmount` below the gateway minimum, or an
    /// HTTP/API error when the gateway rejects the request.
    #[instrument(skip(self, notes), fields(amount = amount_minor, receipt = %receipt))]
    pub async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
        notes: &serde_json::Value,
    ) -> Result<GatewayOrder, PaymentError> {
        if amount_minor < MIN_AMOUNT_MINOR {
            return Err(PaymentError::InvalidAmount(format!("{amount_minor} paise is below the minimum")));
        }

        let response = self
            .client
            .post(format!("{}/v1/orders", self.base_url))
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .json(&CreateOrderRequest { amount: amount_minor, currency, receipt, notes })
            .send()
            .await?;

        if !response.status().is_success() {
            let err = Self::api_error(response).await;
            error!(error = %err, "Gateway rejected order creation");
            return Err(err);
        }

        let order: GatewayOrder = response.json().await?;
        debug!(gateway_order_id = %order.id, "Gateway order created");
        Ok(order)
    }

    /// Fetch a gateway order, e.g. to check the amount it was created for.
    ///
    /// # Errors
    ///
    /// Returns an HTTP/API error when the gateway rejects the request.
    #[instrument(skip(self))]
    pub async fn fetch_order(&self, gateway_order_id: &str) -> Result<GatewayOrder, PaymentError> {
        let response = self
            .client
            .get(format!("{}/v1/orders/{gateway_order_id}", self.base_url))
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        Ok(response.json().await?)
    }

    async fn api_error(response: reqwest::Response) -> PaymentError {
        let status = response.status().as_u16();
        let message = match response.json::<ErrorEnvelope>().await {
            Ok(envelope) => envelope.error.description.or(envelope.error.code).unwrap_or_else(|| "Unknown error".to_string()),
            Err(_) => "Unknown error".to_string(),
        };
        PaymentError::Api { status, message }
    }

    /// Verify the checkout callback signature.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidSignature` on mismatch.
    pub fn verify_checkout(&self, gateway_order_id: &str, gateway_payment_id: &str, signature: &str) -> Result<(), PaymentError> {
        signature::verify_checkout_signature(&self.key_secret, gateway_order_id, gateway_payment_id, signature)
    }

    /// Verify a webhook body against its signature header.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidSignature` on mismatch.
    pub fn verify_webhook(&self, body: &[u8], signature: &str) -> Result<(), PaymentError> {
        signature::verify_webhook_signature(&self.webhook_secret, body, signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GatewayConfig {
        GatewayConfig {
            base_url: "http://localhost:9/".to_string(),
            key_id: "rzp_test_abc".to_string(),
            key_secret: SecretString::from("key-secret".to_string()),
            webhook_secret: SecretString::from("hook-secret".to_string()),
        }
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let client = GatewayClient::new(&config());
        let debug = format!("{client:?}");
        assert!(debug.contains("rzp_test_abc"));
        assert!(!debug.contains("key-secret"));
        assert!(!debug.contains("hook-secret"));
    }

    #[test]
    fn test_secrets_are_not_interchangeable() {
        let client = GatewayClient::new(&config());
        let by_key = signature::sign(&SecretString::from("key-secret".to_string()), b"{}").unwrap();
        assert!(client.verify_webhook(b"{}", &by_key).is_err());
        let by_hook = signature::sign(&SecretString::from("hook-secret".to_string()), b"{}").unwrap();
        assert!(client.verify_webhook(b"{}", &by_hook).is_ok());
    }

    #[tokio::test]
    async fn test_rejects_amount_below_minimum() {
        let client = GatewayClient::new(&config());
        let result = client.create_order(99, "INR", "rcpt", &serde_json::json!({})).await;
        assert!(matches!(result, Err(PaymentError::InvalidAmount(_))));
    }
}
