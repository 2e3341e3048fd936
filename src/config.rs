//! Service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string
//! - `RAZORPAY_KEY_ID` - Payment gateway key id (sent to the browser checkout)
//! - `RAZORPAY_KEY_SECRET` - Payment gateway key secret
//! - `RAZORPAY_WEBHOOK_SECRET` - Secret used to sign gateway webhooks
//!
//! ## Optional
//! - `HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 8083)
//! - `RAZORPAY_BASE_URL` - Gateway API base (default: <https://api.razorpay.com>)
//! - `SHIPROCKET_BASE_URL` - Logistics API base (default: <https://apiv2.shiprocket.in>)
//! - `NATS_URL` - Publish domain events to NATS when set
//! - `FREE_SHIPPING_THRESHOLD` - Rupees; orders at or above ship free (default: 499)
//! - `FLAT_SHIPPING_FEE` - Rupees charged below the threshold (default: 50)
//! - `ADMIN_EMAIL` / `ADMIN_PASSWORD` - Bootstrap admin created when none exists
//! - `COOKIE_SECURE` - Mark the session cookie `Secure` (default: false)

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;

use crate::domain::aggregates::PricingRules;

const DEFAULT_PORT: u16 = 8083;
const DEFAULT_RAZORPAY_BASE_URL: &str = "https://api.razorpay.com";
const DEFAULT_SHIPROCKET_BASE_URL: &str = "https://apiv2.shiprocket.in";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Top-level configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    pub host: IpAddr,
    pub port: u16,
    pub gateway: GatewayConfig,
    pub shipping_base_url: String,
    pub nats_url: Option<String>,
    pub pricing: PricingRules,
    pub bootstrap_admin: Option<BootstrapAdmin>,
    pub cookie_secure: bool,
}

/// Payment gateway credentials.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub key_id: String,
    pub key_secret: SecretString,
    pub webhook_secret: SecretString,
}

/// Admin account created on first start.
#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: SecretString,
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a required variable is missing or a value
    /// fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = optional_parse("HOST")?.unwrap_or(IpAddr::from([0, 0, 0, 0]));
        let port = optional_parse("PORT")?.unwrap_or(DEFAULT_PORT);

        let gateway = GatewayConfig {
            base_url: optional("RAZORPAY_BASE_URL").unwrap_or_else(|| DEFAULT_RAZORPAY_BASE_URL.to_string()),
            key_id: required("RAZORPAY_KEY_ID")?,
            key_secret: SecretString::from(required("RAZORPAY_KEY_SECRET")?),
            webhook_secret: SecretString::from(required("RAZORPAY_WEBHOOK_SECRET")?),
        };

        let defaults = PricingRules::default();
        let pricing = PricingRules {
            free_shipping_threshold: optional_parse::<Decimal>("FREE_SHIPPING_THRESHOLD")?
                .unwrap_or(defaults.free_shipping_threshold),
            flat_shipping_fee: optional_parse::<Decimal>("FLAT_SHIPPING_FEE")?.unwrap_or(defaults.flat_shipping_fee),
        };

        let bootstrap_admin = match (optional("ADMIN_EMAIL"), optional("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(BootstrapAdmin { email, password: SecretString::from(password) }),
            _ => None,
        };

        Ok(Self {
            database_url: SecretString::from(required("DATABASE_URL")?),
            host,
            port,
            gateway,
            shipping_base_url: optional("SHIPROCKET_BASE_URL")
                .unwrap_or_else(|| DEFAULT_SHIPROCKET_BASE_URL.to_string()),
            nats_url: optional("NATS_URL"),
            pricing,
            bootstrap_admin,
            cookie_secure: optional_parse("COOKIE_SECURE")?.unwrap_or(false),
        })
    }

    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn required(key: &str) -> Result<String, ConfigError> {
    optional(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

fn optional_parse<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    optional(key)
        .map(|v| v.trim().parse::<T>().map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingEnvVar("DATABASE_URL".to_string());
        assert_eq!(err.to_string(), "Missing environment variable: DATABASE_URL");
    }

    #[test]
    fn test_secrets_redacted_in_debug() {
        let gateway = GatewayConfig {
            base_url: DEFAULT_RAZORPAY_BASE_URL.to_string(),
            key_id: "rzp_test_key".to_string(),
            key_secret: SecretString::from("super-secret-value".to_string()),
            webhook_secret: SecretString::from("whsec-value".to_string()),
        };
        let debug = format!("{gateway:?}");
        assert!(debug.contains("rzp_test_key"));
        assert!(!debug.contains("super-secret-value"));
        assert!(!debug.contains("whsec-value"));
    }
}
