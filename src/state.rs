//! Shared application state.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::payments::GatewayClient;
use crate::services::EventPublisher;
use crate::shipping::ShippingClient;

/// State handed to every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub gateway: GatewayClient,
    pub shipping: ShippingClient,
    pub events: EventPublisher,
}

impl AppState {
    /// Builds the state and its HTTP clients from `config`.
    #[must_use]
    pub fn new(config: AppConfig, db: PgPool, events: EventPublisher) -> Self {
        let http = reqwest::Client::new();
        Self {
            gateway: GatewayClient::with_client(http.clone(), &config.gateway),
            shipping: ShippingClient::with_client(http, &config.shipping_base_url),
            config: Arc::new(config),
            db,
            events,
        }
    }
}
