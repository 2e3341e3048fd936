//! Logistics API client with a cached bearer token.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use super::auth;
use super::types::{
    AssignAwbRequest, AssignAwbResponse, AwbAssignment, CreateOrderRequest, CreateOrderResponse, TrackResponse,
    TrackingSummary,
};
use super::ShippingError;

/// Provider tokens are valid for 10 days; refresh a day early.
const TOKEN_LIFETIME_DAYS: i64 = 9;

/// Account used to call the provider, as saved in settings.
#[derive(Clone)]
pub struct ShippingCredentials {
    pub email: String,
    pub password: SecretString,
    /// Pickup address nickname registered with the provider.
    pub pickup_location: String,
    pub channel_id: Option<String>,
}

impl std::fmt::Debug for ShippingCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShippingCredentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("pickup_location", &self.pickup_location)
            .field("channel_id", &self.channel_id)
            .finish()
    }
}

struct CachedToken {
    email: String,
    token: SecretString,
    expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Logistics API client.
#[derive(Clone)]
pub struct ShippingClient {
    client: Client,
    base_url: String,
    token: Arc<RwLock<Option<CachedToken>>>,
}

impl std::fmt::Debug for ShippingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShippingClient").field("base_url", &self.base_url).finish_non_exhaustive()
    }
}

impl ShippingClient {
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    #[must_use]
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self { client, base_url: base_url.trim_end_matches('/').to_string(), token: Arc::new(RwLock::new(None)) }
    }

    /// Drop the cached token, e.g. after credentials change.
    pub async fn invalidate_token(&self) {
        *self.token.write().await = None;
    }

    /// Return a valid token, logging in when none is cached for `credentials`.
    ///
    /// # Errors
    ///
    /// Returns `ShippingError::AuthenticationFailed` when login is rejected.
    pub async fn token(&self, credentials: &ShippingCredentials) -> Result<SecretString, ShippingError> {
        {
            let cached = self.token.read().await;
            if let Some(t) = cached.as_ref() {
                if t.email == credentials.email && t.expires_at > Utc::now() {
                    return Ok(t.token.clone());
                }
            }
        }

        let token = auth::authenticate(&self.client, &self.base_url, &credentials.email, &credentials.password).await?;
        *self.token.write().await = Some(CachedToken {
            email: credentials.email.clone(),
            token: token.clone(),
            expires_at: Utc::now() + Duration::days(TOKEN_LIFETIME_DAYS),
        });
        debug!("Shipping provider token refreshed");
        Ok(token)
    }

    /// Create a provider order for an already placed store order.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication or the request fails.
    #[instrument(skip(self, credentials, request), fields(order_number = %request.order_id))]
    pub async fn create_order(
        &self,
        credentials: &ShippingCredentials,
        request: &CreateOrderRequest,
    ) -> Result<CreateOrderResponse, ShippingError> {
        let url = format!("{}/v1/external/orders/create/adhoc", self.base_url);
        let builder = self.client.post(url).json(request);
        self.send_json(credentials, builder).await
    }

    /// Assign a courier and AWB to a provider shipment.
    ///
    /// # Errors
    ///
    /// Returns `ShippingError::AwbNotAssigned` when the provider reports no
    /// assignment.
    #[instrument(skip(self, credentials))]
    pub async fn assign_awb(
        &self,
        credentials: &ShippingCredentials,
        shipment_id: &str,
        courier_id: Option<u32>,
    ) -> Result<AwbAssignment, ShippingError> {
        let url = format!("{}/v1/external/courier/assign/awb", self.base_url);
        let builder = self
            .client
            .post(url)
            .json(&AssignAwbRequest { shipment_id: shipment_id.to_string(), courier_id });
        let response: AssignAwbResponse = self.send_json(credentials, builder).await?;

        match response.response {
            Some(body) if response.awb_assign_status == 1 && !body.data.awb_code.is_empty() => {
                Ok(AwbAssignment { awb_code: body.data.awb_code, courier_name: body.data.courier_name })
            }
            _ => Err(ShippingError::AwbNotAssigned(
                response.message.unwrap_or_else(|| "No courier available".to_string()),
            )),
        }
    }

    /// Fetch tracking for an AWB.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication or the request fails, or the provider
    /// reports a tracking error.
    #[instrument(skip(self, credentials))]
    pub async fn track_awb(&self, credentials: &ShippingCredentials, awb_code: &str) -> Result<TrackingSummary, ShippingError> {
        let url = format!("{}/v1/external/courier/track/awb/{awb_code}", self.base_url);
        let builder = self.client.get(url);
        let response: TrackResponse = self.send_json(credentials, builder).await?;
        if let (Some(error), true) = (&response.tracking_data.error, response.tracking_data.shipment_track.is_empty()) {
            return Err(ShippingError::Api { status: StatusCode::OK.as_u16(), message: error.clone() });
        }
        Ok(TrackingSummary::from_response(awb_code, response.tracking_data))
    }

    /// Send an authenticated request. A 401 drops the token and retries once
    /// with a fresh login.
    async fn send_json<T: DeserializeOwned>(
        &self,
        credentials: &ShippingCredentials,
        builder: RequestBuilder,
    ) -> Result<T, ShippingError> {
        let retry = builder.try_clone();
        let token = self.token(credentials).await?;
        let response = builder.bearer_auth(token.expose_secret()).send().await?;

        let response = match (response.status(), retry) {
            (StatusCode::UNAUTHORIZED, Some(retry)) => {
                warn!("Shipping provider token rejected, logging in again");
                self.invalidate_token().await;
                let token = self.token(credentials).await?;
                retry.bearer_auth(token.expose_secret()).send().await?
            }
            _ => response,
        };

        Self::parse(response).await
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, ShippingError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        let message = response
            .json::<ApiErrorBody>()
            .await
            .ok()
            .and_then(|b| b.message)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string());
        Err(ShippingError::Api { status: status.as_u16(), message })
    }
}
