//! Logistics provider authentication.
//!
//! Exchanges the account email/password for a bearer token.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::instrument;

use super::types::{LoginRequest, LoginResponse};
use super::ShippingError;

#[derive(Deserialize)]
struct AuthErrorResponse {
    #[serde(default)]
    message: Option<String>,
}

/// Authenticate with the provider.
///
/// # Errors
///
/// Returns `ShippingError::AuthenticationFailed` if the credentials are
/// rejected, or `ShippingError::Http` if the request fails.
#[instrument(skip(client, password), fields(email = %email))]
pub async fn authenticate(
    client: &reqwest::Client,
    base_url: &str,
    email: &str,
    password: &SecretString,
) -> Result<SecretString, ShippingError> {
    let response = client
        .post(format!("{base_url}/v1/external/auth/login"))
        .json(&LoginRequest { email, password: password.expose_secret() })
        .send()
        .await?;

    let status = response.status();

    if status.is_success() {
        let login: LoginResponse = response.json().await?;
        Ok(SecretString::from(login.token))
    } else if status.is_client_error() {
        let message = response
            .json::<AuthErrorResponse>()
            .await
            .ok()
            .and_then(|e| e.message)
            .unwrap_or_else(|| "Invalid credentials".to_string());
        Err(ShippingError::AuthenticationFailed(message))
    } else {
        let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
        Err(ShippingError::AuthenticationFailed(format!("HTTP {status}: {error_text}")))
    }
}
