//! Settings stored as JSONB rows.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;

use super::RepositoryError;
use crate::shipping::ShippingCredentials;

/// Settings row holding the logistics provider account.
pub const SHIPPING_KEY: &str = "shipping";

/// Get a setting value.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub async fn get_setting(pool: &PgPool, key: &str) -> Result<Option<JsonValue>, RepositoryError> {
    let row: Option<(JsonValue,)> = sqlx::query_as("SELECT value FROM settings WHERE key = $1")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|(v,)| v))
}

/// Set a setting value.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub async fn set_setting(pool: &PgPool, key: &str, value: &JsonValue) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES ($1, $2) \
         ON CONFLICT (key) DO UPDATE SET value = $2, updated_at = NOW()",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

/// Stored shape of the shipping settings.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ShippingSettings {
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub pickup_location: String,
    #[serde(default)]
    pub channel_id: Option<String>,
}

impl std::fmt::Debug for ShippingSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShippingSettings")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("pickup_location", &self.pickup_location)
            .field("channel_id", &self.channel_id)
            .finish()
    }
}

/// Shipping settings as shown to admins; the password never leaves the server.
#[derive(Debug, Clone, Serialize)]
pub struct ShippingSettingsView {
    pub email: String,
    pub pickup_location: String,
    pub channel_id: Option<String>,
    pub has_password: bool,
    pub configured: bool,
}

impl ShippingSettings {
    /// Credentials usable by the shipping client, if complete.
    pub fn credentials(&self) -> Option<ShippingCredentials> {
        if self.email.trim().is_empty() || self.password.is_empty() || self.pickup_location.trim().is_empty() {
            return None;
        }
        Some(ShippingCredentials {
            email: self.email.trim().to_string(),
            password: SecretString::from(self.password.clone()),
            pickup_location: self.pickup_location.trim().to_string(),
            channel_id: self.channel_id.clone().filter(|c| !c.trim().is_empty()),
        })
    }

    pub fn view(&self) -> ShippingSettingsView {
        ShippingSettingsView {
            email: self.email.clone(),
            pickup_location: self.pickup_location.clone(),
            channel_id: self.channel_id.clone(),
            has_password: !self.password.is_empty(),
            configured: self.credentials().is_some(),
        }
    }

    /// Applies an admin update. A missing or blank password keeps the stored one.
    pub fn merge(&mut self, email: String, password: Option<&SecretString>, pickup_location: String, channel_id: Option<String>) {
        self.email = email.trim().to_string();
        if let Some(password) = password.map(|p| p.expose_secret()).filter(|p| !p.is_empty()) {
            self.password = password.to_string();
        }
        self.pickup_location = pickup_location.trim().to_string();
        self.channel_id = channel_id;
    }
}

/// # Errors
///
/// Returns `RepositoryError::DataCorruption` if the stored value is not a
/// valid shipping settings object.
pub async fn shipping(pool: &PgPool) -> Result<ShippingSettings, RepositoryError> {
    match get_setting(pool, SHIPPING_KEY).await? {
        Some(value) => serde_json::from_value(value)
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid shipping settings: {e}"))),
        None => Ok(ShippingSettings::default()),
    }
}

/// # Errors
///
/// Returns an error if the database query fails.
pub async fn save_shipping(pool: &PgPool, settings: &ShippingSettings) -> Result<(), RepositoryError> {
    let value = serde_json::to_value(settings)
        .map_err(|e| RepositoryError::DataCorruption(format!("unserializable shipping settings: {e}")))?;
    set_setting(pool, SHIPPING_KEY, &value).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ShippingSettings {
        ShippingSettings {
            email: "ops@example.com".into(),
            password: "s3cret".into(),
            pickup_location: "Primary".into(),
            channel_id: None,
        }
    }

    #[test]
    fn test_view_hides_password() {
        let view = serde_json::to_value(settings().view()).unwrap();
        assert!(view.get("password").is_none());
        assert_eq!(view["has_password"], true);
        assert_eq!(view["configured"], true);
    }

    #[test]
    fn test_incomplete_settings_have_no_credentials() {
        assert!(ShippingSettings::default().credentials().is_none());
        let mut s = settings();
        s.pickup_location = " ".into();
        assert!(s.credentials().is_none());
    }

    #[test]
    fn test_merge_keeps_password_when_blank() {
        let mut s = settings();
        s.merge("new@example.com".into(), Some(&SecretString::from(String::new())), "Warehouse".into(), None);
        assert_eq!(s.password, "s3cret");
        assert_eq!(s.email, "new@example.com");
        s.merge("new@example.com".into(), Some(&SecretString::from("changed".to_string())), "Warehouse".into(), None);
        assert_eq!(s.password, "changed");
    }

    #[test]
    fn test_debug_redacts_password() {
        assert!(!format!("{:?}", settings()).contains("s3cret"));
    }
}
