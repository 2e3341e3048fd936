//! HMAC-SHA256 signatures used by the payment gateway.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use tracing::{debug, instrument};

use super::PaymentError;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the webhook signature.
pub const WEBHOOK_SIGNATURE_HEADER: &str = "x-razorpay-signature";

/// Verify the signature the browser checkout returns after a payment.
///
/// The gateway signs `"{order_id}|{payment_id}"` with the key secret.
///
/// # Errors
///
/// Returns `PaymentError::InvalidSignature` when the signature is not valid hex
/// or does not match.
#[instrument(skip(key_secret, signature))]
pub fn verify_checkout_signature(
    key_secret: &SecretString,
    gateway_order_id: &str,
    gateway_payment_id: &str,
    signature: &str,
) -> Result<(), PaymentError> {
    let message = format!("{gateway_order_id}|{gateway_payment_id}");
    verify(key_secret, message.as_bytes(), signature)?;
    debug!("Checkout signature verified");
    Ok(())
}

/// Verify a webhook signature over the raw request body.
///
/// # Errors
///
/// Returns `PaymentError::InvalidSignature` when the signature is not valid hex
/// or does not match.
#[instrument(skip_all)]
pub fn verify_webhook_signature(webhook_secret: &SecretString, body: &[u8], signature: &str) -> Result<(), PaymentError> {
    verify(webhook_secret, body, signature)?;
    debug!("Webhook signature verified");
    Ok(())
}

/// Hex-encoded HMAC-SHA256 of `message` under `secret`.
///
/// # Errors
///
/// Returns `PaymentError::InvalidSignature` if the key is rejected by the MAC.
pub fn sign(secret: &SecretString, message: &[u8]) -> Result<String, PaymentError> {
    let mut mac = new_mac(secret)?;
    mac.update(message);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn verify(secret: &SecretString, message: &[u8], signature: &str) -> Result<(), PaymentError> {
    let provided = hex::decode(signature.trim())
        .map_err(|_| PaymentError::InvalidSignature("Signature is not hex".to_string()))?;
    let mut mac = new_mac(secret)?;
    mac.update(message);
    // verify_slice compares in constant time
    mac.verify_slice(&provided)
        .map_err(|_| PaymentError::InvalidSignature("Signature mismatch".to_string()))
}

fn new_mac(secret: &SecretString) -> Result<HmacSha256, PaymentError> {
    HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|e| PaymentError::InvalidSignature(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> SecretString {
        SecretString::from("test-webhook-secret".to_string())
    }

    #[test]
    fn test_checkout_signature_valid() {
        let signature = sign(&secret(), b"order_Nx1|pay_Nx1").expect("sign");
        assert!(verify_checkout_signature(&secret(), "order_Nx1", "pay_Nx1", &signature).is_ok());
    }

    #[test]
    fn test_checkout_signature_swapped_ids() {
        let signature = sign(&secret(), b"order_Nx1|pay_Nx1").expect("sign");
        let result = verify_checkout_signature(&secret(), "pay_Nx1", "order_Nx1", &signature);
        assert!(matches!(result, Err(PaymentError::InvalidSignature(_))));
    }

    #[test]
    fn test_webhook_signature_valid() {
        let body = br#"{"event":"payment.captured"}"#;
        let signature = sign(&secret(), body).expect("sign");
        assert!(verify_webhook_signature(&secret(), body, &signature).is_ok());
    }

    #[test]
    fn test_webhook_signature_tampered_body() {
        let signature = sign(&secret(), br#"{"amount":100}"#).expect("sign");
        let result = verify_webhook_signature(&secret(), br#"{"amount":1}"#, &signature);
        assert!(result.is_err());
    }

    #[test]
    fn test_webhook_signature_not_hex() {
        let result = verify_webhook_signature(&secret(), b"{}", "not-a-signature");
        assert!(matches!(result, Err(PaymentError::InvalidSignature(m)) if m == "Signature is not hex"));
    }

    #[test]
    fn test_known_vector() {
        // RFC 4231 test case 2
        let key = SecretString::from("Jefe".to_string());
        assert_eq!(
            sign(&key, b"what do ya want for nothing?").expect("sign"),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }
}
