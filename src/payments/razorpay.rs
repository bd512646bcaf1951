//! Razorpay REST client and signature verification.
//!
//! Checkout creates a Razorpay order for the amount due; the browser completes
//! payment and hands back `(razorpay_order_id, razorpay_payment_id, signature)`.
//! The signature is an HMAC-SHA256 over `"{order_id}|{payment_id}"` keyed by
//! the API key secret. Webhooks are signed over the raw body with the webhook
//! secret instead.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tracing::instrument;

use crate::config::RazorpayConfig;

pub const DEFAULT_BASE_URL: &str = "https://api.razorpay.com";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum RazorpayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Razorpay rejected the request ({status}): {description}")]
    Api { status: u16, code: String, description: String },
    #[error("Invalid payment signature")]
    InvalidSignature,
    #[error("Webhook secret is not configured")]
    WebhookNotConfigured,
    #[error("Malformed webhook payload: {0}")]
    MalformedWebhook(String),
}

#[derive(Clone)]
pub struct RazorpayClient {
    inner: Arc<RazorpayClientInner>,
}

struct RazorpayClientInner {
    client: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: SecretString,
    webhook_secret: Option<SecretString>,
}

#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    notes: &'a BTreeMap<String, String>,
}

/// Order as returned by `POST /v1/orders`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RazorpayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    pub status: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody { error: ApiErrorDetail }

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

/// The parts of a webhook delivery this service acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent { pub event: String, pub order_id: String, pub payment_id: String }

#[derive(Debug, Deserialize)]
struct WebhookBody { event: String, payload: WebhookPayload }

#[derive(Debug, Deserialize)]
struct WebhookPayload { payment: Option<WebhookEntityWrapper> }

#[derive(Debug, Deserialize)]
struct WebhookEntityWrapper { entity: WebhookPayment }

#[derive(Debug, Deserialize)]
struct WebhookPayment { id: String, order_id: Option<String> }

impl RazorpayClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &RazorpayConfig) -> Result<Self, RazorpayError> {
        let client = reqwest::Client::builder().timeout(Duration::from_secs(20)).build()?;
        Ok(Self {
            inner: Arc::new(RazorpayClientInner {
                client,
                base_url: config.base_url.trim_end_matches('/').to_string(),
                key_id: config.key_id.clone(),
                key_secret: config.key_secret.clone(),
                webhook_secret: config.webhook_secret.clone(),
            }),
        })
    }

    /// Public key id, handed to the browser checkout widget.
    pub fn key_id(&self) -> &str { &self.inner.key_id }

    /// Creates a Razorpay order for `amount_paise`.
    #[instrument(skip(self, notes), fields(amount = amount_paise))]
    pub async fn create_order(&self, amount_paise: i64, currency: &str, receipt: &str, notes: &BTreeMap<String, String>) -> Result<RazorpayOrder, RazorpayError> {
        let response = self.inner.client
            .post(format!("{}/v1/orders", self.inner.base_url))
            .basic_auth(&self.inner.key_id, Some(self.inner.key_secret.expose_secret()))
            .json(&CreateOrderRequest { amount: amount_paise, currency, receipt, notes })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let (code, description) = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| (b.error.code, b.error.description))
                .unwrap_or_else(|_| (String::new(), body));
            return Err(RazorpayError::Api { status: status.as_u16(), code, description });
        }
        let order: RazorpayOrder = response.json().await?;
        tracing::info!(razorpay_order_id = %order.id, "created razorpay order");
        Ok(order)
    }

    pub fn verify_payment_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> Result<(), RazorpayError> {
        verify_payment_signature(self.inner.key_secret.expose_secret(), order_id, payment_id, signature)
    }

    pub fn verify_webhook_signature(&self, body: &[u8], signature: &str) -> Result<(), RazorpayError> {
        let secret = self.inner.webhook_secret.as_ref().ok_or(RazorpayError::WebhookNotConfigured)?;
        verify_webhook_signature(secret.expose_secret(), body, signature)
    }
}

fn hex_hmac(secret: &str, message: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(message);
    Some(hex::encode(mac.finalize().into_bytes()))
}

pub fn sign_payment(secret: &str, order_id: &str, payment_id: &str) -> Option<String> {
    hex_hmac(secret, format!("{order_id}|{payment_id}").as_bytes())
}

pub fn verify_payment_signature(secret: &str, order_id: &str, payment_id: &str, signature: &str) -> Result<(), RazorpayError> {
    let expected = sign_payment(secret, order_id, payment_id).ok_or(RazorpayError::InvalidSignature)?;
    if constant_time_eq(expected.as_bytes(), signature.trim().as_bytes()) { Ok(()) } else { Err(RazorpayError::InvalidSignature) }
}

pub fn verify_webhook_signature(secret: &str, body: &[u8], signature: &str) -> Result<(), RazorpayError> {
    let expected = hex_hmac(secret, body).ok_or(RazorpayError::InvalidSignature)?;
    if constant_time_eq(expected.as_bytes(), signature.trim().as_bytes()) { Ok(()) } else { Err(RazorpayError::InvalidSignature) }
}

/// Extracts the payment and order ids from a webhook body.
pub fn parse_webhook(body: &[u8]) -> Result<WebhookEvent, RazorpayError> {
    let parsed: WebhookBody = serde_json::from_slice(body).map_err(|e| RazorpayError::MalformedWebhook(e.to_string()))?;
    let payment = parsed.payload.payment
        .ok_or_else(|| RazorpayError::MalformedWebhook(format!("{} carries no payment entity", parsed.event)))?
        .entity;
    let order_id = payment.order_id.ok_or_else(|| RazorpayError::MalformedWebhook("payment has no order_id".into()))?;
    Ok(WebhookEvent { event: parsed.event, order_id, payment_id: payment.id })
}

pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() { return false; }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_signature() {
        let sig = sign_payment("secret", "order_ABC", "pay_XYZ").unwrap();
        assert_eq!(sig.len(), 64);
        assert!(verify_payment_signature("secret", "order_ABC", "pay_XYZ", &sig).is_ok());
        assert!(matches!(verify_payment_signature("secret", "order_ABC", "pay_OTHER", &sig), Err(RazorpayError::InvalidSignature)));
        assert!(matches!(verify_payment_signature("wrong", "order_ABC", "pay_XYZ", &sig), Err(RazorpayError::InvalidSignature)));
        assert!(verify_payment_signature("secret", "order_ABC", "pay_XYZ", "").is_err());
    }

    #[test]
    fn test_known_vector() {
        // HMAC-SHA256("key", "The quick brown fox jumps over the lazy dog")
        let sig = hex_hmac("key", b"The quick brown fox jumps over the lazy dog").unwrap();
        assert_eq!(sig, "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8");
    }

    #[test]
    fn test_webhook_signature() {
        let body = br#"{"event":"payment.captured"}"#;
        let sig = hex_hmac("whsec", body).unwrap();
        assert!(verify_webhook_signature("whsec", body, &sig).is_ok());
        assert!(verify_webhook_signature("whsec", b"tampered", &sig).is_err());
    }

    #[test]
    fn test_parse_webhook() {
        let body = br#"{
            "entity": "event",
            "event": "payment.captured",
            "payload": {"payment": {"entity": {"id": "pay_1", "order_id": "order_9", "status": "captured", "amount": 129900}}}
        }"#;
        assert_eq!(
            parse_webhook(body).unwrap(),
            WebhookEvent { event: "payment.captured".into(), order_id: "order_9".into(), payment_id: "pay_1".into() }
        );
        assert!(matches!(parse_webhook(br#"{"event":"refund.created","payload":{}}"#), Err(RazorpayError::MalformedWebhook(_))));
    }
}
