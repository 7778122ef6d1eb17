//! Thin Stripe REST client for one-off checkout payments.
//!
//! Only the endpoints the booking flow needs: creating a payment-mode
//! Checkout Session and verifying webhook signatures. Requests use the
//! form-encoded v1 API directly rather than an SDK crate.

use std::collections::HashMap;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";
const WEBHOOK_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone)]
pub struct StripeClient {
    api_key: Option<String>,
    webhook_secret: Option<String>,
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
    pub status: Option<String>,
    pub payment_status: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CheckoutLine {
    pub name: String,
    pub quantity: i32,
    pub unit_amount_cents: i64,
}

#[derive(Debug, Clone)]
pub struct CreateCheckoutParams {
    pub booking_id: Uuid,
    pub customer_email: Option<String>,
    pub lines: Vec<CheckoutLine>,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeWebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeWebhookData,
    pub created: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeWebhookData {
    pub object: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum StripeError {
    #[error("Stripe API error: {0}")]
    Api(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Invalid webhook: {0}")]
    InvalidWebhook(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Stripe is not configured")]
    NotConfigured,
}

/// Dollars to integer cents, rounding half-up the way invoices expect.
pub fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

impl StripeClient {
    pub fn new(api_key: Option<String>, webhook_secret: Option<String>) -> Self {
        Self {
            api_key,
            webhook_secret,
            client: reqwest::Client::new(),
            base_url: STRIPE_API_BASE.to_string(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn create_checkout_session(
        &self,
        params: CreateCheckoutParams,
    ) -> Result<CheckoutSession, StripeError> {
        let api_key = self.api_key.as_ref().ok_or(StripeError::NotConfigured)?;

        let mut form: Vec<(String, String)> = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), params.success_url),
            ("cancel_url".to_string(), params.cancel_url),
            (
                "metadata[booking_id]".to_string(),
                params.booking_id.to_string(),
            ),
        ];

        if let Some(email) = params.customer_email {
            form.push(("customer_email".to_string(), email));
        }

        for (i, line) in params.lines.iter().enumerate() {
            form.push((
                format!("line_items[{i}][price_data][currency]"),
                "usd".to_string(),
            ));
            form.push((
                format!("line_items[{i}][price_data][product_data][name]"),
                line.name.clone(),
            ));
            form.push((
                format!("line_items[{i}][price_data][unit_amount]"),
                line.unit_amount_cents.to_string(),
            ));
            form.push((
                format!("line_items[{i}][quantity]"),
                line.quantity.to_string(),
            ));
        }

        let response = self
            .client
            .post(format!("{}/checkout/sessions", self.base_url))
            .basic_auth(api_key, Option::<&str>::None)
            .form(&form)
            .send()
            .await
            .map_err(|e| StripeError::Network(e.to_string()))?;

        self.handle_response(response).await
    }

    pub fn verify_webhook_signature(
        &self,
        payload: &str,
        signature: &str,
    ) -> Result<StripeWebhookEvent, StripeError> {
        let webhook_secret = self
            .webhook_secret
            .as_ref()
            .ok_or(StripeError::NotConfigured)?;

        let parts: HashMap<&str, &str> = signature
            .split(',')
            .filter_map(|part| {
                let mut split = part.splitn(2, '=');
                Some((split.next()?, split.next()?))
            })
            .collect();

        let timestamp = parts
            .get("t")
            .ok_or_else(|| StripeError::InvalidWebhook("Missing timestamp".to_string()))?;
        let received_sig = parts
            .get("v1")
            .ok_or_else(|| StripeError::InvalidWebhook("Missing signature".to_string()))?;

        let signed_payload = format!("{timestamp}.{payload}");

        type HmacSha256 = Hmac<Sha256>;
        let mut mac = HmacSha256::new_from_slice(webhook_secret.as_bytes())
            .map_err(|_| StripeError::InvalidWebhook("Invalid webhook secret".to_string()))?;
        mac.update(signed_payload.as_bytes());
        let expected_sig = hex::encode(mac.finalize().into_bytes());

        if expected_sig != *received_sig {
            return Err(StripeError::InvalidWebhook("Signature mismatch".to_string()));
        }

        let timestamp_i64: i64 = timestamp
            .parse()
            .map_err(|_| StripeError::InvalidWebhook("Invalid timestamp".to_string()))?;
        let now = chrono::Utc::now().timestamp();
        if (now - timestamp_i64).abs() > WEBHOOK_TOLERANCE_SECS {
            return Err(StripeError::InvalidWebhook("Timestamp too old".to_string()));
        }

        serde_json::from_str(payload).map_err(|e| StripeError::Parse(e.to_string()))
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, StripeError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StripeError::Network(e.to_string()))?;

        if !status.is_success() {
            #[derive(Deserialize)]
            struct StripeApiError {
                error: StripeApiErrorDetail,
            }

            #[derive(Deserialize)]
            struct StripeApiErrorDetail {
                message: String,
            }

            if let Ok(error) = serde_json::from_str::<StripeApiError>(&body) {
                return Err(StripeError::Api(error.error.message));
            }

            return Err(StripeError::Api(format!("HTTP {}: {}", status, body)));
        }

        serde_json::from_str(&body).map_err(|e| StripeError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_client() -> StripeClient {
        StripeClient::new(None, Some("whsec_test".to_string()))
    }

    fn sign(secret: &str, timestamp: i64, payload: &str) -> String {
        type HmacSha256 = Hmac<Sha256>;
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.{payload}").as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn cents_round_half_up() {
        assert_eq!(to_cents(80.0), 8000);
        assert_eq!(to_cents(19.995), 2000);
        assert_eq!(to_cents(0.004), 0);
    }

    #[test]
    fn valid_signature_parses_event() {
        let client = signed_client();
        let payload = r#"{"id":"evt_1","type":"checkout.session.completed","data":{"object":{}},"created":1}"#;
        let ts = chrono::Utc::now().timestamp();
        let header = format!("t={ts},v1={}", sign("whsec_test", ts, payload));

        let event = client.verify_webhook_signature(payload, &header).unwrap();
        assert_eq!(event.event_type, "checkout.session.completed");
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let client = signed_client();
        let payload = r#"{"id":"evt_1","type":"checkout.session.completed","data":{"object":{}},"created":1}"#;
        let ts = chrono::Utc::now().timestamp();
        let header = format!("t={ts},v1={}", sign("whsec_test", ts, payload));

        let tampered = payload.replace("evt_1", "evt_2");
        assert!(client.verify_webhook_signature(&tampered, &header).is_err());
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let client = signed_client();
        let payload = r#"{"id":"evt_1","type":"checkout.session.completed","data":{"object":{}},"created":1}"#;
        let ts = chrono::Utc::now().timestamp() - 3600;
        let header = format!("t={ts},v1={}", sign("whsec_test", ts, payload));

        assert!(client.verify_webhook_signature(payload, &header).is_err());
    }

    #[test]
    fn malformed_header_is_rejected() {
        let client = signed_client();
        assert!(client.verify_webhook_signature("{}", "nonsense").is_err());
        assert!(client.verify_webhook_signature("{}", "t=123").is_err());
    }
}
