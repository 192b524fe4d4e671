//! Thin client for the PayPal REST API: OAuth client credentials, order creation and
//! capture, and webhook signature verification.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::config::PayPalConfig;

#[derive(Debug, Error)]
pub enum PayPalError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("PayPal authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("PayPal API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },
    #[error("Webhook verification is not configured")]
    WebhookNotConfigured,
}

#[derive(Clone)]
pub struct PayPalClient {
    http: reqwest::Client,
    config: PayPalConfig,
    token: Arc<Mutex<Option<CachedToken>>>,
}

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: i64,
}

impl CachedToken {
    fn is_expired(&self) -> bool {
        // Refresh a minute early.
        chrono::Utc::now().timestamp() >= self.expires_at - 60
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// The parts of a PayPal order we care about.
#[derive(Debug, Clone, Deserialize)]
pub struct PayPalOrder {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub purchase_units: Vec<PurchaseUnit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseUnit {
    #[serde(default)]
    pub payments: Option<Payments>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Payments {
    #[serde(default)]
    pub captures: Vec<Capture>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Capture {
    pub id: String,
    pub status: String,
}

impl PayPalOrder {
    fn first_capture(&self) -> Option<&Capture> {
        self.purchase_units
            .iter()
            .filter_map(|unit| unit.payments.as_ref())
            .flat_map(|payments| payments.captures.iter())
            .next()
    }

    pub fn capture_id(&self) -> Option<&str> {
        self.first_capture().map(|capture| capture.id.as_str())
    }

    /// The capture's own status when PayPal returned one. An order can be `COMPLETED`
    /// while its capture is still `PENDING`.
    pub fn capture_status(&self) -> &str {
        self.first_capture()
            .map_or(self.status.as_str(), |capture| capture.status.as_str())
    }
}

/// Transmission headers PayPal sends with every webhook delivery.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookHeaders {
    pub auth_algo: String,
    pub cert_url: String,
    pub transmission_id: String,
    pub transmission_sig: String,
    pub transmission_time: String,
}

#[derive(Deserialize)]
struct VerifyResponse {
    verification_status: String,
}

impl PayPalClient {
    pub fn new(config: PayPalConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            token: Arc::new(Mutex::new(None)),
        }
    }

    async fn access_token(&self) -> Result<String, PayPalError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|token| !token.is_expired()) {
            return Ok(token.access_token.clone());
        }

        let response = self
            .http
            .post(format!("{}/v1/oauth2/token", self.config.api_base))
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_owned());
            return Err(PayPalError::AuthenticationFailed(format!(
                "HTTP {status}: {body}"
            )));
        }

        let token: TokenResponse = response.json().await?;
        let access_token = token.access_token.clone();
        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at: chrono::Utc::now().timestamp() + token.expires_in,
        });
        debug!("Refreshed PayPal access token");

        Ok(access_token)
    }

    async fn send_json(&self, url: String, body: &Value) -> Result<Value, PayPalError> {
        let token = self.access_token().await?;
        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_owned());
            Err(PayPalError::Api {
                status: status.as_u16(),
                body,
            })
        }
    }

    /// Creates a CAPTURE-intent order for `amount`. Both `custom_id` and `invoice_id` carry
    /// our order number so webhook events can be matched back.
    #[instrument(skip(self))]
    pub async fn create_order(
        &self,
        order_number: &str,
        amount: f64,
    ) -> Result<PayPalOrder, PayPalError> {
        let body = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "reference_id": order_number,
                "custom_id": order_number,
                "invoice_id": order_number,
                "amount": {
                    "currency_code": self.config.currency,
                    "value": format_amount(amount),
                },
            }],
        });

        let value = self
            .send_json(format!("{}/v2/checkout/orders", self.config.api_base), &body)
            .await?;
        decode(value)
    }

    #[instrument(skip(self))]
    pub async fn capture_order(&self, paypal_order_id: &str) -> Result<PayPalOrder, PayPalError> {
        let value = self
            .send_json(
                format!(
                    "{}/v2/checkout/orders/{}/capture",
                    self.config.api_base, paypal_order_id
                ),
                &json!({}),
            )
            .await?;
        decode(value)
    }

    /// Asks PayPal whether a webhook delivery is genuine.
    #[instrument(skip(self, headers, event))]
    pub async fn verify_webhook(
        &self,
        headers: &WebhookHeaders,
        event: &Value,
    ) -> Result<bool, PayPalError> {
        let webhook_id = self
            .config
            .webhook_id
            .as_deref()
            .ok_or(PayPalError::WebhookNotConfigured)?;

        let body = json!({
            "auth_algo": headers.auth_algo,
            "cert_url": headers.cert_url,
            "transmission_id": headers.transmission_id,
            "transmission_sig": headers.transmission_sig,
            "transmission_time": headers.transmission_time,
            "webhook_id": webhook_id,
            "webhook_event": event,
        });

        let value = self
            .send_json(
                format!(
                    "{}/v1/notifications/verify-webhook-signature",
                    self.config.api_base
                ),
                &body,
            )
            .await?;
        let response: VerifyResponse = decode(value)?;

        Ok(response.verification_status == "SUCCESS")
    }
}

fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, PayPalError> {
    serde_json::from_value(value).map_err(|err| PayPalError::Api {
        status: 200,
        body: format!("Unexpected response shape: {err}"),
    })
}

/// PayPal wants amounts as decimal strings with two places.
pub fn format_amount(amount: f64) -> String {
    format!("{amount:.2}")
}
