//! Payment Gateway Client
//!
//! Boundary to the external payment provider (Mercado Pago's REST API):
//! create a hosted checkout preference, fetch the authoritative payment
//! record by id. Inbound notifications are never trusted for outcome;
//! reconciliation always re-fetches through this client.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, Result};

/// Payment status reported by the gateway
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaymentStatus {
    Approved,
    Pending,
    Rejected,
    Other(String),
}

impl PaymentStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "approved" => PaymentStatus::Approved,
            "pending" | "in_process" | "authorized" => PaymentStatus::Pending,
            "rejected" | "cancelled" => PaymentStatus::Rejected,
            other => PaymentStatus::Other(other.to_string()),
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, PaymentStatus::Approved)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Approved => write!(f, "approved"),
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Rejected => write!(f, "rejected"),
            PaymentStatus::Other(s) => write!(f, "{s}"),
        }
    }
}

/// Authoritative payment record fetched from the gateway
#[derive(Clone, Debug)]
pub struct PaymentRecord {
    pub id: String,
    pub status: PaymentStatus,
    pub external_reference: Option<String>,
}

/// Payer details forwarded to the hosted checkout
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PayerDetails {
    pub name: String,
    pub email: String,
    /// Tax id (CPF) when collected
    pub identification_number: Option<String>,
}

/// Redirect targets for the hosted checkout
#[derive(Clone, Debug)]
pub struct BackUrls {
    pub success: String,
    pub pending: String,
    pub failure: String,
}

/// Request to create a hosted checkout session
#[derive(Clone, Debug)]
pub struct PreferenceRequest {
    /// Item title shown on the gateway's page
    pub title: String,
    pub price: Decimal,
    pub payer: PayerDetails,
    /// Opaque reference echoed back inside payment records
    pub external_reference: String,
    pub back_urls: BackUrls,
    pub notification_url: String,
}

/// Result of creating a checkout session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Gateway preference id
    pub id: String,

    /// URL to redirect the user to
    pub init_point: String,
}

/// Boundary trait for the payment gateway
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted checkout session
    async fn create_preference(&self, request: &PreferenceRequest) -> Result<CheckoutSession>;

    /// Fetch the authoritative payment record by id
    async fn fetch_payment(&self, payment_id: &str) -> Result<PaymentRecord>;
}

/// Mercado Pago client configuration
#[derive(Clone, Debug)]
pub struct MercadoPagoConfig {
    pub access_token: String,
    pub api_base: String,
    /// Request timeout; a timeout is the retryable gateway fault
    pub timeout_secs: u64,
}

impl MercadoPagoConfig {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            api_base: "https://api.mercadopago.com".into(),
            timeout_secs: 10,
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let access_token = std::env::var("MP_ACCESS_TOKEN")
            .map_err(|_| PaymentError::Config("MP_ACCESS_TOKEN not set".into()))?;

        let mut config = Self::new(access_token);
        if let Ok(base) = std::env::var("MP_API_BASE") {
            config.api_base = base;
        }
        if let Some(timeout) = std::env::var("MP_TIMEOUT_SECS")
            .ok()
            .and_then(|t| t.parse().ok())
        {
            config.timeout_secs = timeout;
        }
        Ok(config)
    }
}

/// Mercado Pago REST client
pub struct MercadoPagoClient {
    http: reqwest::Client,
    config: MercadoPagoConfig,
}

impl MercadoPagoClient {
    pub fn new(config: MercadoPagoConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PaymentError::Config(e.to_string()))?;

        Ok(Self { http, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(MercadoPagoConfig::from_env()?)
    }
}

// Wire types for the Mercado Pago REST API.

#[derive(Serialize)]
struct WirePreferenceRequest<'a> {
    items: Vec<WireItem<'a>>,
    payer: WirePayer<'a>,
    external_reference: &'a str,
    purpose: &'static str,
    back_urls: WireBackUrls<'a>,
    notification_url: &'a str,
}

#[derive(Serialize)]
struct WireItem<'a> {
    title: &'a str,
    quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    unit_price: Decimal,
    currency_id: &'static str,
}

#[derive(Serialize)]
struct WirePayer<'a> {
    name: &'a str,
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    identification: Option<WireIdentification<'a>>,
}

#[derive(Serialize)]
struct WireIdentification<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    number: &'a str,
}

#[derive(Serialize)]
struct WireBackUrls<'a> {
    success: &'a str,
    pending: &'a str,
    failure: &'a str,
}

#[derive(Deserialize)]
struct WirePreferenceResponse {
    id: String,
    init_point: String,
}

#[derive(Deserialize)]
struct WirePayment {
    id: u64,
    status: String,
    external_reference: Option<String>,
}

impl<'a> WirePreferenceRequest<'a> {
    fn from_request(request: &'a PreferenceRequest) -> Self {
        Self {
            items: vec![WireItem {
                title: &request.title,
                quantity: 1,
                unit_price: request.price,
                currency_id: "BRL",
            }],
            payer: WirePayer {
                name: &request.payer.name,
                email: &request.payer.email,
                identification: request
                    .payer
                    .identification_number
                    .as_deref()
                    .map(|number| WireIdentification { kind: "CPF", number }),
            },
            external_reference: &request.external_reference,
            purpose: "wallet_purchase",
            back_urls: WireBackUrls {
                success: &request.back_urls.success,
                pending: &request.back_urls.pending,
                failure: &request.back_urls.failure,
            },
            notification_url: &request.notification_url,
        }
    }
}

#[async_trait]
impl PaymentGateway for MercadoPagoClient {
    async fn create_preference(&self, request: &PreferenceRequest) -> Result<CheckoutSession> {
        let url = format!("{}/checkout/preferences", self.config.api_base);
        let body = WirePreferenceRequest::from_request(request);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| PaymentError::Gateway(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(PaymentError::Gateway(format!(
                "preference creation failed ({status}): {detail}"
            )));
        }

        let parsed: WirePreferenceResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::Gateway(e.to_string()))?;

        Ok(CheckoutSession {
            id: parsed.id,
            init_point: parsed.init_point,
        })
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<PaymentRecord> {
        let url = format!("{}/v1/payments/{}", self.config.api_base, payment_id);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.config.access_token)
            .send()
            .await
            .map_err(|e| PaymentError::Gateway(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(PaymentError::Gateway(format!(
                "payment fetch failed ({status}): {detail}"
            )));
        }

        let parsed: WirePayment = response
            .json()
            .await
            .map_err(|e| PaymentError::Gateway(e.to_string()))?;

        Ok(PaymentRecord {
            id: parsed.id.to_string(),
            status: PaymentStatus::parse(&parsed.status),
            external_reference: parsed.external_reference,
        })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_status_parsing() {
        assert_eq!(PaymentStatus::parse("approved"), PaymentStatus::Approved);
        assert_eq!(PaymentStatus::parse("in_process"), PaymentStatus::Pending);
        assert_eq!(PaymentStatus::parse("cancelled"), PaymentStatus::Rejected);
        assert_eq!(
            PaymentStatus::parse("charged_back"),
            PaymentStatus::Other("charged_back".into())
        );
        assert!(PaymentStatus::Approved.is_approved());
        assert!(!PaymentStatus::Pending.is_approved());
    }

    #[test]
    fn test_preference_wire_shape() {
        let request = PreferenceRequest {
            title: "Plano Colheita - 30 Mentorias/Mês".into(),
            price: dec!(49.90),
            payer: PayerDetails {
                name: "Ana Lima".into(),
                email: "ana@example.com".into(),
                identification_number: Some("12345678901".into()),
            },
            external_reference: "REG-COLHEITA-ana@example.com-abc".into(),
            back_urls: BackUrls {
                success: "https://app.example.com/checkout/processing".into(),
                pending: "https://app.example.com/checkout/processing".into(),
                failure: "https://app.example.com/checkout/cancel".into(),
            },
            notification_url: "https://app.example.com/webhook/mercadopago".into(),
        };

        let value =
            serde_json::to_value(WirePreferenceRequest::from_request(&request)).unwrap();

        // Price must serialize as a JSON number, not a string.
        assert!(value["items"][0]["unit_price"].is_number());
        assert_eq!(value["items"][0]["currency_id"], "BRL");
        assert_eq!(value["payer"]["identification"]["type"], "CPF");
        assert_eq!(value["purpose"], "wallet_purchase");
        assert_eq!(
            value["external_reference"],
            "REG-COLHEITA-ana@example.com-abc"
        );
    }

    #[test]
    fn test_identification_is_omitted_when_absent() {
        let request = PreferenceRequest {
            title: "Plano Semente - 10 Mentorias/Mês".into(),
            price: dec!(1.00),
            payer: PayerDetails {
                name: "Ana".into(),
                email: "ana@example.com".into(),
                identification_number: None,
            },
            external_reference: "REG-SEMENTE-ana@example.com-abc".into(),
            back_urls: BackUrls {
                success: "s".into(),
                pending: "p".into(),
                failure: "f".into(),
            },
            notification_url: "n".into(),
        };

        let value =
            serde_json::to_value(WirePreferenceRequest::from_request(&request)).unwrap();
        assert!(value["payer"].get("identification").is_none());
    }
}
