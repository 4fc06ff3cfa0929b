//! Carrier client: a thin wrapper over an EasyPost-style REST API, plus a
//! deterministic sandbox used when no API key is configured.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::{CourierError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub street1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street2: Option<String>,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parcel {
    pub length: f64,
    pub width: f64,
    pub height: f64,
    /// Ounces, per carrier convention.
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentRequest {
    pub from_address: Address,
    pub to_address: Address,
    pub parcel: Parcel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rate {
    pub id: String,
    pub carrier: String,
    pub service: String,
    /// Decimal string, as carriers quote it.
    pub rate: String,
    #[serde(default)]
    pub delivery_days: Option<u32>,
    #[serde(default)]
    pub est_delivery_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shipment {
    pub id: String,
    pub rates: Vec<Rate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchasedShipment {
    pub id: String,
    pub tracking_code: String,
    pub label_url: String,
    pub rate: Rate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedAddress {
    pub valid: bool,
    pub address: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingStatus {
    pub tracking_code: String,
    pub status: String,
    pub status_detail: String,
    pub carrier: String,
    #[serde(default)]
    pub est_delivery_date: Option<String>,
}

/// The carrier operations the shipping worker needs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CarrierApi: Send + Sync {
    async fn create_shipment(&self, request: &ShipmentRequest) -> Result<Shipment>;

    async fn buy_shipment(&self, shipment_id: &str, rate: &Rate) -> Result<PurchasedShipment>;

    async fn verify_address(&self, address: &Address) -> Result<VerifiedAddress>;

    async fn track(&self, tracking_code: &str) -> Result<TrackingStatus>;
}

/// Rate selection criteria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateCriteria {
    Lowest,
    Fastest,
    Carrier(String),
}

/// Pick the best rate by the given criteria.
pub fn best_rate<'a>(rates: &'a [Rate], criteria: &RateCriteria) -> Result<&'a Rate> {
    if rates.is_empty() {
        return Err(CourierError::CarrierError("no rates available".to_string()));
    }

    let amount = |rate: &Rate| rate.rate.parse::<f64>().unwrap_or(f64::INFINITY);

    match criteria {
        RateCriteria::Lowest => Ok(rates
            .iter()
            .reduce(|best, rate| if amount(rate) < amount(best) { rate } else { best })
            .unwrap_or(&rates[0])),
        RateCriteria::Fastest => Ok(rates
            .iter()
            .reduce(|best, rate| {
                let days = |r: &Rate| r.delivery_days.unwrap_or(u32::MAX);
                if days(rate) < days(best) {
                    rate
                } else {
                    best
                }
            })
            .unwrap_or(&rates[0])),
        RateCriteria::Carrier(carrier) => {
            let filtered: Vec<&Rate> = rates.iter().filter(|r| &r.carrier == carrier).collect();
            filtered
                .into_iter()
                .reduce(|best, rate| if amount(rate) < amount(best) { rate } else { best })
                .ok_or_else(|| {
                    CourierError::CarrierError(format!("no rates found for carrier: {carrier}"))
                })
        }
    }
}

/// Retry an async operation with exponential backoff.
pub async fn retry_with_backoff<T, F, Fut>(
    mut operation: F,
    max_retries: u32,
    base_delay: Duration,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= max_retries => return Err(e),
            Err(e) => {
                let delay = base_delay * 2u32.saturating_pow(attempt);
                attempt += 1;
                warn!(
                    attempt,
                    max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Carrier call failed; retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ShipmentResource {
    id: String,
    #[serde(default)]
    rates: Vec<Rate>,
    #[serde(default)]
    tracking_code: Option<String>,
    #[serde(default)]
    postage_label: Option<PostageLabel>,
}

#[derive(Deserialize)]
struct PostageLabel {
    label_url: String,
}

/// Thin HTTP client over an EasyPost-compatible REST API. Credentials go in
/// as basic-auth username, bodies and responses are JSON.
pub struct HttpCarrier {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpCarrier {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.easypost.com/v2";

    pub fn new(api_key: impl Into<String>, base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.unwrap_or_else(|| Self::DEFAULT_BASE_URL.to_string()),
            api_key: api_key.into(),
        }
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "Carrier API call");
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.api_key, None::<&str>)
            .json(&body)
            .send()
            .await
            .map_err(|e| CourierError::CarrierError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CourierError::CarrierError(format!(
                "carrier API returned {status}: {text}"
            )));
        }
        response
            .json()
            .await
            .map_err(|e| CourierError::CarrierError(e.to_string()))
    }
}

#[async_trait]
impl CarrierApi for HttpCarrier {
    async fn create_shipment(&self, request: &ShipmentRequest) -> Result<Shipment> {
        let resource: ShipmentResource = self
            .post("/shipments", json!({ "shipment": request }))
            .await?;
        Ok(Shipment {
            id: resource.id,
            rates: resource.rates,
        })
    }

    async fn buy_shipment(&self, shipment_id: &str, rate: &Rate) -> Result<PurchasedShipment> {
        let resource: ShipmentResource = self
            .post(
                &format!("/shipments/{shipment_id}/buy"),
                json!({ "rate": { "id": rate.id } }),
            )
            .await?;
        Ok(PurchasedShipment {
            id: resource.id,
            tracking_code: resource.tracking_code.unwrap_or_default(),
            label_url: resource
                .postage_label
                .map(|label| label.label_url)
                .unwrap_or_default(),
            rate: rate.clone(),
        })
    }

    async fn verify_address(&self, address: &Address) -> Result<VerifiedAddress> {
        let verified: Address = self
            .post(
                "/addresses",
                json!({ "address": address, "verify": ["delivery"] }),
            )
            .await?;
        Ok(VerifiedAddress {
            valid: true,
            address: verified,
        })
    }

    async fn track(&self, tracking_code: &str) -> Result<TrackingStatus> {
        self.post(
            "/trackers",
            json!({ "tracker": { "tracking_code": tracking_code } }),
        )
        .await
    }
}

// ---------------------------------------------------------------------------
// Sandbox
// ---------------------------------------------------------------------------

/// Deterministic canned carrier for demo and test use. Never fails.
pub struct SandboxCarrier {
    counter: AtomicU64,
}

impl SandboxCarrier {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    fn next_id(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl Default for SandboxCarrier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CarrierApi for SandboxCarrier {
    async fn create_shipment(&self, _request: &ShipmentRequest) -> Result<Shipment> {
        let n = self.next_id();
        Ok(Shipment {
            id: format!("shp_sandbox_{n}"),
            rates: vec![
                Rate {
                    id: format!("rate_sandbox_{n}_usps"),
                    carrier: "USPS".to_string(),
                    service: "Priority".to_string(),
                    rate: "7.33".to_string(),
                    delivery_days: Some(2),
                    est_delivery_date: None,
                },
                Rate {
                    id: format!("rate_sandbox_{n}_ups"),
                    carrier: "UPS".to_string(),
                    service: "Ground".to_string(),
                    rate: "9.12".to_string(),
                    delivery_days: Some(4),
                    est_delivery_date: None,
                },
                Rate {
                    id: format!("rate_sandbox_{n}_fedex"),
                    carrier: "FedEx".to_string(),
                    service: "2Day".to_string(),
                    rate: "12.50".to_string(),
                    delivery_days: Some(2),
                    est_delivery_date: None,
                },
            ],
        })
    }

    async fn buy_shipment(&self, shipment_id: &str, rate: &Rate) -> Result<PurchasedShipment> {
        let n = self.next_id();
        Ok(PurchasedShipment {
            id: shipment_id.to_string(),
            tracking_code: format!("TRKSBX{n:09}"),
            label_url: format!("https://sandbox.invalid/labels/{shipment_id}.png"),
            rate: rate.clone(),
        })
    }

    async fn verify_address(&self, address: &Address) -> Result<VerifiedAddress> {
        let mut normalized = address.clone();
        normalized.street1 = normalized.street1.to_uppercase();
        normalized.city = normalized.city.to_uppercase();
        normalized.state = normalized.state.to_uppercase();
        Ok(VerifiedAddress {
            valid: true,
            address: normalized,
        })
    }

    async fn track(&self, tracking_code: &str) -> Result<TrackingStatus> {
        Ok(TrackingStatus {
            tracking_code: tracking_code.to_string(),
            status: "in_transit".to_string(),
            status_detail: "arrived_at_facility".to_string(),
            carrier: "USPS".to_string(),
            est_delivery_date: None,
        })
    }
}
