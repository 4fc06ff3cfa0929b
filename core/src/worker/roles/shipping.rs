use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use crate::carrier::{best_rate, Address, CarrierApi, Parcel, RateCriteria, ShipmentRequest};
use crate::messaging::{Role, TaskPayload};
use crate::worker::WorkerBehavior;
use crate::{CourierError, Result};

/// Shipping specialist. Routes task text onto carrier API calls and answers
/// with the raw carrier data. Tasks carry no addresses, so label and rate
/// operations run against a fixed demo shipment.
pub struct ShippingWorker {
    carrier: Arc<dyn CarrierApi>,
}

impl ShippingWorker {
    pub fn new(carrier: Arc<dyn CarrierApi>) -> Self {
        Self { carrier }
    }

    fn demo_shipment() -> ShipmentRequest {
        ShipmentRequest {
            from_address: Self::demo_from_address(),
            to_address: Self::demo_to_address(),
            parcel: Parcel {
                length: 8.0,
                width: 5.0,
                height: 5.0,
                weight: 5.0,
            },
        }
    }

    fn demo_from_address() -> Address {
        Address {
            name: Some("Courier Demo Warehouse".to_string()),
            street1: "417 Montgomery St".to_string(),
            street2: None,
            city: "San Francisco".to_string(),
            state: "CA".to_string(),
            zip: "94104".to_string(),
            country: "US".to_string(),
        }
    }

    fn demo_to_address() -> Address {
        Address {
            name: Some("Courier Demo Customer".to_string()),
            street1: "179 N Harbor Dr".to_string(),
            street2: None,
            city: "Redondo Beach".to_string(),
            state: "CA".to_string(),
            zip: "90277".to_string(),
            country: "US".to_string(),
        }
    }

    async fn create_label(&self) -> Result<Value> {
        let request = Self::demo_shipment();
        let shipment = self.carrier.create_shipment(&request).await?;
        let rate = best_rate(&shipment.rates, &RateCriteria::Lowest)?;
        let purchased = self.carrier.buy_shipment(&shipment.id, rate).await?;
        info!(
            shipment_id = %purchased.id,
            tracking_code = %purchased.tracking_code,
            "Label purchased"
        );
        Ok(json!({
            "shipment_id": purchased.id,
            "tracking_code": purchased.tracking_code,
            "label_url": purchased.label_url,
            "rate": purchased.rate.rate,
            "carrier": purchased.rate.carrier,
            "service": purchased.rate.service,
        }))
    }

    async fn validate_address(&self) -> Result<Value> {
        let verified = self.carrier.verify_address(&Self::demo_to_address()).await?;
        Ok(json!({
            "valid": verified.valid,
            "address": verified.address,
        }))
    }

    async fn quote_rates(&self) -> Result<Value> {
        let shipment = self.carrier.create_shipment(&Self::demo_shipment()).await?;
        Ok(json!({
            "shipment_id": shipment.id,
            "rates": shipment.rates,
        }))
    }

    async fn track_shipment(&self, task: &str) -> Result<Value> {
        // Use an explicit tracking code from the task text when one is
        // present, else fall back to a demo code.
        let code = task
            .split_whitespace()
            .find(|word| {
                word.len() >= 10
                    && word.chars().all(|c| c.is_ascii_alphanumeric())
                    && word.chars().any(|c| c.is_ascii_digit())
            })
            .unwrap_or("TRKSBX000000001");
        let status = self.carrier.track(code).await?;
        Ok(serde_json::to_value(status)?)
    }

    fn classify(text: &str) -> Option<ShippingOp> {
        let lower = text.to_lowercase();
        if lower.contains("label") || lower.contains("shipment") {
            Some(ShippingOp::Label)
        } else if lower.contains("address") && lower.contains("validate") {
            Some(ShippingOp::Validate)
        } else if lower.contains("rate") {
            Some(ShippingOp::Rates)
        } else if lower.contains("track") {
            Some(ShippingOp::Track)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShippingOp {
    Label,
    Validate,
    Rates,
    Track,
}

#[async_trait]
impl WorkerBehavior for ShippingWorker {
    fn role(&self) -> Role {
        Role::Shipping
    }

    fn name(&self) -> &str {
        "Shipping Worker"
    }

    async fn handle(&self, task: &TaskPayload) -> Result<Value> {
        // Planned tasks carry a generic task line; the originating request is
        // what names the operation, so it is the fallback for routing.
        let operation =
            Self::classify(&task.task).or_else(|| Self::classify(&task.request));
        match operation {
            Some(ShippingOp::Label) => self.create_label().await,
            Some(ShippingOp::Validate) => self.validate_address().await,
            Some(ShippingOp::Rates) => self.quote_rates().await,
            Some(ShippingOp::Track) => {
                self.track_shipment(&format!("{} {}", task.task, task.request))
                    .await
            }
            None => Err(CourierError::WorkerError(format!(
                "unknown shipping task: {}",
                task.task
            ))),
        }
    }

    fn forward_errors(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carrier::{
        MockCarrierApi, PurchasedShipment, Rate, Shipment, TrackingStatus, VerifiedAddress,
    };

    fn rates() -> Vec<Rate> {
        vec![
            Rate {
                id: "rate_1".to_string(),
                carrier: "USPS".to_string(),
                service: "Priority".to_string(),
                rate: "7.33".to_string(),
                delivery_days: Some(2),
                est_delivery_date: None,
            },
            Rate {
                id: "rate_2".to_string(),
                carrier: "FedEx".to_string(),
                service: "2Day".to_string(),
                rate: "12.50".to_string(),
                delivery_days: Some(2),
                est_delivery_date: None,
            },
        ]
    }

    #[tokio::test]
    async fn label_task_buys_the_cheapest_rate() {
        let mut carrier = MockCarrierApi::new();
        carrier.expect_create_shipment().returning(|_| {
            Ok(Shipment {
                id: "shp_1".to_string(),
                rates: rates(),
            })
        });
        carrier
            .expect_buy_shipment()
            .withf(|id, rate| id == "shp_1" && rate.id == "rate_1")
            .returning(|id, rate| {
                Ok(PurchasedShipment {
                    id: id.to_string(),
                    tracking_code: "TRK123456789".to_string(),
                    label_url: "https://example.invalid/label.png".to_string(),
                    rate: rate.clone(),
                })
            });

        let worker = ShippingWorker::new(Arc::new(carrier));
        let result = worker
            .handle(&TaskPayload {
                task: "Create a shipping label".to_string(),
                request: "ship a package".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(result["tracking_code"], "TRK123456789");
        assert_eq!(result["carrier"], "USPS");
        assert_eq!(result["rate"], "7.33");
    }

    #[tokio::test]
    async fn generic_planned_task_routes_on_the_originating_request() {
        let mut carrier = MockCarrierApi::new();
        carrier.expect_create_shipment().returning(|_| {
            Ok(Shipment {
                id: "shp_3".to_string(),
                rates: rates(),
            })
        });
        carrier.expect_buy_shipment().returning(|id, rate| {
            Ok(PurchasedShipment {
                id: id.to_string(),
                tracking_code: "TRK987654321".to_string(),
                label_url: "https://example.invalid/label.png".to_string(),
                rate: rate.clone(),
            })
        });

        let worker = ShippingWorker::new(Arc::new(carrier));
        // The planner sends a generic task line; the operation lives in the
        // user's request.
        let result = worker
            .handle(&TaskPayload {
                task: "Implement shipping functionality".to_string(),
                request: "Create a shipping label".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(result["tracking_code"], "TRK987654321");
    }

    #[tokio::test]
    async fn generic_planned_task_with_tracking_request_tracks() {
        let mut carrier = MockCarrierApi::new();
        carrier
            .expect_track()
            .withf(|code| code == "TRK555000111")
            .returning(|code| {
                Ok(TrackingStatus {
                    tracking_code: code.to_string(),
                    status: "in_transit".to_string(),
                    status_detail: "arrived_at_facility".to_string(),
                    carrier: "USPS".to_string(),
                    est_delivery_date: None,
                })
            });

        let worker = ShippingWorker::new(Arc::new(carrier));
        let result = worker
            .handle(&TaskPayload {
                task: "Implement shipping functionality".to_string(),
                request: "Track TRK555000111".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(result["status"], "in_transit");
    }

    #[tokio::test]
    async fn validate_task_verifies_the_address() {
        let mut carrier = MockCarrierApi::new();
        carrier.expect_verify_address().returning(|address| {
            Ok(VerifiedAddress {
                valid: true,
                address: address.clone(),
            })
        });

        let worker = ShippingWorker::new(Arc::new(carrier));
        let result = worker
            .handle(&TaskPayload {
                task: "Validate the destination address".to_string(),
                request: String::new(),
            })
            .await
            .unwrap();

        assert_eq!(result["valid"], true);
        assert_eq!(result["address"]["city"], "Redondo Beach");
    }

    #[tokio::test]
    async fn rate_task_returns_the_full_rate_list() {
        let mut carrier = MockCarrierApi::new();
        carrier.expect_create_shipment().returning(|_| {
            Ok(Shipment {
                id: "shp_2".to_string(),
                rates: rates(),
            })
        });

        let worker = ShippingWorker::new(Arc::new(carrier));
        let result = worker
            .handle(&TaskPayload {
                task: "Get rate quotes".to_string(),
                request: String::new(),
            })
            .await
            .unwrap();

        assert_eq!(result["shipment_id"], "shp_2");
        assert_eq!(result["rates"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn track_task_extracts_the_tracking_code() {
        let mut carrier = MockCarrierApi::new();
        carrier
            .expect_track()
            .withf(|code| code == "TRK123456789")
            .returning(|code| {
                Ok(TrackingStatus {
                    tracking_code: code.to_string(),
                    status: "in_transit".to_string(),
                    status_detail: "arrived_at_facility".to_string(),
                    carrier: "USPS".to_string(),
                    est_delivery_date: None,
                })
            });

        let worker = ShippingWorker::new(Arc::new(carrier));
        let result = worker
            .handle(&TaskPayload {
                task: "Track TRK123456789".to_string(),
                request: String::new(),
            })
            .await
            .unwrap();

        assert_eq!(result["status"], "in_transit");
    }

    #[tokio::test]
    async fn unknown_task_errors() {
        let worker = ShippingWorker::new(Arc::new(MockCarrierApi::new()));
        let result = worker
            .handle(&TaskPayload {
                task: "Make coffee".to_string(),
                request: String::new(),
            })
            .await;
        assert!(result.is_err());
    }
}
