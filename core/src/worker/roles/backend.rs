use async_trait::async_trait;
use serde_json::{json, Value};

use crate::messaging::{Role, TaskPayload};
use crate::worker::WorkerBehavior;
use crate::Result;

/// API route and service-layer sources, canned. Tasks mentioning an API or
/// endpoint get the full shipment route set; anything else gets a stub.
pub struct BackendWorker;

impl BackendWorker {
    pub fn new() -> Self {
        Self
    }

    fn shipment_api() -> &'static str {
        r#"// Next.js API Route: pages/api/shipments.js
import { createShipment, getShipment } from '@/lib/services/carrierService';

export default async function handler(req, res) {
  if (req.method === 'POST') {
    try {
      const shipment = await createShipment(req.body);
      return res.status(201).json(shipment);
    } catch (error) {
      return res.status(500).json({ error: error.message });
    }
  }

  if (req.method === 'GET') {
    try {
      const { id } = req.query;
      const shipment = await getShipment(id);
      return res.status(200).json(shipment);
    } catch (error) {
      return res.status(404).json({ error: 'Shipment not found' });
    }
  }

  res.status(405).json({ error: 'Method not allowed' });
}"#
    }

    fn carrier_service() -> &'static str {
        r#"// Carrier Service Layer
import CarrierClient from '@carrier/api';

const client = new CarrierClient(process.env.CARRIER_API_KEY);

export async function createShipment(data) {
  return await client.Shipment.create(data);
}

export async function getShipment(id) {
  return await client.Shipment.retrieve(id);
}"#
    }
}

impl Default for BackendWorker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkerBehavior for BackendWorker {
    fn role(&self) -> Role {
        Role::Backend
    }

    fn name(&self) -> &str {
        "Backend Worker"
    }

    async fn handle(&self, task: &TaskPayload) -> Result<Value> {
        let lower = task.task.to_lowercase();
        if lower.contains("api") || lower.contains("endpoint") {
            return Ok(json!({
                "files": [
                    { "path": "pages/api/shipments.js", "content": Self::shipment_api() },
                    { "path": "lib/services/carrierService.js", "content": Self::carrier_service() },
                ],
                "database": {
                    "migrations": ["create_shipments_table", "create_addresses_table"],
                },
                "tests": ["shipments.test.js"],
                "documentation": "API endpoints created for shipment management",
            }));
        }

        Ok(json!({
            "message": format!("Backend code generated for: {}", task.task),
            "files": [],
            "next_steps": ["Review code", "Run tests", "Deploy"],
        }))
    }
}
