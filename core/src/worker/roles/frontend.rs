use async_trait::async_trait;
use serde_json::{json, Value};

use crate::messaging::{Role, TaskPayload};
use crate::worker::WorkerBehavior;
use crate::Result;

/// Component and page sources, canned.
pub struct FrontendWorker;

impl FrontendWorker {
    pub fn new() -> Self {
        Self
    }

    fn shipment_form() -> &'static str {
        r#"'use client';

import { useState } from 'react';

export default function ShipmentForm() {
  const [formData, setFormData] = useState({
    fromAddress: {},
    toAddress: {},
    parcel: {}
  });

  const handleSubmit = async (e) => {
    e.preventDefault();
    const res = await fetch('/api/shipments', {
      method: 'POST',
      headers: { 'Content-Type': 'application/json' },
      body: JSON.stringify(formData)
    });
    const shipment = await res.json();
    console.log('Created:', shipment);
  };

  return (
    <form onSubmit={handleSubmit} className="space-y-4">
      <button type="submit" className="btn-primary">
        Create Shipment
      </button>
    </form>
  );
}"#
    }

    fn shipment_list() -> &'static str {
        r#"'use client';

import { useEffect, useState } from 'react';

export default function ShipmentList() {
  const [shipments, setShipments] = useState([]);

  useEffect(() => {
    fetch('/api/shipments')
      .then(res => res.json())
      .then(data => setShipments(data));
  }, []);

  return (
    <div className="grid gap-4">
      {shipments.map(shipment => (
        <div key={shipment.id} className="card">
          <h3>{shipment.tracking_code}</h3>
          <p>Status: {shipment.status}</p>
        </div>
      ))}
    </div>
  );
}"#
    }

    fn shipments_page() -> &'static str {
        r#"import ShipmentForm from '@/components/ShipmentForm';
import ShipmentList from '@/components/ShipmentList';

export default function ShipmentsPage() {
  return (
    <main className="container mx-auto p-6">
      <h1 className="text-3xl font-bold mb-6">Shipments</h1>
      <div className="grid md:grid-cols-2 gap-6">
        <ShipmentForm />
        <ShipmentList />
      </div>
    </main>
  );
}"#
    }
}

impl Default for FrontendWorker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkerBehavior for FrontendWorker {
    fn role(&self) -> Role {
        Role::Frontend
    }

    fn name(&self) -> &str {
        "Frontend Worker"
    }

    async fn handle(&self, _task: &TaskPayload) -> Result<Value> {
        Ok(json!({
            "components": [
                { "path": "components/ShipmentForm.tsx", "content": Self::shipment_form() },
                { "path": "components/ShipmentList.tsx", "content": Self::shipment_list() },
            ],
            "pages": [
                { "path": "app/shipments/page.tsx", "content": Self::shipments_page() },
            ],
            "styles": ["tailwind.config.js", "globals.css"],
        }))
    }
}
