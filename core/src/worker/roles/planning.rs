use async_trait::async_trait;
use serde_json::{json, Value};

use crate::messaging::{Role, TaskPayload};
use crate::worker::WorkerBehavior;
use crate::Result;

/// Architecture and roadmap documents, canned.
pub struct PlanningWorker;

impl PlanningWorker {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PlanningWorker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkerBehavior for PlanningWorker {
    fn role(&self) -> Role {
        Role::Planning
    }

    fn name(&self) -> &str {
        "Planning Worker"
    }

    async fn handle(&self, task: &TaskPayload) -> Result<Value> {
        Ok(json!({
            "document": "architecture-plan",
            "request": task.request,
            "overview": {
                "style": "monolith with a thin carrier service layer",
                "stack": ["Next.js", "PostgreSQL", "EasyPost-compatible carrier API"],
            },
            "database": {
                "tables": ["shipments", "addresses", "labels"],
                "relationships": ["shipments -> addresses (from, to)", "labels -> shipments"],
            },
            "api": [
                { "method": "POST", "path": "/api/shipments" },
                { "method": "GET",  "path": "/api/shipments/:id" },
                { "method": "POST", "path": "/api/shipments/:id/label" },
            ],
            "phases": [
                { "name": "schema and service layer", "complexity": "medium" },
                { "name": "shipment endpoints", "complexity": "medium" },
                { "name": "label purchase and tracking", "complexity": "high" },
            ],
            "risks": [
                "carrier API rate limits",
                "address validation edge cases",
            ],
        }))
    }
}
