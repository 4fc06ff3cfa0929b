//! Worker runtime split into smaller files for readability.
//! - behavior.rs: WorkerBehavior trait
//! - instance.rs: Worker struct and the per-role consuming loop
//! - roles/: the four role-specific behaviors

mod behavior;
mod instance;
pub mod roles;

pub use behavior::WorkerBehavior;
pub use instance::{Worker, WorkerInfo};

use serde::{Deserialize, Serialize};

use crate::messaging::Role;

/// Advisory two-state status flag. Nothing gates delivery on it; overlapping
/// handling on one worker is tolerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    Idle,
    Busy,
}

impl std::fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerStatus::Idle => f.write_str("idle"),
            WorkerStatus::Busy => f.write_str("busy"),
        }
    }
}

/// Static role -> capability table.
pub fn capabilities(role: Role) -> &'static [&'static str] {
    match role {
        Role::Orchestrator => &["request-classification", "task-routing", "response-aggregation"],
        Role::Planning => &[
            "architecture-design",
            "system-planning",
            "api-specification",
            "database-schema",
            "roadmap-creation",
        ],
        Role::Backend => &[
            "api-development",
            "database-integration",
            "authentication",
            "server-logic",
            "api-documentation",
        ],
        Role::Frontend => &[
            "ui-development",
            "component-creation",
            "page-layout",
            "state-management",
        ],
        Role::Shipping => &[
            "label-creation",
            "address-validation",
            "rate-calculation",
            "shipment-tracking",
            "carrier-management",
        ],
    }
}
