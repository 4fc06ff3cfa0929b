use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A fixed category of worker. Every envelope is addressed from one role to
/// exactly one other role; `Orchestrator` is the fan-out/fan-in coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Orchestrator,
    Planning,
    Backend,
    Frontend,
    Shipping,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Orchestrator => "orchestrator",
            Role::Planning => "planning-worker",
            Role::Backend => "backend-worker",
            Role::Frontend => "frontend-worker",
            Role::Shipping => "shipping-worker",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message kind, derived from the payload variant at send time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Task,
    Query,
    Response,
    Status,
    Error,
}

/// Delivery priority. Total order: High > Medium > Low.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

/// Envelope lifecycle. Transitions are monotonic: `Pending` moves to exactly
/// one of `Completed` or `Failed` and never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    Pending,
    Completed,
    Failed,
}

/// Work order carried by a `Task` envelope: the role-specific task line plus
/// the originating user request for context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPayload {
    pub task: String,
    pub request: String,
}

/// Closed set of payload variants, one per message kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Payload {
    Task(TaskPayload),
    Query { question: String },
    Response { body: Value },
    Status { state: String },
    Error { message: String },
}

impl Payload {
    pub fn kind(&self) -> Kind {
        match self {
            Payload::Task(_) => Kind::Task,
            Payload::Query { .. } => Kind::Query,
            Payload::Response { .. } => Kind::Response,
            Payload::Status { .. } => Kind::Status,
            Payload::Error { .. } => Kind::Error,
        }
    }
}

/// A single addressed unit of communication between roles.
///
/// Envelopes are created only by [`MessageBus::send`](crate::MessageBus::send),
/// resolved at most once by `complete`/`fail`, and evicted only by the
/// reclamation sweep once terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub id: Uuid,
    pub from: Role,
    pub to: Role,
    pub kind: Kind,
    pub payload: Payload,
    pub priority: Priority,
    /// Correlates a request with its eventual responses. Generated when the
    /// caller does not supply one.
    pub conversation_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub status: EnvelopeStatus,
    /// Populated exactly once, on the Pending -> Completed transition.
    pub response: Option<Value>,
    /// Populated exactly once, on the Pending -> Failed transition.
    pub error: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Envelope {
    pub(crate) fn new(
        from: Role,
        to: Role,
        payload: Payload,
        priority: Priority,
        conversation_id: Option<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            from,
            to,
            kind: payload.kind(),
            payload,
            priority,
            conversation_id: conversation_id.unwrap_or_else(Uuid::new_v4),
            created_at: Utc::now(),
            status: EnvelopeStatus::Pending,
            response: None,
            error: None,
            resolved_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == EnvelopeStatus::Pending
    }
}
