//! Request classification, fan-out dispatch, and fan-in aggregation.
//!
//! The orchestrator turns free-form requests into a [`Plan`], sends one Task
//! envelope per planned role under a fresh conversation id, and accumulates
//! Response envelopes until the expected count is reached, at which point a
//! [`ConversationSummary`] is emitted exactly once.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::messaging::{Envelope, MessageBus, Payload, Priority, Role, TaskPayload};

/// One task tuple of a plan, destined for a single role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedTask {
    pub role: Role,
    pub task: String,
    pub priority: Priority,
}

/// Orchestrator-computed fan-out for one incoming request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub description: String,
    pub tasks: Vec<PlannedTask>,
}

impl Plan {
    pub fn roles(&self) -> Vec<Role> {
        let mut roles = Vec::new();
        for task in &self.tasks {
            if !roles.contains(&task.role) {
                roles.push(task.role);
            }
        }
        roles
    }

    /// Number of distinct roles in the task set.
    pub fn expected_responses(&self) -> usize {
        self.roles().len()
    }
}

/// One worker's contribution to a finished conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerReply {
    pub role: Role,
    pub body: Value,
    pub received_at: DateTime<Utc>,
}

/// Emitted once per conversation, when every planned role has responded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub conversation_id: Uuid,
    pub request: String,
    pub roles: Vec<Role>,
    pub replies: Vec<WorkerReply>,
    pub elapsed_ms: i64,
}

/// Progress snapshot of a conversation still waiting on responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRequest {
    pub conversation_id: Uuid,
    pub request: String,
    pub received: usize,
    pub expected: usize,
}

struct OpenRecord {
    request: String,
    plan: Plan,
    started_at: DateTime<Utc>,
    replies: Vec<WorkerReply>,
}

pub struct Orchestrator {
    bus: Arc<MessageBus>,
    open: DashMap<Uuid, OpenRecord>,
    summaries: broadcast::Sender<ConversationSummary>,
}

impl Orchestrator {
    pub fn new(bus: Arc<MessageBus>) -> Arc<Self> {
        let (summaries, _) = broadcast::channel(64);
        Arc::new(Self {
            bus,
            open: DashMap::new(),
            summaries,
        })
    }

    /// Subscribe the orchestrator role and consume its mailbox.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let (_subscription, mut rx) = self.bus.subscribe(Role::Orchestrator);
        info!("Orchestrator online");
        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                self.on_envelope(envelope);
            }
        })
    }

    /// Summary side channel; one event per finished conversation.
    pub fn summaries(&self) -> broadcast::Receiver<ConversationSummary> {
        self.summaries.subscribe()
    }

    /// Classify a request and fan it out; returns the plan that was sent.
    pub async fn handle_request(&self, request: &str) -> Plan {
        let plan = analyze_request(request);
        let conversation_id = Uuid::new_v4();
        info!(
            %conversation_id,
            description = %plan.description,
            roles = ?plan.roles(),
            "Dispatching plan"
        );

        self.open.insert(
            conversation_id,
            OpenRecord {
                request: request.to_string(),
                plan: plan.clone(),
                started_at: Utc::now(),
                replies: Vec::new(),
            },
        );

        for task in &plan.tasks {
            self.bus
                .send(
                    Role::Orchestrator,
                    task.role,
                    Payload::Task(TaskPayload {
                        task: task.task.clone(),
                        request: request.to_string(),
                    }),
                    task.priority,
                    Some(conversation_id),
                )
                .await;
        }

        plan
    }

    /// Handle one envelope delivered to the orchestrator role.
    ///
    /// Response envelopes matching an open conversation accumulate toward the
    /// plan's expected count; Error envelopes are logged and do not count, so
    /// a failing role leaves its conversation open.
    pub fn on_envelope(&self, envelope: Envelope) {
        match &envelope.payload {
            Payload::Response { body } => {
                self.on_response(&envelope, body.clone());
            }
            Payload::Error { message } => {
                warn!(
                    from = %envelope.from,
                    conversation = %envelope.conversation_id,
                    %message,
                    "Worker reported an error"
                );
            }
            other => {
                debug!(
                    from = %envelope.from,
                    kind = ?other.kind(),
                    "Ignoring non-response envelope"
                );
            }
        }
    }

    fn on_response(&self, envelope: &Envelope, body: Value) {
        let conversation_id = envelope.conversation_id;
        let finished = {
            let Some(mut record) = self.open.get_mut(&conversation_id) else {
                debug!(
                    from = %envelope.from,
                    %conversation_id,
                    "Late or unsolicited response; conversation not open"
                );
                return;
            };
            record.replies.push(WorkerReply {
                role: envelope.from,
                body,
                received_at: Utc::now(),
            });
            info!(
                from = %envelope.from,
                %conversation_id,
                received = record.replies.len(),
                expected = record.plan.expected_responses(),
                "Response received"
            );
            record.replies.len() == record.plan.expected_responses()
        };

        if finished {
            if let Some((_, record)) = self.open.remove(&conversation_id) {
                self.summarize(conversation_id, record);
            }
        }
    }

    fn summarize(&self, conversation_id: Uuid, record: OpenRecord) {
        let elapsed_ms = (Utc::now() - record.started_at).num_milliseconds();
        let summary = ConversationSummary {
            conversation_id,
            request: record.request,
            roles: record.plan.roles(),
            replies: record.replies,
            elapsed_ms,
        };
        info!(
            %conversation_id,
            roles = ?summary.roles,
            elapsed_ms,
            "Conversation complete"
        );
        let _ = self.summaries.send(summary);
    }

    /// Snapshot of conversations still waiting on responses.
    pub fn open_requests(&self) -> Vec<OpenRequest> {
        self.open
            .iter()
            .map(|entry| OpenRequest {
                conversation_id: *entry.key(),
                request: entry.request.clone(),
                received: entry.replies.len(),
                expected: entry.plan.expected_responses(),
            })
            .collect()
    }
}

/// Category checks run in a fixed order (architecture, backend, frontend,
/// shipping) against the lowercased request. Matches are independent, never
/// first-match-wins; the order only fixes description concatenation. Zero
/// matches fall back to a single Medium-priority planning task.
pub fn analyze_request(request: &str) -> Plan {
    let lower = request.to_lowercase();
    let mut plan = Plan {
        description: String::new(),
        tasks: Vec::new(),
    };

    let contains_any = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));

    if contains_any(&["architect", "design", "plan", "structure", "schema", "roadmap"]) {
        plan.tasks.push(PlannedTask {
            role: Role::Planning,
            task: "Create architecture and planning documents".to_string(),
            priority: Priority::High,
        });
        plan.description = "Create architectural design".to_string();
    }

    if contains_any(&["api", "endpoint", "backend", "server", "database", "auth"]) {
        plan.tasks.push(PlannedTask {
            role: Role::Backend,
            task: "Develop backend API and services".to_string(),
            priority: Priority::High,
        });
        plan.description = if plan.description.is_empty() {
            "Develop backend API".to_string()
        } else {
            format!("{} and backend development", plan.description)
        };
    }

    if contains_any(&["ui", "frontend", "component", "page", "form", "dashboard"]) {
        plan.tasks.push(PlannedTask {
            role: Role::Frontend,
            task: "Build frontend UI components".to_string(),
            priority: Priority::Medium,
        });
        plan.description = if plan.description.is_empty() {
            "Build frontend UI".to_string()
        } else {
            format!("{} and frontend UI", plan.description)
        };
    }

    if contains_any(&["ship", "label", "track", "rate", "address", "package", "carrier"]) {
        plan.tasks.push(PlannedTask {
            role: Role::Shipping,
            task: "Implement shipping functionality".to_string(),
            priority: Priority::High,
        });
        plan.description = if plan.description.is_empty() {
            "Handle shipping operations".to_string()
        } else {
            format!("{} with shipping integration", plan.description)
        };
    }

    if plan.tasks.is_empty() {
        plan.tasks.push(PlannedTask {
            role: Role::Planning,
            task: "Analyze and plan the request".to_string(),
            priority: Priority::Medium,
        });
        plan.description = "Analyze and create plan".to_string();
    }

    plan
}
