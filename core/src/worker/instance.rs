use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::messaging::{MessageBus, Payload, Priority, Role, SubscriptionId};

use super::behavior::WorkerBehavior;
use super::{capabilities, WorkerStatus};

/// Snapshot of one worker for the `status` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerInfo {
    pub role: Role,
    pub name: String,
    pub status: WorkerStatus,
    pub capabilities: Vec<String>,
}

/// A running worker: a subscription on its role plus the consuming task.
pub struct Worker {
    role: Role,
    name: String,
    status: Arc<RwLock<WorkerStatus>>,
    subscription: SubscriptionId,
    handle: tokio::task::JoinHandle<()>,
}

impl Worker {
    /// Subscribe the behavior's role and start consuming its mailbox.
    pub fn spawn(bus: Arc<MessageBus>, behavior: Box<dyn WorkerBehavior>) -> Self {
        let role = behavior.role();
        let name = behavior.name().to_string();
        let status = Arc::new(RwLock::new(WorkerStatus::Idle));
        let (subscription, mut rx) = bus.subscribe(role);
        info!(%role, name = %name, "Worker starting");

        let loop_status = Arc::clone(&status);
        let handle = tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let task = match &envelope.payload {
                    Payload::Task(task) => task.clone(),
                    other => {
                        debug!(%role, kind = ?other.kind(), "Ignoring non-task envelope");
                        continue;
                    }
                };
                debug!(%role, id = %envelope.id, task = %task.task, "Task received");
                set_status(&loop_status, WorkerStatus::Busy);

                match behavior.handle(&task).await {
                    Ok(body) => {
                        bus.send(
                            role,
                            envelope.from,
                            Payload::Response { body: body.clone() },
                            Priority::default(),
                            Some(envelope.conversation_id),
                        )
                        .await;
                        bus.complete(envelope.id, body);
                        debug!(%role, id = %envelope.id, "Task completed");
                    }
                    Err(e) => {
                        warn!(%role, id = %envelope.id, error = %e, "Task failed");
                        bus.fail(envelope.id, e.to_string());
                        if behavior.forward_errors() {
                            bus.send(
                                role,
                                envelope.from,
                                Payload::Error {
                                    message: e.to_string(),
                                },
                                Priority::default(),
                                Some(envelope.conversation_id),
                            )
                            .await;
                        }
                    }
                }

                // Both paths come back to idle; the flag is advisory only.
                set_status(&loop_status, WorkerStatus::Idle);
            }
            info!(%role, "Worker stopped");
        });

        Self {
            role,
            name,
            status,
            subscription,
            handle,
        }
    }

    pub fn status(&self) -> WorkerStatus {
        *self.status.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn info(&self) -> WorkerInfo {
        WorkerInfo {
            role: self.role,
            name: self.name.clone(),
            status: self.status(),
            capabilities: capabilities(self.role)
                .iter()
                .map(|c| c.to_string())
                .collect(),
        }
    }

    /// Deregister from the bus and abort the consuming task.
    pub fn stop(self, bus: &MessageBus) {
        bus.unsubscribe(self.subscription);
        self.handle.abort();
    }
}

fn set_status(status: &RwLock<WorkerStatus>, value: WorkerStatus) {
    *status.write().unwrap_or_else(|e| e.into_inner()) = value;
}
