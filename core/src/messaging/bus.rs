// Message bus implementation
use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::envelope::{Envelope, EnvelopeStatus, Kind, Payload, Priority, Role};

/// Mailbox capacity per subscriber channel.
const SUBSCRIBER_CAPACITY: usize = 1024;

/// Handle returned by `subscribe`, used to deregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Lifecycle notifications published on the bus side channel.
#[derive(Debug, Clone)]
pub enum BusEvent {
    Sent(Envelope),
    Completed(Envelope),
    Failed(Envelope),
}

/// Per-role inbox breakdown reported by `stats`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleStats {
    pub total: usize,
    pub pending: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Aggregate bus statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BusStats {
    pub total_messages: usize,
    pub active_conversations: usize,
    pub per_role: HashMap<Role, RoleStats>,
}

/// Summary of one conversation still inside the retention window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationInfo {
    pub conversation_id: Uuid,
    pub message_count: usize,
    pub participants: Vec<Role>,
    pub last_activity: DateTime<Utc>,
}

struct Subscriber {
    id: SubscriptionId,
    sender: mpsc::Sender<Envelope>,
}

/// All mutable indices live behind one mutex: the spec's ordering and
/// lifecycle invariants rely on there being no concurrent writers, and the
/// three indices must move together on every send.
#[derive(Default)]
struct BusState {
    envelopes: HashMap<Uuid, Envelope>,
    // Role -> envelope ids addressed to it, in send order
    inboxes: HashMap<Role, Vec<Uuid>>,
    // Conversation id -> envelope ids, in send order
    conversations: HashMap<Uuid, Vec<Uuid>>,
    subscribers: HashMap<Role, Vec<Subscriber>>,
    next_subscription: u64,
}

/// Priority-aware pub/sub bus with conversation correlation.
///
/// Dispatch happens inline in `send`: the envelope is recorded in the store,
/// the recipient's inbox and its conversation, pushed to every subscriber
/// channel for the recipient role, and then the reclamation sweep runs.
/// There is no background scheduler loop.
pub struct MessageBus {
    state: Mutex<BusState>,
    events: broadcast::Sender<BusEvent>,
    // Resolved envelopes older than this are evicted by the sweep
    retention: Duration,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus {
    /// Bus with the default one-hour retention window.
    pub fn new() -> Self {
        Self::with_retention(Duration::hours(1))
    }

    pub fn with_retention(retention: Duration) -> Self {
        let (events, _) = broadcast::channel(1024);
        Self {
            state: Mutex::new(BusState::default()),
            events,
            retention,
        }
    }

    /// Send a message from one role to another.
    ///
    /// Always succeeds and returns the recorded envelope. Delivery never
    /// blocks the sender: a full or closed subscriber channel is counted as a
    /// drop for that subscriber, never an error or a stall for the sender.
    pub async fn send(
        &self,
        from: Role,
        to: Role,
        payload: Payload,
        priority: Priority,
        conversation_id: Option<Uuid>,
    ) -> Envelope {
        let envelope = Envelope::new(from, to, payload, priority, conversation_id);
        debug!(
            id = %envelope.id, %from, %to, kind = ?envelope.kind,
            conversation = %envelope.conversation_id, "Sending envelope"
        );

        // Record in store, inbox, and conversation atomically; snapshot the
        // subscriber channels so dispatch can await outside the lock.
        let targets: Vec<(SubscriptionId, mpsc::Sender<Envelope>)> = {
            let mut state = self.lock_state();
            state.envelopes.insert(envelope.id, envelope.clone());
            state.inboxes.entry(to).or_default().push(envelope.id);
            state
                .conversations
                .entry(envelope.conversation_id)
                .or_default()
                .push(envelope.id);
            state
                .subscribers
                .get(&to)
                .map(|subs| {
                    subs.iter()
                        .map(|s| (s.id, s.sender.clone()))
                        .collect()
                })
                .unwrap_or_default()
        };

        // Push notification: every subscriber on the recipient role sees the
        // envelope, independent of the single-recipient addressing.
        let mut dead = Vec::new();
        for (id, sender) in targets {
            match sender.try_send(envelope.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(%to, subscription = ?id, "Subscriber mailbox full; dropping delivery");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    warn!(%to, subscription = ?id, "Subscriber channel closed; dropping delivery");
                    dead.push(id);
                }
            }
        }
        let _ = self.events.send(BusEvent::Sent(envelope.clone()));

        {
            let mut state = self.lock_state();
            if !dead.is_empty() {
                if let Some(subs) = state.subscribers.get_mut(&to) {
                    subs.retain(|s| !dead.contains(&s.id));
                }
            }
            Self::sweep(&mut state, self.retention);
        }

        envelope
    }

    /// Register a mailbox for every envelope addressed to `role`.
    ///
    /// Multiple subscribers on the same role all receive every envelope.
    pub fn subscribe(&self, role: Role) -> (SubscriptionId, mpsc::Receiver<Envelope>) {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        let mut state = self.lock_state();
        state.next_subscription += 1;
        let id = SubscriptionId(state.next_subscription);
        state
            .subscribers
            .entry(role)
            .or_default()
            .push(Subscriber { id, sender: tx });
        info!(%role, subscription = ?id, "Subscribed");
        (id, rx)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut state = self.lock_state();
        for subs in state.subscribers.values_mut() {
            subs.retain(|s| s.id != id);
        }
        info!(subscription = ?id, "Unsubscribed");
    }

    /// Lifecycle side channel: sent/completed/failed notifications.
    pub fn events(&self) -> broadcast::Receiver<BusEvent> {
        self.events.subscribe()
    }

    /// All pending envelopes addressed to `role`, in send order, optionally
    /// filtered by kind. Pure read.
    pub fn inbox(&self, role: Role, kind: Option<Kind>) -> Vec<Envelope> {
        let state = self.lock_state();
        state
            .inboxes
            .get(&role)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.envelopes.get(id))
                    .filter(|e| e.is_pending())
                    .filter(|e| kind.map_or(true, |k| e.kind == k))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The single highest-priority pending envelope for `role`; ties broken
    /// by earliest creation time, then send order.
    pub fn next_envelope(&self, role: Role) -> Option<Envelope> {
        let state = self.lock_state();
        let ids = state.inboxes.get(&role)?;
        let mut best: Option<&Envelope> = None;
        for envelope in ids
            .iter()
            .filter_map(|id| state.envelopes.get(id))
            .filter(|e| e.is_pending())
        {
            best = match best {
                None => Some(envelope),
                Some(current)
                    if envelope.priority > current.priority
                        || (envelope.priority == current.priority
                            && envelope.created_at < current.created_at) =>
                {
                    Some(envelope)
                }
                Some(current) => Some(current),
            };
        }
        best.cloned()
    }

    /// One-shot Pending -> Completed transition.
    ///
    /// Returns false without raising when the id is unknown or the envelope
    /// is already terminal; the stored response is never overwritten.
    pub fn complete(&self, id: Uuid, response: Value) -> bool {
        let resolved = {
            let mut state = self.lock_state();
            match state.envelopes.get_mut(&id) {
                Some(envelope) if envelope.is_pending() => {
                    envelope.status = EnvelopeStatus::Completed;
                    envelope.response = Some(response);
                    envelope.resolved_at = Some(Utc::now());
                    Some(envelope.clone())
                }
                _ => None,
            }
        };
        match resolved {
            Some(envelope) => {
                debug!(%id, "Envelope completed");
                let _ = self.events.send(BusEvent::Completed(envelope));
                true
            }
            None => {
                debug!(%id, "Ignoring complete for unknown or resolved envelope");
                false
            }
        }
    }

    /// One-shot Pending -> Failed transition; same contract as `complete`.
    pub fn fail(&self, id: Uuid, error: impl Into<String>) -> bool {
        let resolved = {
            let mut state = self.lock_state();
            match state.envelopes.get_mut(&id) {
                Some(envelope) if envelope.is_pending() => {
                    envelope.status = EnvelopeStatus::Failed;
                    envelope.error = Some(error.into());
                    envelope.resolved_at = Some(Utc::now());
                    Some(envelope.clone())
                }
                _ => None,
            }
        };
        match resolved {
            Some(envelope) => {
                warn!(%id, error = envelope.error.as_deref().unwrap_or(""), "Envelope failed");
                let _ = self.events.send(BusEvent::Failed(envelope));
                true
            }
            None => {
                debug!(%id, "Ignoring fail for unknown or resolved envelope");
                false
            }
        }
    }

    /// Every envelope referencing the conversation, in send order.
    pub fn conversation(&self, conversation_id: Uuid) -> Vec<Envelope> {
        let state = self.lock_state();
        state
            .conversations
            .get(&conversation_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.envelopes.get(id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Conversations whose latest envelope falls inside the retention window.
    pub fn active_conversations(&self) -> Vec<ConversationInfo> {
        let state = self.lock_state();
        let now = Utc::now();
        let mut out = Vec::new();
        for (conversation_id, ids) in &state.conversations {
            let envelopes: Vec<&Envelope> = ids
                .iter()
                .filter_map(|id| state.envelopes.get(id))
                .collect();
            let Some(last) = envelopes.last() else {
                continue;
            };
            if now - last.created_at >= self.retention {
                continue;
            }
            let mut participants = Vec::new();
            for envelope in &envelopes {
                for role in [envelope.from, envelope.to] {
                    if !participants.contains(&role) {
                        participants.push(role);
                    }
                }
            }
            out.push(ConversationInfo {
                conversation_id: *conversation_id,
                message_count: envelopes.len(),
                participants,
                last_activity: last.created_at,
            });
        }
        out
    }

    /// Aggregate counts: store size, active conversations, and the per-role
    /// inbox breakdown by status.
    pub fn stats(&self) -> BusStats {
        let active_conversations = self.active_conversations().len();
        let state = self.lock_state();
        let mut per_role = HashMap::new();
        for (role, ids) in &state.inboxes {
            let mut stats = RoleStats::default();
            for envelope in ids.iter().filter_map(|id| state.envelopes.get(id)) {
                stats.total += 1;
                match envelope.status {
                    EnvelopeStatus::Pending => stats.pending += 1,
                    EnvelopeStatus::Completed => stats.completed += 1,
                    EnvelopeStatus::Failed => stats.failed += 1,
                }
            }
            per_role.insert(*role, stats);
        }
        BusStats {
            total_messages: state.envelopes.len(),
            active_conversations,
            per_role,
        }
    }

    /// Drop all subscriber channels and report whatever is still pending.
    pub fn shutdown(&self) {
        info!("Message bus shutting down");
        let mut state = self.lock_state();
        state.subscribers.clear();
        let mut stale: HashMap<Role, usize> = HashMap::new();
        for envelope in state.envelopes.values().filter(|e| e.is_pending()) {
            *stale.entry(envelope.to).or_default() += 1;
        }
        for (role, count) in stale {
            warn!(%role, count, "Stale pending envelopes at shutdown");
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, BusState> {
        // A poisoned lock means a panic mid-mutation; the indices are still
        // structurally sound, so keep serving.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Evict resolved envelopes older than the retention window, then drop
    /// conversations left with no surviving envelopes. Pending envelopes are
    /// never evicted, at any age.
    fn sweep(state: &mut BusState, retention: Duration) {
        let now = Utc::now();
        let BusState {
            envelopes,
            inboxes,
            conversations,
            ..
        } = state;

        let expired: Vec<Uuid> = envelopes
            .values()
            .filter(|e| !e.is_pending() && now - e.created_at > retention)
            .map(|e| e.id)
            .collect();
        if expired.is_empty() {
            return;
        }

        for id in &expired {
            if let Some(envelope) = envelopes.remove(id) {
                if let Some(inbox) = inboxes.get_mut(&envelope.to) {
                    inbox.retain(|entry| entry != id);
                }
            }
        }
        conversations.retain(|conversation_id, ids| {
            ids.retain(|id| envelopes.contains_key(id));
            if ids.is_empty() {
                debug!(conversation = %conversation_id, "Reclaimed empty conversation");
                false
            } else {
                true
            }
        });
        debug!(count = expired.len(), "Reclaimed resolved envelopes");
    }
}
