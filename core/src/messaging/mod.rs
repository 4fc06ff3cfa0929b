//! Messaging layer: envelopes and the priority-aware message bus.
//!
//! - `Envelope`: a single addressed unit of communication with one-shot
//!   terminal resolution
//! - `MessageBus`: per-role inboxes, conversation correlation, push dispatch,
//!   and inline reclamation of resolved envelopes

pub mod bus;
pub mod envelope;

// Re-export key types for ergonomic access
pub use bus::{BusEvent, BusStats, ConversationInfo, MessageBus, RoleStats, SubscriptionId};
pub use envelope::{Envelope, EnvelopeStatus, Kind, Payload, Priority, Role, TaskPayload};
