use async_trait::async_trait;
use serde_json::Value;

use crate::messaging::{Role, TaskPayload};
use crate::Result;

/// Role-specific task handling behind a uniform contract.
///
/// The surrounding [`Worker`](super::Worker) loop owns status flips, the
/// Response envelope back to the originator, and the `complete`/`fail` call
/// on the task envelope; behaviors only turn a task into a body or an error.
#[async_trait]
pub trait WorkerBehavior: Send + Sync {
    fn role(&self) -> Role;

    fn name(&self) -> &str;

    async fn handle(&self, task: &TaskPayload) -> Result<Value>;

    /// Whether a handling failure should also propagate an Error envelope to
    /// the originator, in addition to failing the task envelope.
    fn forward_errors(&self) -> bool {
        false
    }
}
