use std::future::Future;
use std::pin::Pin;

use super::error::RepositoryResult;
use crate::chat::models::Conversation;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Persistence port for the conversation store: one slot holding the full
/// serialized history. Read once at startup; every store mutation writes the
/// whole snapshot back (no deltas, no batching).
pub trait HistoryRepository: Send + Sync + 'static {
    /// Load the stored history. A malformed or missing blob loads as empty
    /// history, never as an error.
    fn load(&self) -> BoxFuture<'static, RepositoryResult<Vec<Conversation>>>;

    /// Overwrite the stored history with a full snapshot.
    fn save(&self, snapshot: Vec<Conversation>) -> BoxFuture<'static, RepositoryResult<()>>;
}
