use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::error::RepositoryResult;
use super::history_repository::{BoxFuture, HistoryRepository};
use crate::chat::models::Conversation;

/// In-memory history repository for tests and development.
#[derive(Clone, Default)]
pub struct InMemoryHistoryRepository {
    conversations: Arc<Mutex<Vec<Conversation>>>,
    saves: Arc<AtomicUsize>,
}

impl InMemoryHistoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current stored snapshot, for assertions.
    pub fn stored(&self) -> Vec<Conversation> {
        self.conversations.lock().clone()
    }

    /// How many times `save` has been called.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::Relaxed)
    }

    /// Seed the slot with an existing snapshot.
    pub fn seed(&self, conversations: Vec<Conversation>) {
        *self.conversations.lock() = conversations;
    }
}

impl HistoryRepository for InMemoryHistoryRepository {
    fn load(&self) -> BoxFuture<'static, RepositoryResult<Vec<Conversation>>> {
        let conversations = self.conversations.clone();
        Box::pin(async move { Ok(conversations.lock().clone()) })
    }

    fn save(&self, snapshot: Vec<Conversation>) -> BoxFuture<'static, RepositoryResult<()>> {
        let conversations = self.conversations.clone();
        let saves = self.saves.clone();
        Box::pin(async move {
            *conversations.lock() = snapshot;
            saves.fetch_add(1, Ordering::Relaxed);
            Ok(())
        })
    }
}
