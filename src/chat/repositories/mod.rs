pub mod error;
pub mod history_repository;
pub mod in_memory_repository;
pub mod json_file_repository;

pub use error::{RepositoryError, RepositoryResult};
pub use history_repository::HistoryRepository;
pub use in_memory_repository::InMemoryHistoryRepository;
pub use json_file_repository::JsonFileRepository;

use parking_lot::Mutex;
use tracing::warn;

use crate::chat::models::ConversationsStore;

/// Write the store's full snapshot through the repository. A failed write is
/// logged and swallowed; persistence trouble must not abort a turn.
pub async fn save_snapshot(repo: &dyn HistoryRepository, store: &Mutex<ConversationsStore>) {
    let snapshot = store.lock().snapshot();
    if let Err(err) = repo.save(snapshot).await {
        warn!(error = %err, "failed to persist conversation snapshot");
    }
}
