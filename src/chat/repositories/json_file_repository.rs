use std::path::PathBuf;

use tracing::warn;

use super::error::{RepositoryError, RepositoryResult};
use super::history_repository::{BoxFuture, HistoryRepository};
use crate::chat::models::Conversation;

/// File-backed history repository. The whole conversation store lives in one
/// JSON file under the platform config directory, written atomically
/// (temp file + rename).
pub struct JsonFileRepository {
    path: PathBuf,
}

impl JsonFileRepository {
    pub fn new() -> RepositoryResult<Self> {
        let path = dirs::config_dir()
            .ok_or_else(|| RepositoryError::Initialization {
                message: "Could not determine config directory".to_string(),
            })?
            .join("dardasha")
            .join("history.json");

        Ok(Self { path })
    }

    /// Repository over an explicit file path (used by tests).
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }
}

impl HistoryRepository for JsonFileRepository {
    fn load(&self) -> BoxFuture<'static, RepositoryResult<Vec<Conversation>>> {
        let path = self.path.clone();

        Box::pin(async move {
            run_blocking(move || {
                if !path.exists() {
                    return Ok(Vec::new());
                }

                let content = std::fs::read_to_string(&path)?;
                match serde_json::from_str(&content) {
                    Ok(conversations) => Ok(conversations),
                    Err(err) => {
                        // A garbled file is treated as empty history rather
                        // than blocking startup.
                        warn!(path = %path.display(), error = %err, "stored history is malformed, starting empty");
                        Ok(Vec::new())
                    }
                }
            })
            .await
        })
    }

    fn save(&self, snapshot: Vec<Conversation>) -> BoxFuture<'static, RepositoryResult<()>> {
        let path = self.path.clone();

        Box::pin(async move {
            run_blocking(move || {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }

                let json = serde_json::to_string_pretty(&snapshot)?;

                let temp_path = path.with_extension("json.tmp");
                std::fs::write(&temp_path, json)?;
                std::fs::rename(&temp_path, &path)?;

                Ok(())
            })
            .await
        })
    }
}

async fn run_blocking<T, F>(f: F) -> RepositoryResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> RepositoryResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| RepositoryError::Initialization {
            message: format!("blocking task failed: {err}"),
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::models::{Conversation, ConversationMode, Message, ModelId};

    fn repo_in(dir: &tempfile::TempDir) -> JsonFileRepository {
        JsonFileRepository::with_path(dir.path().join("history.json"))
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo_in(&dir);
        assert!(repo.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo_in(&dir);

        let mut conversation = Conversation::new("عنوان", ModelId::Pro, ConversationMode::Chat);
        conversation.messages.push(Message::assistant_text("hi"));
        let id = conversation.id.clone();

        repo.save(vec![conversation]).await.unwrap();
        let loaded = repo.load().await.unwrap();

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, id);
        assert_eq!(loaded[0].title, "عنوان");
        assert_eq!(loaded[0].model, ModelId::Pro);
    }

    #[tokio::test]
    async fn malformed_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "{not json").unwrap();

        let repo = JsonFileRepository::with_path(path);
        assert!(repo.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo_in(&dir);

        repo.save(Vec::new()).await.unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["history.json".to_string()]);
    }
}
