use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::StreamExt;
use parking_lot::Mutex;
use tracing::debug;

use super::conversation::Message;
use super::conversations_store::ConversationsStore;
use crate::chat::repositories::{HistoryRepository, save_snapshot};
use crate::chat::services::{FragmentStream, GenerationError};

/// Tracks which conversations have a generation in flight and owns their
/// cancellation flags. The in-flight entry is the sole concurrency control
/// around sends; response text itself lives only in `ConversationsStore`.
pub struct StreamManager {
    streams: Mutex<HashMap<String, Arc<AtomicBool>>>,
}

impl StreamManager {
    pub fn new() -> Self {
        Self {
            streams: Mutex::new(HashMap::new()),
        }
    }

    /// Register a stream for a conversation and hand back a fresh, unset
    /// cancel flag. Returns `None` when a stream is already in flight.
    pub fn begin(&self, conversation_id: &str) -> Option<Arc<AtomicBool>> {
        let mut streams = self.streams.lock();
        if streams.contains_key(conversation_id) {
            return None;
        }
        let cancel = Arc::new(AtomicBool::new(false));
        streams.insert(conversation_id.to_string(), cancel.clone());
        Some(cancel)
    }

    pub fn is_streaming(&self, conversation_id: &str) -> bool {
        self.streams.lock().contains_key(conversation_id)
    }

    /// Cooperative stop: sets the cancel flag, which takes effect at the next
    /// fragment boundary. The underlying connection is not torn down.
    pub fn stop(&self, conversation_id: &str) {
        if let Some(cancel) = self.streams.lock().get(conversation_id) {
            cancel.store(true, Ordering::Relaxed);
            debug!(conversation_id, "stop requested");
        }
    }

    pub fn stop_all(&self) {
        for cancel in self.streams.lock().values() {
            cancel.store(true, Ordering::Relaxed);
        }
    }

    pub fn finish(&self, conversation_id: &str) {
        self.streams.lock().remove(conversation_id);
    }
}

impl Default for StreamManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Fold a finite fragment stream into the trailing assistant message of one
/// conversation.
///
/// Strictly sequential: each fragment is appended to a local accumulator and
/// the last message is replaced wholesale with the accumulated text, so no
/// torn intermediate state is ever visible. The cancel flag is checked before
/// applying each fragment; once observed, the loop stops and already-applied
/// fragments stay. The snapshot is persisted after every applied fragment.
///
/// Returns the final accumulated text. On a fragment-level error the trailing
/// message becomes the given error text with `isError` set, and the error is
/// returned without retrying.
pub async fn merge_fragments(
    store: &Mutex<ConversationsStore>,
    repo: &dyn HistoryRepository,
    conversation_id: &str,
    mut fragments: FragmentStream,
    cancel: &AtomicBool,
    error_text: impl Fn(&GenerationError) -> &'static str,
) -> Result<String, GenerationError> {
    let mut accumulated = String::new();

    while let Some(next) = fragments.next().await {
        if cancel.load(Ordering::Relaxed) {
            debug!(conversation_id, "stream cancelled");
            break;
        }

        match next {
            Ok(fragment) => {
                accumulated.push_str(&fragment);
                apply_last_message(
                    store,
                    conversation_id,
                    Message::assistant_text(accumulated.clone()),
                );
                save_snapshot(repo, store).await;
            }
            Err(err) => {
                apply_last_message(store, conversation_id, Message::error(error_text(&err)));
                save_snapshot(repo, store).await;
                return Err(err);
            }
        }
    }

    Ok(accumulated)
}

fn apply_last_message(store: &Mutex<ConversationsStore>, conversation_id: &str, message: Message) {
    let mut store = store.lock();
    if let Some(conversation) = store.get_mut(conversation_id) {
        conversation.replace_last_message(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::constants::CONNECTION_ERROR_MESSAGE;
    use crate::chat::models::conversation::{Conversation, ConversationMode, ModelId, Part};
    use crate::chat::repositories::InMemoryHistoryRepository;

    fn store_with_placeholder() -> (Mutex<ConversationsStore>, String) {
        let mut conversation = Conversation::new("t", ModelId::Flash, ConversationMode::Chat);
        conversation.messages.push(Message::user(vec![Part::text("hi")]));
        conversation.messages.push(Message::assistant_placeholder());
        let id = conversation.id.clone();
        let mut store = ConversationsStore::new();
        store.add_front(conversation);
        (Mutex::new(store), id)
    }

    fn fragments(items: Vec<Result<&'static str, GenerationError>>) -> FragmentStream {
        Box::pin(futures::stream::iter(
            items.into_iter().map(|r| r.map(str::to_string)),
        ))
    }

    #[tokio::test]
    async fn fragments_concatenate_in_order() {
        let (store, id) = store_with_placeholder();
        let repo = InMemoryHistoryRepository::new();
        let cancel = AtomicBool::new(false);

        let text = merge_fragments(
            &store,
            &repo,
            &id,
            fragments(vec![Ok("Hi"), Ok(" there")]),
            &cancel,
            |_| CONNECTION_ERROR_MESSAGE,
        )
        .await
        .unwrap();

        assert_eq!(text, "Hi there");
        let store = store.lock();
        let last = store.get(&id).unwrap().last_message().unwrap();
        assert_eq!(last.first_text(), Some("Hi there"));
        assert!(last.is_error.is_none());
    }

    #[tokio::test]
    async fn persists_after_every_applied_fragment() {
        let (store, id) = store_with_placeholder();
        let repo = InMemoryHistoryRepository::new();
        let cancel = AtomicBool::new(false);

        merge_fragments(
            &store,
            &repo,
            &id,
            fragments(vec![Ok("a"), Ok("b"), Ok("c")]),
            &cancel,
            |_| CONNECTION_ERROR_MESSAGE,
        )
        .await
        .unwrap();

        assert_eq!(repo.save_count(), 3);
        let stored = repo.stored();
        assert_eq!(stored[0].last_message().unwrap().first_text(), Some("abc"));
    }

    #[tokio::test]
    async fn preset_cancel_flag_applies_nothing() {
        let (store, id) = store_with_placeholder();
        let repo = InMemoryHistoryRepository::new();
        let cancel = AtomicBool::new(true);

        let text = merge_fragments(
            &store,
            &repo,
            &id,
            fragments(vec![Ok("never")]),
            &cancel,
            |_| CONNECTION_ERROR_MESSAGE,
        )
        .await
        .unwrap();

        assert_eq!(text, "");
        let store = store.lock();
        assert_eq!(
            store.get(&id).unwrap().last_message().unwrap().first_text(),
            Some("")
        );
    }

    #[tokio::test]
    async fn fragment_error_replaces_trailing_message() {
        let (store, id) = store_with_placeholder();
        let repo = InMemoryHistoryRepository::new();
        let cancel = AtomicBool::new(false);

        let result = merge_fragments(
            &store,
            &repo,
            &id,
            fragments(vec![Ok("partial"), Err(GenerationError::Stream("boom".into()))]),
            &cancel,
            |_| CONNECTION_ERROR_MESSAGE,
        )
        .await;

        assert!(result.is_err());
        let store = store.lock();
        let last = store.get(&id).unwrap().last_message().unwrap();
        assert_eq!(last.first_text(), Some(CONNECTION_ERROR_MESSAGE));
        assert_eq!(last.is_error, Some(true));
    }

    #[test]
    fn begin_guards_double_streams() {
        let manager = StreamManager::new();
        let first = manager.begin("c1");
        assert!(first.is_some());
        assert!(manager.begin("c1").is_none());
        assert!(manager.is_streaming("c1"));

        manager.finish("c1");
        assert!(!manager.is_streaming("c1"));
        assert!(manager.begin("c1").is_some());
    }

    #[test]
    fn stop_sets_the_flag() {
        let manager = StreamManager::new();
        let cancel = manager.begin("c1").unwrap();
        manager.stop("c1");
        assert!(cancel.load(Ordering::Relaxed));
    }
}
