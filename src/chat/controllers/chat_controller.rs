use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::chat::constants::{
    CONNECTION_ERROR_MESSAGE, IMAGE_ONLY_PROMPT, IMAGE_ONLY_TITLE, MANIFEST_PARSE_ERROR_MESSAGE,
    MANIFEST_READY_MESSAGE, MISSING_KEY_MESSAGE, NEW_CONVERSATION_TITLE, PROVISIONAL_TITLE_CHARS,
    SYSTEM_PROMPT,
};
use crate::chat::models::{
    Conversation, ConversationMode, ConversationsStore, InlineData, Message, ModelId, Part,
    StreamManager,
};
use crate::chat::models::stream_manager::merge_fragments;
use crate::chat::repositories::{HistoryRepository, save_snapshot};
use crate::chat::services::{GenerationClient, GenerationError, ManifestFile};
use crate::chat::services::title_generator::truncate_text;

/// Result of one send operation.
pub struct SendOutcome {
    pub conversation_id: String,
    /// Whether this send created the conversation it went into.
    pub created_conversation: bool,
    /// Final accumulated assistant text; empty on failure or when cancelled
    /// before the first fragment.
    pub response_text: String,
    /// Builder mode only: the generated manifest, handed back for packaging.
    pub manifest: Option<Vec<ManifestFile>>,
    /// Set when the generation failed; the failure is already recorded as an
    /// error message inside the conversation.
    pub error: Option<GenerationError>,
}

/// Owns conversation lifecycle: creation, selection, deletion, renaming, and
/// the message-send protocol. Sole writer of the conversation store; every
/// mutation is followed by a full-snapshot write through the repository.
pub struct ChatController {
    store: Arc<Mutex<ConversationsStore>>,
    repo: Arc<dyn HistoryRepository>,
    client: Arc<dyn GenerationClient>,
    streams: Arc<StreamManager>,
}

impl ChatController {
    /// Build the controller, reading the persisted history once. A repository
    /// read failure starts with an empty store rather than failing startup.
    pub async fn load(client: Arc<dyn GenerationClient>, repo: Arc<dyn HistoryRepository>) -> Self {
        let conversations = match repo.load().await {
            Ok(conversations) => conversations,
            Err(err) => {
                warn!(error = %err, "failed to load history, starting empty");
                Vec::new()
            }
        };
        info!(count = conversations.len(), "loaded conversation history");

        Self {
            store: Arc::new(Mutex::new(ConversationsStore::from_snapshot(conversations))),
            repo,
            client,
            streams: Arc::new(StreamManager::new()),
        }
    }

    /// Explicitly create (and activate) a new conversation.
    pub async fn new_conversation(&self, model: ModelId, mode: ConversationMode) -> String {
        let conversation = Conversation::new(NEW_CONVERSATION_TITLE, model, mode);
        let id = conversation.id.clone();
        self.store.lock().add_front(conversation);
        self.persist().await;
        id
    }

    /// Send one message into the active conversation, creating one if needed.
    ///
    /// Returns `None` when the send is a no-op: nothing to send (no trimmed
    /// text and no image) or a generation already in flight for the target
    /// conversation. Generation failures do not propagate; they are recorded
    /// in the conversation and reported through [`SendOutcome::error`].
    pub async fn send_message(
        &self,
        text: &str,
        image: Option<InlineData>,
        model: ModelId,
    ) -> Option<SendOutcome> {
        let trimmed = text.trim();
        if trimmed.is_empty() && image.is_none() {
            return None;
        }

        // Resolve the target conversation, creating one when no usable
        // active conversation exists.
        let (conversation_id, created) = {
            let mut store = self.store.lock();
            let existing = store
                .active_id()
                .filter(|id| store.contains(id))
                .map(str::to_string);

            match existing {
                Some(id) => (id, false),
                None => {
                    let title = if trimmed.is_empty() {
                        IMAGE_ONLY_TITLE.to_string()
                    } else {
                        truncate_text(trimmed, PROVISIONAL_TITLE_CHARS)
                    };
                    let conversation = Conversation::new(title, model, ConversationMode::Chat);
                    let id = conversation.id.clone();
                    store.add_front(conversation);
                    (id, true)
                }
            }
        };

        let Some(cancel) = self.streams.begin(&conversation_id) else {
            debug!(conversation_id, "send ignored, generation already in flight");
            return None;
        };

        // Image part first, then text, preserving the original part order.
        let mut user_parts = Vec::new();
        if let Some(image) = image {
            user_parts.push(Part::Inline { inline_data: image });
        }
        if !trimmed.is_empty() {
            user_parts.push(Part::text(text));
        }

        // Append the user message and the assistant placeholder in one store
        // update, then snapshot.
        let appended = {
            let mut store = self.store.lock();
            store.get_mut(&conversation_id).map(|conversation| {
                // History for the generation call excludes the two messages
                // appended here, so the model never sees its own placeholder.
                let history = conversation.messages.clone();
                conversation.messages.push(Message::user(user_parts.clone()));
                conversation.messages.push(Message::assistant_placeholder());
                (history, conversation.mode, conversation.model)
            })
        };
        let Some((history, mode, conversation_model)) = appended else {
            self.streams.finish(&conversation_id);
            return None;
        };
        self.persist().await;

        let (response_text, manifest, error) = match mode {
            ConversationMode::Chat => {
                let outcome = self
                    .run_chat_turn(&conversation_id, &history, &user_parts, conversation_model, &cancel)
                    .await;
                match outcome {
                    Ok(text) => (text, None, None),
                    Err(err) => (String::new(), None, Some(err)),
                }
            }
            ConversationMode::Builder => {
                match self
                    .run_builder_turn(&conversation_id, trimmed, conversation_model)
                    .await
                {
                    Ok(manifest) => (MANIFEST_READY_MESSAGE.to_string(), Some(manifest), None),
                    Err(err) => (String::new(), None, Some(err)),
                }
            }
        };

        self.streams.finish(&conversation_id);

        // Auto-title a conversation this send created, off the hot path. A
        // failure keeps the provisional title and is never surfaced.
        if created && !response_text.is_empty() {
            let user_prompt = if trimmed.is_empty() {
                IMAGE_ONLY_PROMPT.to_string()
            } else {
                trimmed.to_string()
            };
            self.spawn_auto_title(conversation_id.clone(), user_prompt, response_text.clone());
        }

        Some(SendOutcome {
            conversation_id,
            created_conversation: created,
            response_text,
            manifest,
            error,
        })
    }

    async fn run_chat_turn(
        &self,
        conversation_id: &str,
        history: &[Message],
        user_parts: &[Part],
        model: ModelId,
        cancel: &std::sync::atomic::AtomicBool,
    ) -> Result<String, GenerationError> {
        let fragments = match self
            .client
            .stream_reply(SYSTEM_PROMPT, history, user_parts, model)
            .await
        {
            Ok(fragments) => fragments,
            Err(err) => {
                self.record_failure(conversation_id, &err).await;
                return Err(err);
            }
        };

        merge_fragments(
            &self.store,
            self.repo.as_ref(),
            conversation_id,
            fragments,
            cancel,
            error_message_for,
        )
        .await
    }

    async fn run_builder_turn(
        &self,
        conversation_id: &str,
        description: &str,
        model: ModelId,
    ) -> Result<Vec<ManifestFile>, GenerationError> {
        match self.client.generate_project_manifest(description, model).await {
            Ok(manifest) => {
                {
                    let mut store = self.store.lock();
                    if let Some(conversation) = store.get_mut(conversation_id) {
                        conversation
                            .replace_last_message(Message::assistant_text(MANIFEST_READY_MESSAGE));
                    }
                }
                self.persist().await;
                info!(conversation_id, files = manifest.len(), "project manifest generated");
                Ok(manifest)
            }
            Err(err) => {
                self.record_failure(conversation_id, &err).await;
                Err(err)
            }
        }
    }

    /// Replace the assistant placeholder with the localized error message.
    async fn record_failure(&self, conversation_id: &str, err: &GenerationError) {
        warn!(conversation_id, error = %err, "generation failed");
        {
            let mut store = self.store.lock();
            if let Some(conversation) = store.get_mut(conversation_id) {
                conversation.replace_last_message(Message::error(error_message_for(err)));
            }
        }
        self.persist().await;
    }

    fn spawn_auto_title(&self, conversation_id: String, user_prompt: String, response: String) {
        let client = self.client.clone();
        let store = self.store.clone();
        let repo = self.repo.clone();

        tokio::spawn(async move {
            match client.generate_title(&user_prompt, &response).await {
                Ok(title) if !title.trim().is_empty() => {
                    debug!(conversation_id, title, "auto-generated title");
                    store.lock().rename(&conversation_id, &title);
                    save_snapshot(repo.as_ref(), &store).await;
                }
                Ok(_) => debug!(conversation_id, "auto-title came back empty, keeping provisional"),
                Err(err) => {
                    debug!(conversation_id, error = %err, "auto-title failed, keeping provisional");
                }
            }
        });
    }

    /// Request cooperative cancellation of an in-flight generation.
    pub fn stop_generating(&self, conversation_id: &str) {
        self.streams.stop(conversation_id);
    }

    pub fn stop_all(&self) {
        self.streams.stop_all();
    }

    pub fn is_generating(&self, conversation_id: &str) -> bool {
        self.streams.is_streaming(conversation_id)
    }

    pub fn select_conversation(&self, id: &str) -> bool {
        self.store.lock().set_active(id)
    }

    pub async fn delete_conversation(&self, id: &str) -> bool {
        let removed = self.store.lock().delete(id);
        if removed {
            self.persist().await;
        }
        removed
    }

    pub async fn rename_conversation(&self, id: &str, title: &str) -> bool {
        let renamed = self.store.lock().rename(id, title);
        if renamed {
            self.persist().await;
        }
        renamed
    }

    /// Truncate the active conversation's messages.
    pub async fn clear_active_chat(&self) -> bool {
        let cleared = {
            let mut store = self.store.lock();
            match store.active_id().map(str::to_string) {
                Some(id) => store.clear_messages(&id),
                None => false,
            }
        };
        if cleared {
            self.persist().await;
        }
        cleared
    }

    pub fn active_id(&self) -> Option<String> {
        self.store.lock().active_id().map(str::to_string)
    }

    pub fn active_conversation(&self) -> Option<Conversation> {
        self.store.lock().active().cloned()
    }

    pub fn conversations(&self) -> Vec<Conversation> {
        self.store.lock().snapshot()
    }

    async fn persist(&self) {
        save_snapshot(self.repo.as_ref(), &self.store).await;
    }
}

/// Localized in-conversation message for a failed generation.
fn error_message_for(err: &GenerationError) -> &'static str {
    match err {
        GenerationError::MissingApiKey => MISSING_KEY_MESSAGE,
        GenerationError::ManifestParse(_) => MANIFEST_PARSE_ERROR_MESSAGE,
        _ => CONNECTION_ERROR_MESSAGE,
    }
}
