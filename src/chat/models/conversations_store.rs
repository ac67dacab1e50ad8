use super::conversation::Conversation;

/// Ordered store of all conversations, newest first. Source of truth for chat
/// state; at most one conversation is active at a time.
pub struct ConversationsStore {
    conversations: Vec<Conversation>,
    active_id: Option<String>,
}

impl ConversationsStore {
    pub fn new() -> Self {
        Self {
            conversations: Vec::new(),
            active_id: None,
        }
    }

    /// Rebuild from a persisted snapshot. The first conversation becomes active.
    pub fn from_snapshot(conversations: Vec<Conversation>) -> Self {
        let active_id = conversations.first().map(|c| c.id.clone());
        Self {
            conversations,
            active_id,
        }
    }

    /// Full ordered copy for persistence.
    pub fn snapshot(&self) -> Vec<Conversation> {
        self.conversations.clone()
    }

    /// Insert at the front and make it the active conversation.
    pub fn add_front(&mut self, conversation: Conversation) {
        self.active_id = Some(conversation.id.clone());
        self.conversations.insert(0, conversation);
    }

    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.conversations.iter().any(|c| c.id == id)
    }

    /// Delete a conversation. Deleting the active one selects the first
    /// remaining conversation, or none when the store becomes empty.
    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.conversations.len();
        self.conversations.retain(|c| c.id != id);
        let removed = self.conversations.len() != before;

        if removed && self.active_id.as_deref() == Some(id) {
            self.active_id = self.conversations.first().map(|c| c.id.clone());
        }

        removed
    }

    pub fn set_active(&mut self, id: &str) -> bool {
        if self.contains(id) {
            self.active_id = Some(id.to_string());
            true
        } else {
            false
        }
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn active(&self) -> Option<&Conversation> {
        self.active_id.as_deref().and_then(|id| self.get(id))
    }

    /// Rename a conversation. A title that trims to empty is ignored and the
    /// prior title stays.
    pub fn rename(&mut self, id: &str, title: &str) -> bool {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return false;
        }
        match self.get_mut(id) {
            Some(conversation) => {
                conversation.title = trimmed.to_string();
                true
            }
            None => false,
        }
    }

    /// Truncate a conversation's messages, keeping the record itself.
    pub fn clear_messages(&mut self, id: &str) -> bool {
        match self.get_mut(id) {
            Some(conversation) => {
                conversation.messages.clear();
                true
            }
            None => false,
        }
    }

    pub fn list(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn count(&self) -> usize {
        self.conversations.len()
    }
}

impl Default for ConversationsStore {
    fn default() -> Self {
        Self::new()
    }
}
