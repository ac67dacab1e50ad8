pub mod conversation;
pub mod conversations_store;
pub mod stream_manager;

pub use conversation::{Conversation, ConversationMode, InlineData, Message, ModelId, Part, Role};
pub use conversations_store::ConversationsStore;
pub use stream_manager::StreamManager;
