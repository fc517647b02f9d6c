//! In-process conversation store.
//!
//! Maps conversation id to an ordered message list under a concurrent map:
//! coarse locking at the list level, no global lock. State is process-local
//! and lost on restart; persistence is an acknowledged non-goal.

use dashmap::DashMap;

use crate::models::ChatMessage;

#[derive(Default)]
pub struct ConversationStore {
    conversations: DashMap<String, Vec<ChatMessage>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to its conversation, creating the conversation on
    /// first use.
    pub fn add_message(&self, message: ChatMessage) {
        self.conversations
            .entry(message.conversation_id.clone())
            .or_default()
            .push(message);
    }

    /// Snapshot of a conversation's history in insertion order. Appends
    /// racing with this read are not observed by it.
    pub fn history(&self, conversation_id: &str) -> Vec<ChatMessage> {
        self.conversations
            .get(conversation_id)
            .map(|messages| messages.value().clone())
            .unwrap_or_default()
    }

    /// Remove a conversation entirely. Returns whether it existed.
    pub fn clear(&self, conversation_id: &str) -> bool {
        self.conversations.remove(conversation_id).is_some()
    }

    pub fn conversation_ids(&self) -> Vec<String> {
        self.conversations
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.conversations.len()
    }
}
