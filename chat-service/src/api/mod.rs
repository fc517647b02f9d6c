//! HTTP surface of the chat orchestrator.

pub mod handlers;
pub mod routes;

use std::sync::Arc;

use anyhow::Result;

use crate::chat::ChatService;
use crate::config::Config;
use crate::store::ConversationStore;

pub use routes::create_router;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatService>,
    pub store: Arc<ConversationStore>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let config = Arc::new(config);
        let store = Arc::new(ConversationStore::new());
        let chat = Arc::new(ChatService::new(store.clone(), config.clone())?);
        Ok(Self {
            chat,
            store,
            config,
        })
    }
}
