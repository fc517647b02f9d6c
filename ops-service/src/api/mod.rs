//! HTTP surface of the operations service.

pub mod handlers;
pub mod routes;

use std::sync::Arc;

use crate::config::Config;

pub use routes::create_router;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}
