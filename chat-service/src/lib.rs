//! Chat orchestrator: receives natural-language messages, consults a local
//! LLM endpoint with a tool catalog, dispatches requested tool calls to the
//! operations service, and folds the results back into the conversation.

pub mod api;
pub mod chat;
pub mod config;
pub mod error;
pub mod home;
pub mod mcp_client;
pub mod models;
pub mod ollama;
pub mod store;
