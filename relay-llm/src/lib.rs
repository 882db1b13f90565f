//! Relay LLM - conversation history and the completion client.
//!
//! ```text
//! question ─► CompletionClient ─► Provider (HTTP POST) ─► DeepSeek
//!                  │   ▲
//!                  ▼   │ context (last N turns)
//!               HistoryStore
//! ```
//!
//! The store is owned by the caller and lent to [`CompletionClient::complete`];
//! nothing in this crate holds global state.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod completion;
pub mod message;
pub mod provider;
pub mod session;

pub use completion::{CompletionClient, CompletionSettings, CONNECTIVITY_ERROR, GENERIC_ERROR};
pub use message::{Role, Turn};
pub use provider::{ChatRequest, ChatResponse, DeepSeekProvider, Provider, ProviderError, TokenUsage};
pub use session::{History, HistoryStore, CONTEXT_TURNS, MAX_STORED_TURNS};
