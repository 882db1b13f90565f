//! Completion client: turns a question into an answer, with history.

use crate::message::Turn;
use crate::provider::{ChatRequest, Provider};
use crate::session::HistoryStore;
use relay_common::config::LlmConfig;
use relay_common::util::{sanitize_for_log, truncate_with_ellipsis};
use std::sync::Arc;

/// Reply shown when the completion endpoint cannot be reached.
pub const CONNECTIVITY_ERROR: &str = "❌ Ошибка соединения с API. Попробуйте позже.";

/// Reply shown for any other completion failure.
pub const GENERIC_ERROR: &str = "❌ Произошла непредвиденная ошибка.";

/// Fixed request parameters.
#[derive(Debug, Clone)]
pub struct CompletionSettings {
    pub model: String,
    pub system_prompt: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl From<&LlmConfig> for CompletionSettings {
    fn from(config: &LlmConfig) -> Self {
        Self {
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self::from(&LlmConfig::default())
    }
}

/// Sends questions to the provider with per-user context.
pub struct CompletionClient {
    provider: Arc<dyn Provider>,
    settings: CompletionSettings,
}

impl CompletionClient {
    pub fn new(provider: Arc<dyn Provider>, settings: CompletionSettings) -> Self {
        Self { provider, settings }
    }

    pub fn settings(&self) -> &CompletionSettings {
        &self.settings
    }

    /// Build the request for `question`: system prompt, recent context, question.
    pub fn build_request(&self, store: &HistoryStore, user_id: &str, question: &str) -> ChatRequest {
        let context = store.context(user_id);
        let mut messages = Vec::with_capacity(context.len() + 2);
        messages.push(Turn::system(self.settings.system_prompt.as_str()));
        messages.extend_from_slice(context);
        messages.push(Turn::user(question));

        ChatRequest {
            model: self.settings.model.clone(),
            messages,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            stream: false,
        }
    }

    /// Ask `question` on behalf of `user_id`.
    ///
    /// Always returns text for the user. On success the exchange is recorded
    /// in `store`; on failure `store` is left untouched and a fixed error
    /// message is returned.
    pub async fn complete(&self, store: &mut HistoryStore, user_id: &str, question: &str) -> String {
        store.get_or_create(user_id);
        let request = self.build_request(store, user_id, question);

        tracing::debug!(
            provider = %self.provider.name(),
            user_id = %user_id,
            context_turns = request.messages.len() - 2,
            question = %truncate_with_ellipsis(question, 80),
            "Sending completion request"
        );

        match self.provider.chat(&request).await {
            Ok(response) => {
                tracing::info!(
                    provider = %self.provider.name(),
                    user_id = %user_id,
                    latency_ms = response.latency_ms,
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    total_tokens = response.usage.total_tokens,
                    finish_reason = ?response.finish_reason,
                    "Completion received"
                );
                store.record_exchange(user_id, question, &response.content);
                response.content
            }
            Err(e) if e.is_transport() => {
                tracing::error!(
                    provider = %self.provider.name(),
                    user_id = %user_id,
                    error = %sanitize_for_log(&e.to_string()),
                    "API request error"
                );
                CONNECTIVITY_ERROR.to_string()
            }
            Err(e) => {
                tracing::error!(
                    provider = %self.provider.name(),
                    user_id = %user_id,
                    error = %sanitize_for_log(&e.to_string()),
                    "Unexpected completion error"
                );
                GENERIC_ERROR.to_string()
            }
        }
    }
}
