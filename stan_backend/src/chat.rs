use std::sync::Arc;

use anyhow::{Context, Result};

use crate::ambiguity::is_ambiguous;
use crate::config::BotConfig;
use crate::llm_client::ChatModel;
use crate::memory::extractor::FactExtractor;
use crate::memory::FactStore;
use crate::recall::unknown_fact_reply;
use crate::reply::ReplyComposer;
use crate::tone::detect_tone;

/// Per-message pipeline: extract facts, reload the store, compose a reply.
pub struct ChatService {
    store: Arc<dyn FactStore>,
    extractor: FactExtractor,
    composer: ReplyComposer,
}

impl ChatService {
    pub fn new(config: &BotConfig, model: Arc<dyn ChatModel>, store: Arc<dyn FactStore>) -> Self {
        Self {
            extractor: FactExtractor::new(
                model.clone(),
                store.clone(),
                config.extraction_temperature,
            ),
            composer: ReplyComposer::new(
                model,
                config.persona_name.clone(),
                config.reply_temperature,
            ),
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn FactStore> {
        &self.store
    }

    /// Produce a reply for `message`. Remote-model failures are absorbed into the
    /// reply text; only storage failures surface as `Err`.
    pub async fn respond(&self, user_id: &str, message: &str) -> Result<String> {
        let extraction = self
            .extractor
            .extract(user_id, message)
            .await
            .context("Failed to reconcile extracted facts")?;

        let facts = self
            .store
            .get_all(user_id)
            .with_context(|| format!("Failed to load facts for user {}", user_id))?;

        if !is_ambiguous(message) {
            if let Some(reply) = unknown_fact_reply(message, &facts) {
                tracing::debug!("Answered recall question for user {} locally", user_id);
                return Ok(reply);
            }
        }

        let tone = detect_tone(message);
        tracing::debug!("Detected tone '{}' for user {}", tone.as_str(), user_id);

        Ok(self
            .composer
            .compose(message, &facts, &extraction.contradictions, tone)
            .await)
    }
}
