//! Turns a free-text message into stored facts.
//!
//! The remote model proposes `{key: value}` pairs; each one is reconciled against
//! the store and a [`Contradiction`] is recorded when a stored value changes.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde_json::{Map, Value};

use crate::ambiguity::is_ambiguous;
use crate::llm_client::{parse_json, ChatModel, ChatOutcome, Message};

use super::{Contradiction, FactStore};

const EXTRACTION_PROMPT: &str = concat!(
    "You extract durable personal facts from a single chat message.\n",
    "Only extract facts the user states clearly and unambiguously about themselves.\n",
    "Use short snake_case keys. Prefer these when they fit: name, favorite_color, ",
    "location, pet, hobby, age, job, favorite_food.\n",
    "Values must be short strings.\n",
    "Respond with ONLY a JSON object, for example {\"name\": \"Kia\"}.\n",
    "If the message contains no such facts, respond with {}."
);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub facts: BTreeMap<String, String>,
    pub contradictions: Vec<Contradiction>,
}

pub struct FactExtractor {
    model: Arc<dyn ChatModel>,
    store: Arc<dyn FactStore>,
    temperature: f32,
}

impl FactExtractor {
    pub fn new(model: Arc<dyn ChatModel>, store: Arc<dyn FactStore>, temperature: f32) -> Self {
        Self {
            model,
            store,
            temperature,
        }
    }

    /// Extract facts from `message` and merge them into the user's store.
    ///
    /// Remote failures degrade to an empty extraction; only store errors propagate.
    pub async fn extract(&self, user_id: &str, message: &str) -> Result<Extraction> {
        if is_ambiguous(message) {
            tracing::debug!("Skipping fact extraction for ambiguous message");
            return Ok(Extraction::default());
        }

        let facts = match self.request_facts(message).await {
            Ok(facts) => facts,
            Err(error) => {
                tracing::warn!("Fact extraction failed, continuing without facts: {:#}", error);
                return Ok(Extraction::default());
            }
        };

        let contradictions = reconcile(self.store.as_ref(), user_id, &facts)?;
        if !facts.is_empty() {
            tracing::info!(
                "Extracted {} fact(s) for user {} ({} contradiction(s))",
                facts.len(),
                user_id,
                contradictions.len()
            );
        }

        Ok(Extraction {
            facts,
            contradictions,
        })
    }

    /// Ask the model for facts. Any non-success outcome is an error here; an
    /// unparsable body is treated as "no facts".
    pub async fn request_facts(&self, message: &str) -> Result<BTreeMap<String, String>> {
        let messages = vec![Message::system(EXTRACTION_PROMPT), Message::user(message)];

        match self.model.chat(messages, self.temperature).await? {
            ChatOutcome::Success(text) => Ok(parse_facts(&text)),
            ChatOutcome::ProviderError(error) => Err(anyhow!("provider error: {}", error)),
            ChatOutcome::Malformed => Err(anyhow!("provider returned no usable content")),
        }
    }
}

/// Parse the model's answer into normalized facts. Never fails.
pub fn parse_facts(response: &str) -> BTreeMap<String, String> {
    let object = match parse_json::<Map<String, Value>>(response) {
        Ok(object) => object,
        Err(error) => {
            tracing::debug!("Extraction output was not a JSON object: {:#}", error);
            return BTreeMap::new();
        }
    };

    object
        .into_iter()
        .filter_map(|(key, value)| {
            let key = key.trim().to_lowercase();
            let value = match value {
                Value::String(text) => text.trim().to_string(),
                Value::Number(number) => number.to_string(),
                Value::Bool(flag) => flag.to_string(),
                _ => return None,
            };
            (!key.is_empty() && !value.is_empty()).then_some((key, value))
        })
        .collect()
}

/// Write each fact to the store, reporting the ones whose stored value changed.
pub fn reconcile(
    store: &dyn FactStore,
    user_id: &str,
    facts: &BTreeMap<String, String>,
) -> Result<Vec<Contradiction>> {
    let mut contradictions = Vec::new();
    for (key, value) in facts {
        match store.upsert(user_id, key, value)? {
            Some(old) if old != *value => {
                tracing::info!("Fact '{}' for user {} changed: {} -> {}", key, user_id, old, value);
                contradictions.push(Contradiction {
                    key: key.clone(),
                    old,
                    new: value.clone(),
                });
            }
            _ => {}
        }
    }
    Ok(contradictions)
}
