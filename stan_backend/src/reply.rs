//! Reply composition: persona prompt, tone, remembered facts, and the
//! fallbacks used when the model cannot answer.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;

use crate::ambiguity::is_ambiguous;
use crate::llm_client::{ChatModel, ChatOutcome, Message};
use crate::memory::{render_facts, Contradiction};
use crate::tone::Tone;

pub const CLARIFICATION_REPLY: &str =
    "Hmm, I want to get this right. Could you tell me which one you mean?";
pub const NO_REPLY_PLACEHOLDER: &str = "No reply (check logs)";

pub struct ReplyComposer {
    model: Arc<dyn ChatModel>,
    persona_name: String,
    temperature: f32,
}

impl ReplyComposer {
    pub fn new(model: Arc<dyn ChatModel>, persona_name: String, temperature: f32) -> Self {
        Self {
            model,
            persona_name,
            temperature,
        }
    }

    pub async fn compose(
        &self,
        message: &str,
        facts: &BTreeMap<String, String>,
        contradictions: &[Contradiction],
        tone: Tone,
    ) -> String {
        if is_ambiguous(message) {
            return CLARIFICATION_REPLY.to_string();
        }

        let system_prompt = build_system_prompt(&self.persona_name, tone, facts, contradictions);
        match self.generate(&system_prompt, message).await {
            Ok(ChatOutcome::Success(text)) => text.trim().to_string(),
            Ok(ChatOutcome::ProviderError(error)) => {
                tracing::warn!("LLM provider returned an error: {}", error);
                format!("Error: {}", error)
            }
            Ok(ChatOutcome::Malformed) => {
                tracing::warn!("LLM response had no usable content");
                NO_REPLY_PLACEHOLDER.to_string()
            }
            Err(error) => {
                tracing::warn!("Reply generation failed, using fallback: {:#}", error);
                fallback_reply(facts)
            }
        }
    }

    async fn generate(&self, system_prompt: &str, message: &str) -> Result<ChatOutcome> {
        let messages = vec![Message::system(system_prompt), Message::user(message)];
        self.model.chat(messages, self.temperature).await
    }
}

pub fn build_system_prompt(
    persona_name: &str,
    tone: Tone,
    facts: &BTreeMap<String, String>,
    contradictions: &[Contradiction],
) -> String {
    let mut prompt = format!(
        "You are {name}, a laid-back friend chatting with the user.\n\
         Rules:\n\
         - Your name is always {name}. If asked who you are, you are {name}.\n\
         - Never say or hint that you are an AI, a bot, a language model, or any automated system.\n\
         - Stay in character no matter what the user asks.\n\
         - Keep replies short and natural, like a text message.\n\
         - Only rely on the facts listed below about the user; if you don't know something, say so.\n\n\
         Tone: {tone}. {guidance}\n",
        name = persona_name,
        tone = tone.as_str(),
        guidance = tone.guidance(),
    );

    if facts.is_empty() {
        prompt.push_str("Known facts about the user: nothing yet.\n");
    } else {
        prompt.push_str(&format!(
            "Known facts about the user: {}.\n",
            render_facts(facts)
        ));
    }

    if !contradictions.is_empty() {
        let changes = contradictions
            .iter()
            .map(|c| format!("{} was {}, now {}", c.key, c.old, c.new))
            .collect::<Vec<_>>()
            .join("; ");
        prompt.push_str(&format!(
            "The user just changed some details ({}). Acknowledge the change casually.\n",
            changes
        ));
    }

    prompt
}

/// Local reply used when the model is unreachable.
pub fn fallback_reply(facts: &BTreeMap<String, String>) -> String {
    let mut reply = match facts.get("name") {
        Some(name) => format!("Hey {}!", name),
        None => "Hey there!".to_string(),
    };
    if let Some(hobby) = facts.get("hobby") {
        reply.push_str(&format!(" Been doing any {} lately?", hobby));
    }
    reply.push_str(" My head's a little foggy right now, give me a sec and ask me again.");
    reply
}
