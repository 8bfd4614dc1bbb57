//! Test doubles shared by the unit tests.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::llm_client::{ChatModel, ChatOutcome, Message};
use crate::memory::{FactRecord, FactStore};

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<Message>,
    pub temperature: f32,
}

/// A `ChatModel` that replays queued outcomes and records every call.
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<ChatOutcome>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<Result<ChatOutcome>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn chat(&self, messages: Vec<Message>, temperature: f32) -> Result<ChatOutcome> {
        self.calls.lock().unwrap().push(RecordedCall {
            messages,
            temperature,
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow!("no scripted response left")))
    }
}

/// A store whose every operation fails, standing in for an unavailable database.
pub struct UnavailableStore;

impl FactStore for UnavailableStore {
    fn get(&self, _user_id: &str, _key: &str) -> Result<Option<String>> {
        Err(anyhow!("fact store unavailable"))
    }

    fn get_all(&self, _user_id: &str) -> Result<BTreeMap<String, String>> {
        Err(anyhow!("fact store unavailable"))
    }

    fn upsert(&self, _user_id: &str, _key: &str, _value: &str) -> Result<Option<String>> {
        Err(anyhow!("fact store unavailable"))
    }

    fn list_records(&self, _user_id: &str) -> Result<Vec<FactRecord>> {
        Err(anyhow!("fact store unavailable"))
    }
}
