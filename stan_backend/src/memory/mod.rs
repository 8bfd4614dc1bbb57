pub mod extractor;

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A persisted fact about a user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FactRecord {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

/// A fact whose stored value changed during this request. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contradiction {
    pub key: String,
    pub old: String,
    pub new: String,
}

/// Storage interface for per-user facts.
///
/// Implementations must keep at most one value per `(user_id, key)` and make
/// `upsert` atomic: the prior value it returns is the one it replaced.
pub trait FactStore: Send + Sync {
    fn get(&self, user_id: &str, key: &str) -> Result<Option<String>>;
    fn get_all(&self, user_id: &str) -> Result<BTreeMap<String, String>>;
    /// Write `value` and return the value it replaced, if any.
    fn upsert(&self, user_id: &str, key: &str, value: &str) -> Result<Option<String>>;
    fn list_records(&self, user_id: &str) -> Result<Vec<FactRecord>>;
}

/// Render facts as `key: value` pairs joined by commas.
pub fn render_facts(facts: &BTreeMap<String, String>) -> String {
    facts
        .iter()
        .map(|(key, value)| format!("{}: {}", key, value))
        .collect::<Vec<_>>()
        .join(", ")
}
