use std::sync::Arc;

use anyhow::{Context, Result};

use crate::chat::ChatService;
use crate::config::BotConfig;
use crate::database::FactDatabase;
use crate::llm_client::{ChatModel, LlmClient};
use crate::memory::FactStore;

pub struct BackendRuntime {
    pub config: BotConfig,
    pub chat: Arc<ChatService>,
}

pub struct BackendRuntimeBuilder {
    config: BotConfig,
    model: Option<Arc<dyn ChatModel>>,
    store: Option<Arc<dyn FactStore>>,
}

impl BackendRuntimeBuilder {
    pub fn new(config: BotConfig) -> Self {
        Self {
            config,
            model: None,
            store: None,
        }
    }

    pub fn with_model(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn FactStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> Result<BackendRuntime> {
        let config = self.config;

        let model = match self.model {
            Some(model) => model,
            None => {
                let client = LlmClient::from_config(&config)?;
                tracing::info!(
                    "LLM endpoint {} (model {})",
                    config.llm_api_url,
                    client.model()
                );
                if config.llm_api_key.is_none() {
                    tracing::warn!("No LLM API key configured; requests are sent unauthenticated");
                }
                Arc::new(client)
            }
        };

        let store = match self.store {
            Some(store) => store,
            None => {
                let db = FactDatabase::new(&config.database_path).with_context(|| {
                    format!("Failed to open fact database at '{}'", config.database_path)
                })?;
                tracing::info!("Fact store at {}", config.database_path);
                Arc::new(db)
            }
        };

        let chat = Arc::new(ChatService::new(&config, model, store));
        Ok(BackendRuntime { config, chat })
    }
}

impl BackendRuntime {
    pub fn bootstrap(config: BotConfig) -> Result<Self> {
        BackendRuntimeBuilder::new(config).build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedModel;

    #[test]
    fn builder_accepts_injected_collaborators() {
        let model = Arc::new(ScriptedModel::new(vec![]));
        let store = Arc::new(FactDatabase::open_in_memory().unwrap());
        store.upsert("u1", "name", "Kia").unwrap();

        let runtime = BackendRuntimeBuilder::new(BotConfig::default())
            .with_model(model)
            .with_store(store)
            .build()
            .unwrap();

        assert_eq!(
            runtime.chat.store().get("u1", "name").unwrap().as_deref(),
            Some("Kia")
        );
    }

    #[test]
    fn bootstrap_opens_configured_database() {
        let dir = tempfile::tempdir().unwrap();
        let config = BotConfig {
            database_path: dir.path().join("stan.db").to_string_lossy().to_string(),
            ..BotConfig::default()
        };

        let runtime = BackendRuntime::bootstrap(config).unwrap();
        assert!(runtime.chat.store().get_all("anyone").unwrap().is_empty());
        assert!(dir.path().join("stan.db").exists());
    }
}
