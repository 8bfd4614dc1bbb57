use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    // LLM configuration (OpenAI-compatible: OpenRouter, Ollama, vLLM, OpenAI, etc.)
    #[serde(default = "default_llm_url")]
    pub llm_api_url: String,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    #[serde(default)]
    pub llm_api_key: Option<String>,

    // OpenRouter attribution headers
    #[serde(default = "default_http_referer")]
    pub http_referer: String,
    #[serde(default = "default_app_title")]
    pub app_title: String,

    // Persona
    #[serde(default = "default_persona_name")]
    pub persona_name: String,

    // Generation
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub extraction_temperature: f32,
    #[serde(default = "default_reply_temperature")]
    pub reply_temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    // Server and storage
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

fn default_llm_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_llm_model() -> String {
    "openai/gpt-4o-mini".to_string()
}

fn default_http_referer() -> String {
    "http://localhost".to_string()
}

fn default_app_title() -> String {
    "stan-bot".to_string()
}

fn default_persona_name() -> String {
    "Stan".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_reply_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    512
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_database_path() -> String {
    "stan_memory.db".to_string()
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            llm_api_url: default_llm_url(),
            llm_model: default_llm_model(),
            llm_api_key: None,
            http_referer: default_http_referer(),
            app_title: default_app_title(),
            persona_name: default_persona_name(),
            request_timeout_secs: default_request_timeout_secs(),
            extraction_temperature: 0.0,
            reply_temperature: default_reply_temperature(),
            max_tokens: default_max_tokens(),
            bind_addr: default_bind_addr(),
            database_path: default_database_path(),
        }
    }
}

impl BotConfig {
    /// Get the directory containing the executable
    fn get_base_dir() -> PathBuf {
        match std::env::current_exe() {
            Ok(exe_path) => exe_path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".")),
            Err(_) => PathBuf::from("."),
        }
    }

    /// Get the path to the config file (relative to executable)
    pub fn config_path() -> PathBuf {
        Self::get_base_dir().join("stan_config.toml")
    }

    /// Load config from stan_config.toml (next to executable), then apply env overrides.
    pub fn load() -> Self {
        let mut config = Self::load_from(&Self::config_path()).unwrap_or_else(|| {
            tracing::warn!("No config file found, using defaults + env vars");
            Self::default()
        });
        config.apply_env(|name| env::var(name).ok());
        config
    }

    fn load_from(path: &Path) -> Option<Self> {
        let contents = fs::read_to_string(path).ok()?;
        match toml::from_str::<BotConfig>(&contents) {
            Ok(config) => {
                tracing::info!("Loaded config from {:?}", path);
                Some(config)
            }
            Err(e) => {
                tracing::error!("Failed to parse {:?}: {}", path, e);
                None
            }
        }
    }

    /// Save config to file (next to executable)
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        let toml_string = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, toml_string)
            .with_context(|| format!("Failed to write config to {:?}", path))?;

        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(url) = non_empty("LLM_API_URL") {
            self.llm_api_url = url;
        }

        if let Some(model) = non_empty("LLM_MODEL").or_else(|| non_empty("MODEL")) {
            self.llm_model = model;
        }

        if let Some(key) = non_empty("OPENROUTER_API_KEY").or_else(|| non_empty("LLM_API_KEY")) {
            self.llm_api_key = Some(key);
        }

        if let Some(referer) = non_empty("STAN_HTTP_REFERER") {
            self.http_referer = referer;
        }

        if let Some(title) = non_empty("STAN_APP_TITLE") {
            self.app_title = title;
        }

        if let Some(name) = non_empty("STAN_PERSONA_NAME") {
            self.persona_name = name;
        }

        if let Some(timeout) = non_empty("STAN_LLM_TIMEOUT_SECS") {
            if let Ok(seconds) = timeout.trim().parse() {
                self.request_timeout_secs = seconds;
            }
        }

        if let Some(bind) = non_empty("STAN_BIND") {
            self.bind_addr = bind;
        } else if let Some(port) = non_empty("PORT") {
            if let Ok(port) = port.trim().parse::<u16>() {
                self.bind_addr = format!("0.0.0.0:{}", port);
            }
        }

        if let Some(path) = non_empty("STAN_DATABASE_PATH") {
            self.database_path = path;
        }
    }
}
