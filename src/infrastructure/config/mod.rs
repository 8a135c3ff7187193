//! Layered application configuration.
//!
//! Defaults first, then an optional `dataanyone.toml`, then `DATAANYONE_*`
//! environment variables (double underscore separates sections, e.g.
//! `DATAANYONE_SERVER__PORT`). Each layer overrides the previous one.

use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::{LLMConfig, GEMINI_BASE_URL};
use crate::infrastructure::db::ExecutorConfig;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "dataanyone.toml";
pub const ENV_PREFIX: &str = "DATAANYONE_";

/// API key fallback shared with the original deployment scripts.
const API_KEY_ENV_FALLBACK: &str = "GOOGLE_LLM_API_KEY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub llm: LlmSettings,
    pub database: DatabaseSettings,
    pub prompt: PromptSettings,
    pub store: StoreSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub generation_model: String,
    pub summarization_model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: GEMINI_BASE_URL.to_string(),
            api_key: None,
            generation_model: "gemini-2.5-flash-lite".to_string(),
            summarization_model: "gemini-2.5-flash".to_string(),
            temperature: 0.5,
            max_output_tokens: 2048,
            timeout_secs: 60,
        }
    }
}

/// Warehouse connection. `url` absent means the service runs in
/// generation-only mode: SQL is produced and returned but never executed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
    pub query_timeout_secs: u64,
    pub max_rows: usize,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
            connect_timeout_secs: 10,
            query_timeout_secs: 60,
            max_rows: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptSettings {
    pub schema_path: String,
    pub max_chars: usize,
    pub examples_k: usize,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            schema_path: crate::infrastructure::schema::DEFAULT_SCHEMA_PATH.to_string(),
            max_chars: crate::application::use_cases::prompt_builder::DEFAULT_MAX_PROMPT_CHARS,
            examples_k: crate::application::use_cases::example_selector::DEFAULT_K,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    pub path: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: crate::infrastructure::example_store::DEFAULT_STORE_PATH.to_string(),
        }
    }
}

pub fn load_config() -> Result<AppConfig> {
    let mut config: AppConfig = Figment::new()
        .merge(Serialized::defaults(AppConfig::default()))
        .merge(Toml::file(CONFIG_FILE))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| AppError::ConfigError(format!("Failed to load configuration: {}", e)))?;

    if config.llm.api_key.is_none() {
        config.llm.api_key = std::env::var(API_KEY_ENV_FALLBACK).ok();
    }

    Ok(config)
}

impl AppConfig {
    pub fn generation_llm(&self) -> LLMConfig {
        LLMConfig {
            base_url: self.llm.base_url.clone(),
            model: self.llm.generation_model.clone(),
            api_key: self.llm.api_key.clone(),
            max_output_tokens: Some(self.llm.max_output_tokens),
            temperature: Some(self.llm.temperature),
            timeout_secs: self.llm.timeout_secs,
        }
    }

    pub fn summarization_llm(&self) -> LLMConfig {
        LLMConfig {
            model: self.llm.summarization_model.clone(),
            ..self.generation_llm()
        }
    }

    pub fn executor(&self) -> ExecutorConfig {
        ExecutorConfig {
            max_connections: self.database.max_connections,
            connect_timeout_secs: self.database.connect_timeout_secs,
            query_timeout_secs: self.database.query_timeout_secs,
            idle_timeout_secs: ExecutorConfig::default().idle_timeout_secs,
            max_rows: self.database.max_rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_every_section() {
        let config = AppConfig::default();

        assert_eq!(config.server.port, 3001);
        assert_eq!(config.llm.generation_model, "gemini-2.5-flash-lite");
        assert_eq!(config.llm.summarization_model, "gemini-2.5-flash");
        assert!(config.database.url.is_none());
        assert_eq!(config.prompt.max_chars, 24_000);
        assert_eq!(config.store.path, "data/prompt/fewshots.json");
    }

    #[test]
    fn test_role_configs_split_models_and_share_key() {
        let mut config = AppConfig::default();
        config.llm.api_key = Some("secret".to_string());

        let generation = config.generation_llm();
        let summarization = config.summarization_llm();

        assert_eq!(generation.model, "gemini-2.5-flash-lite");
        assert_eq!(summarization.model, "gemini-2.5-flash");
        assert_eq!(generation.api_key.as_deref(), Some("secret"));
        assert_eq!(summarization.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn test_toml_fragment_overrides_defaults() {
        let config: AppConfig = Figment::new()
            .merge(Serialized::defaults(AppConfig::default()))
            .merge(Toml::string("[server]\nport = 9090\n[prompt]\nexamples_k = 2"))
            .extract()
            .unwrap();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.prompt.examples_k, 2);
        assert_eq!(config.server.host, "127.0.0.1");
    }
}
