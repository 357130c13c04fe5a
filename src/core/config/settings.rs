//! Typed view over the merged YAML configuration.
//!
//! Every field has a default so an empty config file yields a working
//! setup (apart from the API key, which usually comes from the
//! environment or `secrets.yaml`).

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::errors::ApiError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub openai: OpenAiSettings,
    pub rag: RagSettings,
    pub chat: ChatSettings,
    pub database: DatabaseSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub api_key: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            cors_allowed_origins: Vec::new(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub chat_model: String,
    pub embedding_model: String,
    pub embedding_dimensions: usize,
    pub temperature: f64,
    pub request_timeout_secs: u64,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            api_key: None,
            chat_model: "gpt-4o".to_string(),
            embedding_model: "text-embedding-3-large".to_string(),
            embedding_dimensions: 1536,
            temperature: 0.0,
            request_timeout_secs: 30,
        }
    }
}

impl OpenAiSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    pub similarity_threshold: f32,
    pub max_sections: usize,
    pub reindex_on_model_change: bool,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.5,
            max_sections: 4,
            reindex_on_model_change: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    pub appointment_delay_ms: u64,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            appointment_delay_ms: 3000,
        }
    }
}

impl ChatSettings {
    pub fn appointment_delay(&self) -> Duration {
        Duration::from_millis(self.appointment_delay_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: Option<PathBuf>,
}

impl Settings {
    pub fn from_value(value: &Value) -> Result<Self, ApiError> {
        serde_json::from_value(value.clone())
            .map_err(|e| ApiError::BadRequest(format!("Invalid configuration: {}", e)))
    }

    /// Applies `OPENAI_API_KEY`, `OPENAI_BASE_URL` and `PORT`.
    pub fn apply_env_overrides(mut self) -> Self {
        if let Some(key) = non_empty_env("OPENAI_API_KEY") {
            self.openai.api_key = Some(key);
        }
        if let Some(url) = non_empty_env("OPENAI_BASE_URL") {
            self.openai.base_url = url;
        }
        if let Some(port) = non_empty_env("PORT").and_then(|v| v.parse::<u16>().ok()) {
            self.server.port = port;
        }
        self
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
