use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Local,
    Memory,
}

#[derive(Clone, Copy, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackendKind {
    #[default]
    OpenAI,
    Hashed,
}

fn default_storage_kind() -> StorageKind {
    StorageKind::Local
}

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    #[serde(default)]
    pub openai_api_key: String,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_generation_model")]
    pub generation_model: String,
    #[serde(default = "default_fast_model")]
    pub fast_model: String,
    #[serde(default)]
    pub embedding_backend: EmbeddingBackendKind,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: u32,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_storage_kind")]
    pub storage: StorageKind,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_ingest_max_body_bytes")]
    pub ingest_max_body_bytes: usize,
    #[serde(default = "default_ingestion_queue_capacity")]
    pub ingestion_queue_capacity: usize,
    #[serde(default = "default_ingestion_concurrency")]
    pub ingestion_concurrency: usize,
    #[serde(default = "default_gateway_base_delay_ms")]
    pub gateway_base_delay_ms: u64,
    #[serde(default = "default_gateway_max_attempts")]
    pub gateway_max_attempts: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_base_url: default_base_url(),
            generation_model: default_generation_model(),
            fast_model: default_fast_model(),
            embedding_backend: EmbeddingBackendKind::default(),
            embedding_model: default_embedding_model(),
            embedding_dimensions: default_embedding_dimensions(),
            data_dir: default_data_dir(),
            storage: default_storage_kind(),
            http_port: default_http_port(),
            ingest_max_body_bytes: default_ingest_max_body_bytes(),
            ingestion_queue_capacity: default_ingestion_queue_capacity(),
            ingestion_concurrency: default_ingestion_concurrency(),
            gateway_base_delay_ms: default_gateway_base_delay_ms(),
            gateway_max_attempts: default_gateway_max_attempts(),
        }
    }
}

fn default_data_dir() -> String {
    "./data".to_string()
}

// Gemini exposes an OpenAI-compatible surface.
fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta/openai".to_string()
}

fn default_generation_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_fast_model() -> String {
    "gemini-2.0-flash-exp".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-004".to_string()
}

fn default_embedding_dimensions() -> u32 {
    768
}

fn default_http_port() -> u16 {
    8000
}

fn default_ingest_max_body_bytes() -> usize {
    50 * 1024 * 1024
}

fn default_ingestion_queue_capacity() -> usize {
    32
}

fn default_ingestion_concurrency() -> usize {
    2
}

fn default_gateway_base_delay_ms() -> u64 {
    2_000
}

fn default_gateway_max_attempts() -> usize {
    4
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_gateway_policy() {
        let config = AppConfig::default();
        assert_eq!(config.gateway_max_attempts, 4);
        assert_eq!(config.gateway_base_delay_ms, 2_000);
        assert_eq!(config.storage, StorageKind::Local);
    }

    #[test]
    fn deserializes_partial_sources_with_defaults() {
        let config: AppConfig = Config::builder()
            .set_override("openai_api_key", "key")
            .and_then(|builder| builder.set_override("storage", "memory"))
            .and_then(|builder| builder.set_override("ingestion_concurrency", 5))
            .expect("overrides")
            .build()
            .expect("build config")
            .try_deserialize()
            .expect("deserialize config");

        assert_eq!(config.openai_api_key, "key");
        assert_eq!(config.storage, StorageKind::Memory);
        assert_eq!(config.ingestion_concurrency, 5);
        assert_eq!(config.generation_model, "gemini-2.0-flash");
        assert_eq!(config.embedding_backend, EmbeddingBackendKind::OpenAI);
    }
}
