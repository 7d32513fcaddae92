use crate::{
    error::Result,
    ml::{
        huggingface_embedder::{
            DEFAULT_BASE_URL, DEFAULT_MODEL_NAME, DEFAULT_RETRY_ATTEMPTS, DEFAULT_TIMEOUT_SECONDS,
        },
        similarity::DEFAULT_BATCH_SIZE,
    },
};
use serde::Deserialize;
use std::path::PathBuf;

/// Application settings, read from `APP_*` environment variables (and `.env`).
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// SQLite database holding entity tables and stored recommendations
    pub database_path: PathBuf,
    /// Directory with `users.csv` / `items.csv` for the batch job
    pub data_dir: PathBuf,
    pub huggingface_api_key: Option<String>,
    pub huggingface_model_name: String,
    pub huggingface_base_url: String,
    pub huggingface_timeout_seconds: u64,
    pub huggingface_retry_attempts: u32,
    pub embedding_batch_size: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_source(config::Environment::with_prefix("APP").try_parsing(true))
    }

    fn from_source<S>(source: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let settings = config::Config::builder()
            .set_default("host", "127.0.0.1")?
            .set_default("port", 8000)?
            .set_default("database_path", "data/data.db")?
            .set_default("data_dir", "data")?
            .set_default("huggingface_model_name", DEFAULT_MODEL_NAME)?
            .set_default("huggingface_base_url", DEFAULT_BASE_URL)?
            .set_default("huggingface_timeout_seconds", DEFAULT_TIMEOUT_SECONDS as i64)?
            .set_default("huggingface_retry_attempts", DEFAULT_RETRY_ATTEMPTS as i64)?
            .set_default("embedding_batch_size", DEFAULT_BATCH_SIZE as i64)?
            .add_source(source)
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let source: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config::Environment::with_prefix("APP")
            .try_parsing(true)
            .source(Some(source))
    }

    #[test]
    fn defaults_apply_without_environment() {
        let config = Config::from_source(env(&[])).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.database_path, PathBuf::from("data/data.db"));
        assert_eq!(config.embedding_batch_size, DEFAULT_BATCH_SIZE);
        assert!(config.huggingface_api_key.is_none());
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = Config::from_source(env(&[
            ("APP_PORT", "9100"),
            ("APP_DATABASE_PATH", "/tmp/recs.db"),
            ("APP_HUGGINGFACE_API_KEY", "hf_test"),
        ]))
        .unwrap();

        assert_eq!(config.port, 9100);
        assert_eq!(config.database_path, PathBuf::from("/tmp/recs.db"));
        assert_eq!(config.huggingface_api_key.as_deref(), Some("hf_test"));
    }
}
