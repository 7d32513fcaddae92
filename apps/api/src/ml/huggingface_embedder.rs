use crate::{
    config::Config,
    error::{ApiError, Result},
    ml::embedder::{normalize_rows, Embedder},
};
use async_trait::async_trait;
use futures::future::BoxFuture;
use ndarray::Array2;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_MODEL_NAME: &str = "sentence-transformers/all-MiniLM-L6-v2";
pub const DEFAULT_BASE_URL: &str = "https://api-inference.huggingface.co";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_CONNECTION_TIMEOUT_SECONDS: u64 = 15;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_DELAY_MS: u64 = 500;

/// Connection settings for the Hugging Face feature-extraction API.
#[derive(Debug, Clone)]
pub struct HuggingFaceConfig {
    pub api_key: String,
    pub base_url: String,
    pub model_name: String,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
}

impl HuggingFaceConfig {
    /// Reads the embedder settings out of the application config.
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config
            .huggingface_api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                ApiError::MissingPrerequisite(
                    "APP_HUGGINGFACE_API_KEY must be set to compute item embeddings".to_string(),
                )
            })?;

        Ok(Self {
            api_key,
            base_url: config.huggingface_base_url.clone(),
            model_name: config.huggingface_model_name.clone(),
            timeout_seconds: config.huggingface_timeout_seconds,
            retry_attempts: config.huggingface_retry_attempts,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        })
    }
}

/// Sentence embeddings served by the Hugging Face inference API.
#[derive(Clone)]
pub struct HuggingFaceEmbedder {
    client: Client,
    api_key: String,
    model_url: String,
    model_name: String,
    retry_attempts: u32,
    retry_delay_ms: u64,
}

impl HuggingFaceEmbedder {
    pub fn new(config: HuggingFaceConfig) -> Result<Self> {
        info!(
            "Initializing HuggingFace client with model: {}, timeout: {}s",
            config.model_name, config.timeout_seconds
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECTION_TIMEOUT_SECONDS))
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .build()
            .map_err(|e| ApiError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let model_url = format!(
            "{}/pipeline/feature-extraction/{}",
            config.base_url.trim_end_matches('/'),
            config.model_name
        );

        Ok(Self {
            client,
            api_key: config.api_key,
            model_url,
            model_name: config.model_name,
            retry_attempts: config.retry_attempts,
            retry_delay_ms: config.retry_delay_ms,
        })
    }

    async fn request_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        #[derive(Serialize)]
        struct Request<'a> {
            inputs: &'a [String],
            options: Options,
        }

        #[derive(Serialize)]
        struct Options {
            wait_for_model: bool,
            use_cache: bool,
        }

        let request = Request {
            inputs: texts,
            options: Options {
                wait_for_model: true,
                use_cache: true,
            },
        };

        let response = self
            .client
            .post(&self.model_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(status_error(status, &self.model_name, &body));
        }

        let rows = parse_embeddings(&body)?;
        if rows.len() != texts.len() {
            return Err(ApiError::ModelInference(format!(
                "Expected {} embeddings from model, got {}",
                texts.len(),
                rows.len()
            )));
        }

        Ok(rows)
    }
}

#[async_trait]
impl Embedder for HuggingFaceEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn embed(&self, texts: &[String]) -> Result<Array2<f32>> {
        if texts.is_empty() {
            return Ok(Array2::zeros((0, 0)));
        }

        debug!("Encoding batch of {} texts", texts.len());
        let rows = retry_with_backoff(
            || Box::pin(self.request_batch(texts)),
            self.retry_attempts,
            self.retry_delay_ms,
        )
        .await?;

        stack_rows(rows)
    }
}

/// Retry an operation with exponential backoff.
///
/// Only transport-level failures (`ExternalService`) are retried.
async fn retry_with_backoff<'a, T, F>(
    operation: F,
    max_attempts: u32,
    base_delay_ms: u64,
) -> Result<T>
where
    F: Fn() -> BoxFuture<'a, Result<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e @ ApiError::ExternalService(_)) if attempt < max_attempts => {
                let delay = backoff_delay_ms(base_delay_ms, attempt);
                warn!(
                    "Embedding request failed (attempt {}/{}), retrying in {}ms: {}",
                    attempt, max_attempts, delay, e
                );
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Delay before retry number `attempt` (1-based), doubling each time and
/// saturating at `u64::MAX`.
fn backoff_delay_ms(base_delay_ms: u64, attempt: u32) -> u64 {
    base_delay_ms.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
}

fn status_error(status: StatusCode, model_name: &str, body: &str) -> ApiError {
    match status {
        StatusCode::NOT_FOUND => ApiError::ModelInference(format!(
            "Model not found: {}. Please check the model name in your configuration.",
            model_name
        )),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::ModelInference(
            "Authentication failed. Please check your HuggingFace API key.".to_string(),
        ),
        s if s == StatusCode::TOO_MANY_REQUESTS || s.is_server_error() => {
            ApiError::ExternalService(format!("HuggingFace API returned {}: {}", s, body))
        }
        s => ApiError::ModelInference(format!(
            "HuggingFace API returned non-success status: {} - {}",
            s, body
        )),
    }
}

fn parse_embeddings(body: &str) -> Result<Vec<Vec<f32>>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum EmbeddingResponse {
        Rows(Vec<Vec<f32>>),
        Wrapped { embeddings: Vec<Vec<f32>> },
    }

    let parsed: EmbeddingResponse = serde_json::from_str(body).map_err(|e| {
        ApiError::ModelInference(format!("Failed to parse embedding response: {}", e))
    })?;

    Ok(match parsed {
        EmbeddingResponse::Rows(rows) => rows,
        EmbeddingResponse::Wrapped { embeddings } => embeddings,
    })
}

/// Packs per-text vectors into a normalized matrix, rejecting ragged output.
fn stack_rows(rows: Vec<Vec<f32>>) -> Result<Array2<f32>> {
    let n_rows = rows.len();
    let width = rows.first().map(Vec::len).unwrap_or(0);

    if let Some(bad) = rows.iter().find(|row| row.len() != width) {
        return Err(ApiError::ModelInference(format!(
            "Embedding dimension mismatch: expected {}, got {}",
            width,
            bad.len()
        )));
    }

    let flat: Vec<f32> = rows.into_iter().flatten().collect();
    let mut matrix = Array2::from_shape_vec((n_rows, width), flat)?;
    normalize_rows(&mut matrix);
    Ok(matrix)
}
