use crate::error::EmbeddingError;
use crate::traits::EmbeddingClient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

const COHERE_EMBED_URL: &str = "https://api.cohere.ai/v1/embed";

pub const DEFAULT_COHERE_MODEL: &str = "embed-english-v2.0";

/// Dimensionality of `embed-english-v2.0`, the provider default.
pub const DEFAULT_COHERE_DIMENSIONS: usize = 4096;

#[derive(Debug, Clone)]
pub struct CohereConfig {
    pub api_key: String,
    pub model: String,
    pub dimensions: usize,
}

impl CohereConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_COHERE_MODEL.to_string(),
            dimensions: DEFAULT_COHERE_DIMENSIONS,
        }
    }
}

/// Embedding client backed by the Cohere `/v1/embed` endpoint.
#[derive(Clone)]
pub struct CohereEmbeddings {
    client: reqwest::Client,
    config: CohereConfig,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    texts: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
struct EmbedErrorBody {
    message: Option<String>,
}

impl CohereEmbeddings {
    pub fn new(config: CohereConfig) -> Result<Self, EmbeddingError> {
        if config.api_key.trim().is_empty() {
            return Err(EmbeddingError::Provider(
                "cohere api key must not be empty".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            config,
        })
    }
}

#[async_trait]
impl EmbeddingClient for CohereEmbeddings {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(batch_size = texts.len(), model = %self.config.model, "embedding batch");

        let response = self
            .client
            .post(COHERE_EMBED_URL)
            .bearer_auth(&self.config.api_key)
            .json(&EmbedRequest {
                model: &self.config.model,
                texts,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<EmbedErrorBody>(&body)
                .ok()
                .and_then(|parsed| parsed.message)
                .unwrap_or(body);
            return Err(EmbeddingError::Provider(format!(
                "cohere returned {status}: {detail}"
            )));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|error| EmbeddingError::Provider(format!("unreadable response: {error}")))?;

        if parsed.embeddings.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                returned: parsed.embeddings.len(),
            });
        }

        Ok(parsed.embeddings)
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }
}

pub const DEFAULT_NGRAM_DIMENSIONS: usize = 128;

/// Deterministic local embedder: hashed character trigrams, L2-normalized.
///
/// Not a substitute for a trained model — kept for offline runs and for
/// exercising the pipelines without provider credentials.
#[derive(Debug, Clone, Copy)]
pub struct HashedNgramEmbeddings {
    pub dimensions: usize,
}

impl Default for HashedNgramEmbeddings {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_NGRAM_DIMENSIONS,
        }
    }
}

impl HashedNgramEmbeddings {
    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl EmbeddingClient for HashedNgramEmbeddings {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
