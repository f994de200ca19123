use crate::error::{EmbeddingError, GenerationError, IndexError};
use crate::models::{ChatPrompt, Chunk, DistanceMetric, RetrievedChunk};
use async_trait::async_trait;
use futures_util::stream::BoxStream;

/// A lazy, finite, non-restartable sequence of generated text fragments.
/// Dropping it cancels the upstream provider call.
pub type FragmentStream = BoxStream<'static, Result<String, GenerationError>>;

/// Maps text to fixed-dimension vectors. Batch output must hold one vector
/// per input, in input order.
#[async_trait]
pub trait EmbeddingClient {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let texts = [text.to_string()];
        let mut vectors = self.embed_batch(&texts).await?;
        match vectors.pop() {
            Some(vector) if vectors.is_empty() => Ok(vector),
            Some(_) => Err(EmbeddingError::CountMismatch {
                expected: 1,
                returned: vectors.len() + 1,
            }),
            None => Err(EmbeddingError::CountMismatch {
                expected: 1,
                returned: 0,
            }),
        }
    }

    fn dimensions(&self) -> usize;
}

/// Stores (id, vector, payload) points per named collection and answers
/// k-nearest-neighbor searches by cosine similarity.
#[async_trait]
pub trait VectorIndex {
    /// Destructive replace: any prior collection under this name is dropped
    /// before the new one is declared.
    async fn recreate_collection(
        &self,
        collection: &str,
        dimensions: usize,
        metric: DistanceMetric,
    ) -> Result<(), IndexError>;

    /// With `wait` set, returns only after the store acknowledges durability.
    async fn upsert_points(
        &self,
        collection: &str,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
        wait: bool,
    ) -> Result<(), IndexError>;

    async fn search(
        &self,
        collection: &str,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<RetrievedChunk>, IndexError>;
}

/// Streams generated text for an assembled prompt.
#[async_trait]
pub trait GenerationClient {
    async fn generate_stream(&self, prompt: &ChatPrompt) -> Result<FragmentStream, GenerationError>;
}
