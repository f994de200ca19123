use crate::chunking::{split_chunks, ChunkStrategy};
use crate::error::{EmbeddingError, IngestError};
use crate::extractor::PdfExtractor;
use crate::models::{collection_name_for, DistanceMetric, IngestionReport};
use crate::traits::{EmbeddingClient, VectorIndex};
use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::info;

pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Drives one uploaded document from raw bytes to a queryable collection:
/// extract, chunk, embed in one batch, then destructively replace the
/// document's collection and upsert every point.
///
/// The replace is not atomic: a failure after the collection is recreated
/// but before the upsert completes leaves it empty. It is never left
/// partially populated, and no prior points survive a re-ingest.
pub struct IngestionPipeline<X, E, V>
where
    X: PdfExtractor,
    E: EmbeddingClient,
    V: VectorIndex,
{
    extractor: X,
    strategy: ChunkStrategy,
    embeddings: E,
    index: V,
}

impl<X, E, V> IngestionPipeline<X, E, V>
where
    X: PdfExtractor + Send + Sync,
    E: EmbeddingClient + Send + Sync,
    V: VectorIndex + Send + Sync,
{
    pub fn new(extractor: X, strategy: ChunkStrategy, embeddings: E, index: V) -> Self {
        Self {
            extractor,
            strategy,
            embeddings,
            index,
        }
    }

    pub async fn ingest(
        &self,
        file_name: &str,
        pdf: &[u8],
    ) -> Result<IngestionReport, IngestError> {
        let collection = collection_name_for(file_name)
            .ok_or_else(|| IngestError::MissingFileName(file_name.to_string()))?;

        let text = self.extractor.extract_text(pdf, file_name).await?;
        let chunks = split_chunks(&text, &self.strategy)?;

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let embeddings = self.embeddings.embed_batch(&texts).await?;

        if embeddings.len() != chunks.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: chunks.len(),
                returned: embeddings.len(),
            }
            .into());
        }

        let dimensions = self.embeddings.dimensions();
        for embedding in &embeddings {
            if embedding.len() != dimensions {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: dimensions,
                    actual: embedding.len(),
                }
                .into());
            }
        }

        self.index
            .recreate_collection(&collection, dimensions, DistanceMetric::Cosine)
            .await?;
        self.index
            .upsert_points(&collection, &chunks, &embeddings, true)
            .await?;

        info!(
            collection = %collection,
            chunk_count = chunks.len(),
            dimensions,
            "document ingested"
        );

        Ok(IngestionReport {
            collection,
            chunk_count: chunks.len(),
            vector_dimensions: dimensions,
            checksum: digest_bytes(pdf),
            ingested_at: Utc::now(),
        })
    }
}
