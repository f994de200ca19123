use crate::error::QueryError;
use crate::models::QueryRequest;
use crate::prompt::PromptBuilder;
use crate::traits::{EmbeddingClient, FragmentStream, GenerationClient, VectorIndex};
use tracing::info;

pub const DEFAULT_TOP_K: usize = 3;

/// Answers a query against one ingested collection: embed the query, search
/// by cosine similarity, assemble the prompt, stream the generated answer.
pub struct QueryPipeline<E, V, G>
where
    E: EmbeddingClient,
    V: VectorIndex,
    G: GenerationClient,
{
    embeddings: E,
    index: V,
    generation: G,
    top_k: usize,
}

impl<E, V, G> QueryPipeline<E, V, G>
where
    E: EmbeddingClient + Send + Sync,
    V: VectorIndex + Send + Sync,
    G: GenerationClient + Send + Sync,
{
    pub fn new(embeddings: E, index: V, generation: G, top_k: usize) -> Self {
        Self {
            embeddings,
            index,
            generation,
            top_k,
        }
    }

    /// Run the full retrieval-generation pipeline for one request.
    ///
    /// Fails before any fragment is produced when the query is empty, the
    /// collection was never ingested, or a provider call fails. Once the
    /// stream is returned, errors truncate it without retraction.
    pub async fn answer_stream(&self, request: &QueryRequest) -> Result<FragmentStream, QueryError> {
        if request.query.trim().is_empty() {
            return Err(QueryError::EmptyQuery);
        }

        let query_vector = self.embeddings.embed_query(&request.query).await?;

        let mut retrieved = self
            .index
            .search(&request.collection_name, &query_vector, self.top_k)
            .await?;

        // the store's ordering among equal scores is unspecified; re-sort for
        // a deterministic result: score descending, then id ascending
        retrieved.sort_by(|left, right| {
            right
                .score
                .total_cmp(&left.score)
                .then(left.id.cmp(&right.id))
        });
        retrieved.truncate(self.top_k);

        info!(
            collection = %request.collection_name,
            retrieved = retrieved.len(),
            "answering query"
        );

        let context = PromptBuilder::build_context(&retrieved);
        let prompt = PromptBuilder::build_prompt(&request.query, &context);

        let stream = self.generation.generate_stream(&prompt).await?;
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashedNgramEmbeddings;
    use crate::error::{GenerationError, IndexError};
    use crate::models::{ChatPrompt, Chunk, DistanceMetric, RetrievedChunk};
    use async_trait::async_trait;
    use futures_util::{stream, StreamExt};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Cosine-scoring index fake holding upserted vectors in memory.
    #[derive(Default)]
    struct InMemoryIndex {
        collections: Mutex<HashMap<String, Vec<(u64, Vec<f32>, String)>>>,
    }

    fn cosine(left: &[f32], right: &[f32]) -> f64 {
        let dot: f32 = left.iter().zip(right).map(|(l, r)| l * r).sum();
        let left_norm: f32 = left.iter().map(|v| v * v).sum::<f32>().sqrt();
        let right_norm: f32 = right.iter().map(|v| v * v).sum::<f32>().sqrt();
        if left_norm == 0.0 || right_norm == 0.0 {
            0.0
        } else {
            (dot / (left_norm * right_norm)) as f64
        }
    }

    #[async_trait]
    impl VectorIndex for InMemoryIndex {
        async fn recreate_collection(
            &self,
            collection: &str,
            _dimensions: usize,
            _metric: DistanceMetric,
        ) -> Result<(), IndexError> {
            self.collections
                .lock()
                .unwrap()
                .insert(collection.to_string(), Vec::new());
            Ok(())
        }

        async fn upsert_points(
            &self,
            collection: &str,
            chunks: &[Chunk],
            embeddings: &[Vec<f32>],
            _wait: bool,
        ) -> Result<(), IndexError> {
            let mut collections = self.collections.lock().unwrap();
            let points = collections
                .get_mut(collection)
                .ok_or_else(|| IndexError::CollectionNotFound(collection.to_string()))?;
            for (chunk, embedding) in chunks.iter().zip(embeddings) {
                points.push((chunk.index, embedding.clone(), chunk.text.clone()));
            }
            Ok(())
        }

        async fn search(
            &self,
            collection: &str,
            query_vector: &[f32],
            limit: usize,
        ) -> Result<Vec<RetrievedChunk>, IndexError> {
            let collections = self.collections.lock().unwrap();
            let points = collections
                .get(collection)
                .ok_or_else(|| IndexError::CollectionNotFound(collection.to_string()))?;

            let mut hits: Vec<RetrievedChunk> = points
                .iter()
                .map(|(id, vector, text)| RetrievedChunk {
                    id: *id,
                    score: cosine(query_vector, vector),
                    text: text.clone(),
                })
                .collect();
            hits.sort_by(|l, r| r.score.total_cmp(&l.score));
            hits.truncate(limit);
            Ok(hits)
        }
    }

    /// Index fake that returns a preset hit list, ignoring the query.
    struct ScriptedIndex {
        hits: Vec<RetrievedChunk>,
    }

    #[async_trait]
    impl VectorIndex for ScriptedIndex {
        async fn recreate_collection(
            &self,
            _: &str,
            _: usize,
            _: DistanceMetric,
        ) -> Result<(), IndexError> {
            Ok(())
        }

        async fn upsert_points(
            &self,
            _: &str,
            _: &[Chunk],
            _: &[Vec<f32>],
            _: bool,
        ) -> Result<(), IndexError> {
            Ok(())
        }

        async fn search(
            &self,
            _: &str,
            _: &[f32],
            _: usize,
        ) -> Result<Vec<RetrievedChunk>, IndexError> {
            Ok(self.hits.clone())
        }
    }

    /// Generation fake that records the prompt and plays back fixed fragments.
    #[derive(Default)]
    struct RecordingGeneration {
        prompts: Mutex<Vec<ChatPrompt>>,
        fragments: Vec<String>,
    }

    impl RecordingGeneration {
        fn with_fragments(fragments: &[&str]) -> Self {
            Self {
                prompts: Mutex::new(Vec::new()),
                fragments: fragments.iter().map(|s| s.to_string()).collect(),
            }
        }
    }

    #[async_trait]
    impl GenerationClient for RecordingGeneration {
        async fn generate_stream(
            &self,
            prompt: &ChatPrompt,
        ) -> Result<FragmentStream, GenerationError> {
            self.prompts.lock().unwrap().push(prompt.clone());
            let fragments: Vec<Result<String, GenerationError>> =
                self.fragments.iter().cloned().map(Ok).collect();
            Ok(stream::iter(fragments).boxed())
        }
    }

    async fn collect(mut fragments: FragmentStream) -> String {
        let mut answer = String::new();
        while let Some(fragment) = fragments.next().await {
            answer.push_str(&fragment.unwrap());
        }
        answer
    }

    async fn seeded_index(embedder: &HashedNgramEmbeddings) -> InMemoryIndex {
        let index = InMemoryIndex::default();
        let chunks = vec![
            Chunk::new(1, "The sky is blue"),
            Chunk::new(2, "Grass is green."),
        ];
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = embedder.embed_batch(&texts).await.unwrap();
        index
            .recreate_collection("report", embedder.dimensions(), DistanceMetric::Cosine)
            .await
            .unwrap();
        index
            .upsert_points("report", &chunks, &embeddings, true)
            .await
            .unwrap();
        index
    }

    #[tokio::test]
    async fn sky_chunk_is_ranked_first_for_sky_query() {
        let embedder = HashedNgramEmbeddings::default();
        let index = seeded_index(&embedder).await;

        let query_vector = embedder.embed_query("What color is the sky?").await.unwrap();
        let hits = index.search("report", &query_vector, 3).await.unwrap();

        assert!(!hits.is_empty());
        assert!(hits[0].text.contains("sky is blue"));
        assert!(hits.len() <= 3);
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn answer_is_streamed_in_multiple_fragments() {
        let embedder = HashedNgramEmbeddings::default();
        let index = seeded_index(&embedder).await;
        let generation = RecordingGeneration::with_fragments(&["The sky ", "is blue."]);
        let pipeline = QueryPipeline::new(embedder, index, generation, DEFAULT_TOP_K);

        let request = QueryRequest {
            collection_name: "report".to_string(),
            query: "What color is the sky?".to_string(),
        };

        let stream = pipeline.answer_stream(&request).await.unwrap();
        assert_eq!(collect(stream).await, "The sky is blue.");
    }

    #[tokio::test]
    async fn unknown_collection_fails_without_generating() {
        let embedder = HashedNgramEmbeddings::default();
        let index = InMemoryIndex::default();
        let generation = RecordingGeneration::with_fragments(&["unused"]);
        let pipeline = QueryPipeline::new(embedder, index, generation, DEFAULT_TOP_K);

        let request = QueryRequest {
            collection_name: "nonexistent".to_string(),
            query: "anything?".to_string(),
        };

        let error = match pipeline.answer_stream(&request).await {
            Ok(_) => panic!("expected answer_stream to fail"),
            Err(error) => error,
        };
        assert!(error.is_collection_not_found());
        assert!(pipeline.generation.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_query_is_rejected_up_front() {
        let embedder = HashedNgramEmbeddings::default();
        let pipeline = QueryPipeline::new(
            embedder,
            InMemoryIndex::default(),
            RecordingGeneration::default(),
            DEFAULT_TOP_K,
        );

        let request = QueryRequest {
            collection_name: "report".to_string(),
            query: "   ".to_string(),
        };

        assert!(matches!(
            pipeline.answer_stream(&request).await,
            Err(QueryError::EmptyQuery)
        ));
    }

    #[tokio::test]
    async fn equal_scores_break_ties_by_ascending_id() {
        let hits = vec![
            RetrievedChunk {
                id: 7,
                score: 0.5,
                text: "later".to_string(),
            },
            RetrievedChunk {
                id: 3,
                score: 0.5,
                text: "earlier".to_string(),
            },
            RetrievedChunk {
                id: 1,
                score: 0.9,
                text: "best".to_string(),
            },
        ];
        let generation = RecordingGeneration::with_fragments(&["ok"]);
        let pipeline = QueryPipeline::new(
            HashedNgramEmbeddings::default(),
            ScriptedIndex { hits },
            generation,
            DEFAULT_TOP_K,
        );

        let request = QueryRequest {
            collection_name: "report".to_string(),
            query: "which order?".to_string(),
        };
        let stream = pipeline.answer_stream(&request).await.unwrap();
        collect(stream).await;

        let prompts = pipeline.generation.prompts.lock().unwrap();
        let human = &prompts[0].human;
        let best = human.find("best").unwrap();
        let earlier = human.find("earlier").unwrap();
        let later = human.find("later").unwrap();
        assert!(best < earlier && earlier < later);
    }

    #[tokio::test]
    async fn empty_retrieval_still_generates_with_empty_context() {
        let generation = RecordingGeneration::with_fragments(&["no context answer"]);
        let pipeline = QueryPipeline::new(
            HashedNgramEmbeddings::default(),
            ScriptedIndex { hits: Vec::new() },
            generation,
            DEFAULT_TOP_K,
        );

        let request = QueryRequest {
            collection_name: "report".to_string(),
            query: "anything?".to_string(),
        };
        let stream = pipeline.answer_stream(&request).await.unwrap();
        assert_eq!(collect(stream).await, "no context answer");

        let prompts = pipeline.generation.prompts.lock().unwrap();
        assert!(prompts[0].human.contains("### Context: \n"));
    }
}
