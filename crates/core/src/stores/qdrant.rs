use crate::error::IndexError;
use crate::models::{Chunk, DistanceMetric, RetrievedChunk};
use crate::traits::VectorIndex;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use tracing::debug;

/// Vector index over the Qdrant REST API. One collection per ingested
/// document; collections are addressed per call.
#[derive(Clone)]
pub struct QdrantStore {
    endpoint: String,
    api_key: Option<String>,
    client: Client,
}

impl QdrantStore {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, IndexError> {
        let endpoint = endpoint.into();
        url::Url::parse(&endpoint)?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            client: Client::new(),
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("api-key", key),
            None => request,
        }
    }
}

#[async_trait]
impl VectorIndex for QdrantStore {
    async fn recreate_collection(
        &self,
        collection: &str,
        dimensions: usize,
        metric: DistanceMetric,
    ) -> Result<(), IndexError> {
        // drop first: replacement is destructive, never a merge
        let response = self
            .authorized(
                self.client
                    .delete(format!("{}/collections/{}", self.endpoint, collection)),
            )
            .send()
            .await?;

        if !response.status().is_success() && response.status() != StatusCode::NOT_FOUND {
            return Err(IndexError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        let response = self
            .authorized(
                self.client
                    .put(format!("{}/collections/{}", self.endpoint, collection)),
            )
            .json(&json!({
                "vectors": {
                    "size": dimensions,
                    "distance": match metric {
                        DistanceMetric::Cosine => "Cosine",
                        DistanceMetric::Dot => "Dot",
                        DistanceMetric::Euclid => "Euclid",
                    },
                }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IndexError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        debug!(collection, dimensions, "collection recreated");
        Ok(())
    }

    async fn upsert_points(
        &self,
        collection: &str,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
        wait: bool,
    ) -> Result<(), IndexError> {
        if chunks.len() != embeddings.len() {
            return Err(IndexError::Request(format!(
                "embedding count {} doesn't match chunk count {}",
                embeddings.len(),
                chunks.len()
            )));
        }

        let points = chunks
            .iter()
            .zip(embeddings.iter())
            .map(|(chunk, embedding)| {
                json!({
                    "id": chunk.index,
                    "vector": embedding,
                    "payload": { "text": chunk.text },
                })
            })
            .collect::<Vec<_>>();

        if points.is_empty() {
            return Ok(());
        }

        let response = self
            .authorized(self.client.put(format!(
                "{}/collections/{}/points?wait={}",
                self.endpoint, collection, wait
            )))
            .json(&json!({ "points": points }))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(IndexError::CollectionNotFound(collection.to_string()));
        }

        if !response.status().is_success() {
            return Err(IndexError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        debug!(collection, point_count = points.len(), "points upserted");
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<RetrievedChunk>, IndexError> {
        let response = self
            .authorized(self.client.post(format!(
                "{}/collections/{}/points/search",
                self.endpoint, collection
            )))
            .json(&json!({
                "vector": query_vector,
                "limit": limit,
                "with_payload": true,
            }))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(IndexError::CollectionNotFound(collection.to_string()));
        }

        if !response.status().is_success() {
            return Err(IndexError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        let hits = parsed
            .pointer("/result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut retrieved = Vec::new();
        for hit in hits {
            let id = hit.pointer("/id").and_then(Value::as_u64).unwrap_or_default();
            let score = hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0);
            let text = hit
                .pointer("/payload/text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();

            retrieved.push(RetrievedChunk { id, score, text });
        }

        Ok(retrieved)
    }
}

#[cfg(test)]
mod tests {
    use super::QdrantStore;

    #[test]
    fn endpoint_must_be_a_url() {
        assert!(QdrantStore::new("not a url", None).is_err());
        assert!(QdrantStore::new("http://localhost:6333", None).is_ok());
    }

    #[test]
    fn trailing_slash_is_normalized() {
        let store = QdrantStore::new("http://localhost:6333/", None).unwrap();
        assert_eq!(store.endpoint, "http://localhost:6333");
    }
}
