use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One unit of extracted text, the granularity of embedding and retrieval.
///
/// Indices are 1-based and unique within a document; they double as the
/// point ids inside the document's collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub index: u64,
    pub text: String,
}

impl Chunk {
    pub fn new(index: u64, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }
}

/// A chunk returned by vector search, with its similarity score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub id: u64,
    pub score: f64,
    pub text: String,
}

/// Outcome of a completed ingestion: the collection is queryable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionReport {
    pub collection: String,
    pub chunk_count: usize,
    pub vector_dimensions: usize,
    pub checksum: String,
    pub ingested_at: DateTime<Utc>,
}

/// A retrieval-generation request. Transient, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub collection_name: String,
    pub query: String,
}

/// The two-part message submitted to the generation provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPrompt {
    pub system: String,
    pub human: String,
}

/// Similarity metric a collection is declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    Cosine,
    Dot,
    Euclid,
}

/// Derive the collection name for an uploaded document: the file stem with
/// the extension stripped. Deterministic, so re-uploading the same file name
/// replaces the prior collection.
pub fn collection_name_for(file_name: &str) -> Option<String> {
    let trimmed = file_name.trim();
    if trimmed.is_empty() {
        return None;
    }

    let stem = match trimmed.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem,
        _ => trimmed,
    };

    if stem.trim().is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::collection_name_for;

    #[test]
    fn collection_name_strips_extension() {
        assert_eq!(collection_name_for("report.pdf").as_deref(), Some("report"));
    }

    #[test]
    fn collection_name_keeps_inner_dots() {
        assert_eq!(
            collection_name_for("q3.final.pdf").as_deref(),
            Some("q3.final")
        );
    }

    #[test]
    fn collection_name_without_extension_is_unchanged() {
        assert_eq!(collection_name_for("report").as_deref(), Some("report"));
    }

    #[test]
    fn empty_or_dotfile_names_are_rejected() {
        assert_eq!(collection_name_for(""), None);
        assert_eq!(collection_name_for("   "), None);
        assert_eq!(collection_name_for(".pdf"), Some(".pdf".to_string()));
    }
}
