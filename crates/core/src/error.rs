use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding provider request failed: {0}")]
    Provider(String),

    #[error("provider returned {returned} vectors for {expected} inputs")]
    CountMismatch { expected: usize, returned: usize },

    #[error("embedding dimension {actual} does not match configured {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("index request failed: {0}")]
    Request(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation provider request failed: {0}")]
    Provider(String),

    #[error("generation stream error: {0}")]
    Stream(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("pdf extraction failed: {0}")]
    Extraction(String),

    #[error("document produced no text to chunk")]
    EmptyDocument,

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("file name has no usable stem: {0}")]
    MissingFileName(String),

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query is empty")]
    EmptyQuery,

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

impl QueryError {
    /// True when the named collection was never ingested.
    pub fn is_collection_not_found(&self) -> bool {
        matches!(self, QueryError::Index(IndexError::CollectionNotFound(_)))
    }
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
