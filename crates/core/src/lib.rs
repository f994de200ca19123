pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod generation;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod prompt;
pub mod stores;
pub mod traits;

pub use chunking::{split_chunks, ChunkStrategy, DEFAULT_MAX_WORDS, DEFAULT_SEPARATOR_PATTERN};
pub use embeddings::{
    CohereConfig, CohereEmbeddings, HashedNgramEmbeddings, DEFAULT_COHERE_DIMENSIONS,
    DEFAULT_COHERE_MODEL,
};
pub use error::{
    EmbeddingError, GenerationError, IndexError, IngestError, QueryError,
};
pub use extractor::{LopdfExtractor, OcrEndpointConfig, PdfExtractor};
pub use generation::{GroqConfig, GroqGeneration, DEFAULT_GROQ_MODEL, DEFAULT_TEMPERATURE};
pub use ingest::{digest_bytes, IngestionPipeline};
pub use models::{
    collection_name_for, ChatPrompt, Chunk, DistanceMetric, IngestionReport, QueryRequest,
    RetrievedChunk,
};
pub use orchestrator::{QueryPipeline, DEFAULT_TOP_K};
pub use prompt::PromptBuilder;
pub use stores::QdrantStore;
pub use traits::{EmbeddingClient, FragmentStream, GenerationClient, VectorIndex};
