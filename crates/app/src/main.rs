mod server;

use chrono::Utc;
use clap::Parser;
use pdf_chat_core::{
    ChunkStrategy, CohereConfig, CohereEmbeddings, GroqConfig, GroqGeneration, IngestionPipeline,
    LopdfExtractor, OcrEndpointConfig, QdrantStore, QueryPipeline, DEFAULT_COHERE_DIMENSIONS,
    DEFAULT_COHERE_MODEL, DEFAULT_GROQ_MODEL, DEFAULT_SEPARATOR_PATTERN, DEFAULT_TEMPERATURE,
    DEFAULT_TOP_K,
};
use server::AppState;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-chat-server", version)]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value = "8000")]
    port: u16,

    /// Qdrant base URL
    #[arg(long, env = "QDRANT_API_URL", default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Qdrant API key
    #[arg(long, env = "QDRANT_API_KEY")]
    qdrant_api_key: Option<String>,

    /// Cohere API key
    #[arg(long, env = "COHERE_API_KEY")]
    cohere_api_key: String,

    /// Cohere embedding model
    #[arg(long, env = "COHERE_MODEL", default_value = DEFAULT_COHERE_MODEL)]
    cohere_model: String,

    /// Embedding dimensionality; must match the model's output width
    #[arg(long, env = "EMBEDDING_DIMENSIONS", default_value_t = DEFAULT_COHERE_DIMENSIONS)]
    embedding_dimensions: usize,

    /// Groq API key
    #[arg(long, env = "GROQ_API_KEY")]
    groq_api_key: String,

    /// Generation model
    #[arg(long, env = "GROQ_MODEL", default_value = DEFAULT_GROQ_MODEL)]
    groq_model: String,

    /// Generation sampling temperature
    #[arg(long, env = "GENERATION_TEMPERATURE", default_value_t = DEFAULT_TEMPERATURE)]
    temperature: f32,

    /// Number of chunks retrieved per query
    #[arg(long, env = "RETRIEVAL_TOP_K", default_value_t = DEFAULT_TOP_K)]
    top_k: usize,

    /// Separator pattern for separator-based chunking
    #[arg(long, env = "CHUNK_SEPARATOR", default_value = DEFAULT_SEPARATOR_PATTERN)]
    chunk_separator: String,

    /// Switch to word-count chunking with this cap
    #[arg(long, env = "CHUNK_MAX_WORDS")]
    chunk_max_words: Option<usize>,

    /// Remote OCR endpoint for PDFs without a text layer
    #[arg(long, env = "OCR_ENDPOINT")]
    ocr_endpoint: Option<String>,

    /// API key for the OCR endpoint
    #[arg(long, env = "OCR_API_KEY")]
    ocr_api_key: Option<String>,

    /// Maximum upload size in megabytes
    #[arg(long, env = "MAX_UPLOAD_MB", default_value = "32")]
    max_upload_mb: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let strategy = match cli.chunk_max_words {
        Some(max_words) => ChunkStrategy::WordCount { max_words },
        None => ChunkStrategy::Separator {
            pattern: cli.chunk_separator.clone(),
        },
    };

    let ocr = cli.ocr_endpoint.as_ref().map(|endpoint| OcrEndpointConfig {
        endpoint: endpoint.clone(),
        api_key: cli.ocr_api_key.clone(),
    });

    let embeddings = CohereEmbeddings::new(CohereConfig {
        api_key: cli.cohere_api_key.clone(),
        model: cli.cohere_model.clone(),
        dimensions: cli.embedding_dimensions,
    })
    .map_err(|error| anyhow::anyhow!(error.to_string()))?;

    let index = QdrantStore::new(&cli.qdrant_url, cli.qdrant_api_key.clone())
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;

    let generation = GroqGeneration::new(GroqConfig {
        api_key: cli.groq_api_key.clone(),
        model: cli.groq_model.clone(),
        temperature: cli.temperature,
    })
    .map_err(|error| anyhow::anyhow!(error.to_string()))?;

    let state = AppState {
        ingestion: Arc::new(IngestionPipeline::new(
            LopdfExtractor::new(ocr),
            strategy,
            embeddings.clone(),
            index.clone(),
        )),
        query: Arc::new(QueryPipeline::new(embeddings, index, generation, cli.top_k)),
    };

    let router = server::build_router(state, cli.max_upload_mb * 1024 * 1024);

    let address = format!("{}:{}", cli.host, cli.port);
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        address = %address,
        "pdf-chat-server boot"
    );

    let listener = tokio::net::TcpListener::bind(&address).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
