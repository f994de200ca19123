use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use pdf_chat_core::{
    CohereEmbeddings, GroqGeneration, IndexError, IngestError, IngestionPipeline, IngestionReport,
    LopdfExtractor, QdrantStore, QueryError, QueryPipeline, QueryRequest,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};

pub type Ingestion = IngestionPipeline<LopdfExtractor, CohereEmbeddings, QdrantStore>;
pub type Query = QueryPipeline<CohereEmbeddings, QdrantStore, GroqGeneration>;

#[derive(Clone)]
pub struct AppState {
    pub ingestion: Arc<Ingestion>,
    pub query: Arc<Query>,
}

pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    // browser clients call from arbitrary origins
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/upload", post(upload))
        .route("/query", post(query))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn health() -> &'static str {
    "OK"
}

/// Accept one multipart PDF upload and ingest it into its own collection.
async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<IngestionReport>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| ApiError::bad_request(format!("unreadable multipart body: {error}")))?
    {
        let file_name = match field.file_name() {
            Some(name) => name.to_string(),
            None => continue,
        };

        let bytes = field
            .bytes()
            .await
            .map_err(|error| ApiError::bad_request(format!("unreadable upload: {error}")))?;

        info!(file = %file_name, size = bytes.len(), "upload received");

        let report = state.ingestion.ingest(&file_name, &bytes).await?;
        return Ok(Json(report));
    }

    Err(ApiError::bad_request(
        "multipart body has no file field".to_string(),
    ))
}

/// Answer a query as a plain-text stream. Errors after the first fragment
/// truncate the body; the connection close is the only signal.
async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Response, ApiError> {
    let stream = state.query.answer_stream(&request).await?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(stream),
    )
        .into_response())
}

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: String) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message,
        }
    }
}

impl From<IngestError> for ApiError {
    fn from(error: IngestError) -> Self {
        let status = match &error {
            IngestError::Extraction(_)
            | IngestError::EmptyDocument
            | IngestError::MissingFileName(_) => StatusCode::UNPROCESSABLE_ENTITY,
            IngestError::InvalidChunkConfig(_) | IngestError::RegexError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            IngestError::Embedding(_) | IngestError::Index(_) => StatusCode::BAD_GATEWAY,
        };

        error!(%error, "ingestion failed");
        Self {
            status,
            message: error.to_string(),
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(error: QueryError) -> Self {
        let status = match &error {
            QueryError::EmptyQuery => StatusCode::BAD_REQUEST,
            QueryError::Index(IndexError::CollectionNotFound(_)) => StatusCode::NOT_FOUND,
            QueryError::Embedding(_) | QueryError::Index(_) | QueryError::Generation(_) => {
                StatusCode::BAD_GATEWAY
            }
        };

        error!(%error, "query failed");
        Self {
            status,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
