//! Error taxonomy for the retrieval and generation pipeline.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RagError {
    #[error("cannot build an index from an empty set of rows")]
    EmptyCorpus,
    #[error("query must not be empty")]
    EmptyQuery,
    #[error("no index has been built yet; ingest rows first")]
    IndexNotReady,
    #[error("at least one column must be selected")]
    NoColumnsSelected,
    #[error("unknown column: {0}")]
    UnknownColumn(String),
    #[error("top_k must be >= 1")]
    InvalidTopK,
    #[error("duplicate document id: {0}")]
    DuplicateDocumentId(usize),
    #[error("index was built with embedder '{index_model}' but the query embedder is '{query_model}'")]
    EmbedderMismatch {
        index_model: String,
        query_model: String,
    },
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    EmbeddingDimensionMismatch { expected: usize, actual: usize },
    #[error("embedding model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("completion endpoint rejected the credential: {0}")]
    AuthenticationFailed(String),
    #[error("completion endpoint rate limited the request: {0}")]
    RateLimited(String),
    #[error("completion request timed out after {0}s")]
    GenerationTimeout(u64),
    #[error("generation failed{}: {message}", status_suffix(.status))]
    GenerationFailed {
        status: Option<u16>,
        message: String,
    },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({})", s)).unwrap_or_default()
}

impl RagError {
    /// True for the conditions a caller may retry with backoff.
    pub fn is_retriable(&self) -> bool {
        matches!(self, RagError::RateLimited(_) | RagError::GenerationTimeout(_))
    }

    /// Stable machine-readable code, used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            RagError::EmptyCorpus => "empty_corpus",
            RagError::EmptyQuery => "empty_query",
            RagError::IndexNotReady => "index_not_ready",
            RagError::NoColumnsSelected => "no_columns_selected",
            RagError::UnknownColumn(_) => "unknown_column",
            RagError::InvalidTopK => "invalid_top_k",
            RagError::DuplicateDocumentId(_) => "duplicate_document_id",
            RagError::EmbedderMismatch { .. } => "embedder_mismatch",
            RagError::EmbeddingDimensionMismatch { .. } => "embedding_dimension_mismatch",
            RagError::ModelUnavailable(_) => "model_unavailable",
            RagError::AuthenticationFailed(_) => "authentication_failed",
            RagError::RateLimited(_) => "rate_limited",
            RagError::GenerationTimeout(_) => "generation_timeout",
            RagError::GenerationFailed { .. } => "generation_failed",
        }
    }
}
