//! Query-time retrieval.
//!
//! 1. Reject an empty query before any embedding happens.
//! 2. Check the query embedder matches the one the index was built with.
//! 3. Embed the query and take the top-k rows from the index.
//! 4. Drop the lowest-scoring rows until the assembled context fits the
//!    character budget. Rows are never cut mid-text and the best row is
//!    always kept.

use crate::embedding::{embed_query, Embedder};
use crate::error::{RagError, Result};
use crate::index::VectorIndex;
use crate::models::RetrievalResult;

/// Separator between rows in the assembled context.
pub const CONTEXT_SEPARATOR: &str = "\n";

pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 8000;

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalParams {
    pub top_k: usize,
    /// Budget for the assembled context, in characters (separators included).
    pub max_context_chars: usize,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
        }
    }
}

/// Fail with [`RagError::EmptyQuery`] for blank input.
pub fn validate_query(query: &str) -> Result<&str> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(RagError::EmptyQuery);
    }
    Ok(trimmed)
}

/// Run the full retrieval step for `query` against a built index.
pub async fn retrieve<E: Embedder + ?Sized>(
    index: &VectorIndex,
    embedder: &E,
    query: &str,
    params: &RetrievalParams,
) -> Result<RetrievalResult> {
    let query = validate_query(query)?;

    let query_fp = embedder.fingerprint();
    if &query_fp != index.fingerprint() {
        return Err(RagError::EmbedderMismatch {
            index_model: index.fingerprint().to_string(),
            query_model: query_fp.to_string(),
        });
    }

    let query_vec = embed_query(embedder, query).await?;
    let result = index.search(&query_vec, params.top_k)?;
    Ok(apply_context_budget(result, params.max_context_chars))
}

/// Length of the context [`assemble_context`] would produce, in characters.
pub fn context_len(result: &RetrievalResult) -> usize {
    let text: usize = result.documents().map(|d| d.text.chars().count()).sum();
    let seps = result.len().saturating_sub(1) * CONTEXT_SEPARATOR.chars().count();
    text + seps
}

/// Drop trailing (lowest-scoring) hits until the context fits `budget`.
///
/// The first hit is never dropped.
pub fn apply_context_budget(mut result: RetrievalResult, budget: usize) -> RetrievalResult {
    while result.len() > 1 && context_len(&result) > budget {
        result.hits.pop();
    }
    result
}

/// Join the normalized texts of the hits in rank order.
pub fn assemble_context(result: &RetrievalResult) -> String {
    result
        .documents()
        .map(|d| d.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}
