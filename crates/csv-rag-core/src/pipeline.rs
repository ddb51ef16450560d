//! Caller-facing `ingest` / `ask` surface.
//!
//! A [`Pipeline`] owns the embedder, the completion client, and the
//! currently built index. The index is immutable once built; a new ingest
//! replaces it as a whole with a single pointer swap, so concurrent readers
//! see either the old index or the new one, never a mix.

use std::sync::{Arc, RwLock};

use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::generate::{build_messages, CompletionClient};
use crate::index::{VectorIndex, DEFAULT_BATCH_SIZE};
use crate::models::{Answer, IngestSummary, RetrievalResult, Table};
use crate::normalize::{select_columns, to_documents};
use crate::retrieve::{assemble_context, retrieve, validate_query, RetrievalParams};

pub struct Pipeline {
    embedder: Arc<dyn Embedder>,
    completion: Arc<dyn CompletionClient>,
    params: RetrievalParams,
    batch_size: usize,
    index: RwLock<Option<Arc<VectorIndex>>>,
}

impl Pipeline {
    pub fn new(embedder: Arc<dyn Embedder>, completion: Arc<dyn CompletionClient>) -> Self {
        Self {
            embedder,
            completion,
            params: RetrievalParams::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            index: RwLock::new(None),
        }
    }

    pub fn with_params(mut self, params: RetrievalParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn params(&self) -> &RetrievalParams {
        &self.params
    }

    /// Normalize, embed, and index the selected columns of `table`.
    ///
    /// On success the new index replaces any previous one. On failure the
    /// previous index (if any) stays in place.
    pub async fn ingest(&self, table: &Table, columns: &[String]) -> Result<IngestSummary> {
        if table.is_empty() {
            return Err(RagError::EmptyCorpus);
        }
        let positions = select_columns(&table.headers, columns)?;
        let documents = to_documents(table, &positions);

        let index = VectorIndex::build(documents, self.embedder.as_ref(), self.batch_size).await?;
        let summary = IngestSummary {
            documents: index.len(),
            columns: columns.to_vec(),
            model: index.fingerprint().model.clone(),
            dims: index.dims(),
            corpus_hash: index.corpus_hash().to_string(),
            built_at: chrono::Utc::now().to_rfc3339(),
        };

        let mut slot = self.index.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(Arc::new(index));
        Ok(summary)
    }

    /// The current index, or [`RagError::IndexNotReady`].
    pub fn current_index(&self) -> Result<Arc<VectorIndex>> {
        self.index
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(RagError::IndexNotReady)
    }

    pub fn is_ready(&self) -> bool {
        self.current_index().is_ok()
    }

    /// Retrieve the rows relevant to `query` using the pipeline's parameters.
    pub async fn retrieve(&self, query: &str) -> Result<RetrievalResult> {
        self.retrieve_with(query, &self.params).await
    }

    pub async fn retrieve_with(
        &self,
        query: &str,
        params: &RetrievalParams,
    ) -> Result<RetrievalResult> {
        validate_query(query)?;
        let index = self.current_index()?;
        retrieve(&index, self.embedder.as_ref(), query, params).await
    }

    /// Answer `query` from the retrieved rows.
    ///
    /// `credential` is passed through to the completion client for this
    /// call only.
    pub async fn ask(&self, query: &str, credential: &str) -> Result<Answer> {
        let sources = self.retrieve(query).await?;
        let context = assemble_context(&sources);
        let messages = build_messages(query.trim(), &context);
        let text = self.completion.complete(&messages, credential).await?;
        Ok(Answer {
            text,
            model: self.completion.model_name().to_string(),
            sources,
        })
    }
}
