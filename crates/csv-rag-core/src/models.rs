//! Core data models that flow through the ingest and query pipeline.

use serde::Serialize;

/// Tabular input: a header row plus string records.
///
/// Every cell is kept as a string; records shorter than the header are
/// allowed and their missing cells render as empty text.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub records: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>, records: Vec<Vec<String>>) -> Self {
        Self { headers, records }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// One source row, immutable after ingest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    /// Row index within the ingested table (0-based).
    pub id: usize,
    /// Selected field values, in column-selection order.
    pub fields: Vec<String>,
    /// Normalized text that was embedded.
    pub text: String,
}

/// A document paired with its cosine similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f32,
}

/// Search output, sorted by descending score.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetrievalResult {
    pub hits: Vec<ScoredDocument>,
}

impl RetrievalResult {
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.hits.iter().map(|h| &h.document)
    }
}

/// Identifies the embedding model an index was built with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedderFingerprint {
    pub model: String,
    pub dims: usize,
}

impl std::fmt::Display for EmbedderFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}d", self.model, self.dims)
    }
}

/// Returned by a successful ingest.
#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    pub documents: usize,
    pub columns: Vec<String>,
    pub model: String,
    pub dims: usize,
    /// SHA-256 over the normalized texts, in row order.
    pub corpus_hash: String,
    /// RFC 3339 build timestamp.
    pub built_at: String,
}

/// A generated answer together with the rows it was conditioned on.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    /// Completion model that produced `text`.
    pub model: String,
    pub sources: RetrievalResult,
}
