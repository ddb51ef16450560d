//! Flat in-memory vector index.
//!
//! Every stored embedding is L2-normalized at build time, so cosine
//! similarity reduces to a dot product. Search is brute force over all
//! vectors; ties keep insertion order (lower row index wins).

use sha2::{Digest, Sha256};
use std::collections::HashSet;

use crate::embedding::{dot, embed_checked, ensure_finite, l2_normalize, Embedder};
use crate::error::{RagError, Result};
use crate::models::{Document, EmbedderFingerprint, RetrievalResult, ScoredDocument};

/// Default number of texts sent to the embedder per call.
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Immutable index over one document set.
///
/// Holds exactly one normalized embedding per document, in insertion order.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    documents: Vec<Document>,
    vectors: Vec<Vec<f32>>,
    fingerprint: EmbedderFingerprint,
    corpus_hash: String,
}

impl VectorIndex {
    /// Embed every document and build the index.
    ///
    /// Fails with [`RagError::EmptyCorpus`] for an empty document set,
    /// before the embedder is called.
    pub async fn build<E: Embedder + ?Sized>(
        documents: Vec<Document>,
        embedder: &E,
        batch_size: usize,
    ) -> Result<Self> {
        if documents.is_empty() {
            return Err(RagError::EmptyCorpus);
        }

        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size.max(1)) {
            vectors.extend(embed_checked(embedder, batch).await?);
        }

        Self::from_vectors(documents, vectors, embedder.fingerprint())
    }

    /// Build from precomputed embeddings (one per document, same order).
    ///
    /// Document ids must be unique and every component finite.
    pub fn from_vectors(
        documents: Vec<Document>,
        mut vectors: Vec<Vec<f32>>,
        fingerprint: EmbedderFingerprint,
    ) -> Result<Self> {
        if documents.is_empty() {
            return Err(RagError::EmptyCorpus);
        }
        if vectors.len() != documents.len() {
            return Err(RagError::ModelUnavailable(format!(
                "{} embeddings for {} documents",
                vectors.len(),
                documents.len()
            )));
        }
        let mut seen = HashSet::with_capacity(documents.len());
        if let Some(dup) = documents.iter().find(|d| !seen.insert(d.id)) {
            return Err(RagError::DuplicateDocumentId(dup.id));
        }
        for v in vectors.iter_mut() {
            if v.len() != fingerprint.dims {
                return Err(RagError::EmbeddingDimensionMismatch {
                    expected: fingerprint.dims,
                    actual: v.len(),
                });
            }
            ensure_finite(&fingerprint.model, v)?;
            l2_normalize(v);
        }

        let corpus_hash = corpus_hash(&documents);

        Ok(Self {
            documents,
            vectors,
            fingerprint,
            corpus_hash,
        })
    }

    /// Return the `k` documents most similar to `query`.
    ///
    /// `k` larger than the corpus is clamped; `k == 0` is rejected.
    pub fn search(&self, query: &[f32], k: usize) -> Result<RetrievalResult> {
        if k == 0 {
            return Err(RagError::InvalidTopK);
        }
        if query.len() != self.fingerprint.dims {
            return Err(RagError::EmbeddingDimensionMismatch {
                expected: self.fingerprint.dims,
                actual: query.len(),
            });
        }

        ensure_finite(&self.fingerprint.model, query)?;

        let mut q = query.to_vec();
        l2_normalize(&mut q);

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            // `+ 0.0` folds -0.0 into 0.0 so equal scores stay ties under total_cmp.
            .map(|(i, v)| (i, dot(&q, v) + 0.0))
            .collect();

        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k.min(self.documents.len()));

        Ok(RetrievalResult {
            hits: scored
                .into_iter()
                .map(|(i, score)| ScoredDocument {
                    document: self.documents[i].clone(),
                    score,
                })
                .collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.fingerprint.dims
    }

    pub fn fingerprint(&self) -> &EmbedderFingerprint {
        &self.fingerprint
    }

    pub fn corpus_hash(&self) -> &str {
        &self.corpus_hash
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// The stored (normalized) embedding of document `id`.
    pub fn embedding(&self, id: usize) -> Option<&[f32]> {
        self.documents
            .iter()
            .position(|d| d.id == id)
            .map(|i| self.vectors[i].as_slice())
    }
}

fn corpus_hash(documents: &[Document]) -> String {
    let mut hasher = Sha256::new();
    for doc in documents {
        hasher.update(doc.text.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}
