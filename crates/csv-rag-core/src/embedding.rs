//! Embedder trait and vector utilities.
//!
//! Defines the [`Embedder`] trait that all embedding backends implement,
//! plus pure helpers for validation, normalization and similarity.
//!
//! Concrete embedders (local fastembed model, OpenAI-compatible HTTP) live
//! in the `csv-rag` app crate.

use async_trait::async_trait;

use crate::error::{RagError, Result};
use crate::models::EmbedderFingerprint;

/// Trait for embedding backends.
///
/// Implementations may load their model lazily on the first call to
/// [`embed`](Embedder::embed) and keep it for the life of the process.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"all-minilm-l6-v2"`).
    fn model_name(&self) -> &str;
    /// Returns the expected vector dimensionality.
    fn dims(&self) -> usize;
    /// Embed a batch of texts, one vector per input, in input order.
    ///
    /// Fails with [`RagError::ModelUnavailable`] if the model cannot be loaded.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn fingerprint(&self) -> EmbedderFingerprint {
        EmbedderFingerprint {
            model: self.model_name().to_string(),
            dims: self.dims(),
        }
    }
}

/// Embed `texts` and check every vector against [`Embedder::dims`].
pub async fn embed_checked<E: Embedder + ?Sized>(
    embedder: &E,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    let vectors = embedder.embed(texts).await?;
    if vectors.len() != texts.len() {
        return Err(RagError::ModelUnavailable(format!(
            "embedder '{}' returned {} vectors for {} inputs",
            embedder.model_name(),
            vectors.len(),
            texts.len()
        )));
    }
    let expected = embedder.dims();
    if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
        return Err(RagError::EmbeddingDimensionMismatch {
            expected,
            actual: bad.len(),
        });
    }
    for v in &vectors {
        ensure_finite(embedder.model_name(), v)?;
    }
    Ok(vectors)
}

/// Embed a single query text.
pub async fn embed_query<E: Embedder + ?Sized>(embedder: &E, text: &str) -> Result<Vec<f32>> {
    let mut vectors = embed_checked(embedder, &[text.to_string()]).await?;
    vectors
        .pop()
        .ok_or_else(|| RagError::ModelUnavailable("empty embedding response".to_string()))
}

/// Scale `v` to unit L2 norm in place.
///
/// Zero vectors are left unchanged.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm < f32::EPSILON {
        return;
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
}

/// Inner product of two equal-length vectors.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Reject vectors with NaN or infinite components.
pub fn ensure_finite(model: &str, v: &[f32]) -> Result<()> {
    match v.iter().position(|x| !x.is_finite()) {
        Some(pos) => Err(RagError::ModelUnavailable(format!(
            "embedder '{}' returned a non-finite value at component {}",
            model, pos
        ))),
        None => Ok(()),
    }
}
