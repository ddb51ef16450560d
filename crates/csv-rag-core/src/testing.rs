//! Test doubles shared by the unit tests in this crate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::generate::{ChatMessage, CompletionClient};

/// Embedder that maps known texts to fixed vectors and counts calls.
///
/// Unknown texts embed to a vector of ones.
pub struct FixedEmbedder {
    model: String,
    dims: usize,
    vectors: HashMap<String, Vec<f32>>,
    calls: AtomicUsize,
}

impl FixedEmbedder {
    pub fn new(model: &str, dims: usize) -> Self {
        Self {
            model: model.to_string(),
            dims,
            vectors: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for FixedEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| {
                self.vectors
                    .get(t)
                    .cloned()
                    .unwrap_or_else(|| vec![1.0; self.dims])
            })
            .collect())
    }
}

/// Completion client that replays a canned outcome and records prompts.
pub struct ScriptedCompletion {
    outcomes: Mutex<Vec<Result<String>>>,
    pub seen: Mutex<Vec<(Vec<ChatMessage>, String)>>,
}

impl ScriptedCompletion {
    /// Outcomes are returned in order; the last one repeats.
    pub fn new(outcomes: Vec<Result<String>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn answering(text: &str) -> Self {
        Self::new(vec![Ok(text.to_string())])
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletion {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, messages: &[ChatMessage], credential: &str) -> Result<String> {
        self.seen
            .lock()
            .unwrap()
            .push((messages.to_vec(), credential.to_string()));
        let mut outcomes = self.outcomes.lock().unwrap();
        if outcomes.len() > 1 {
            outcomes.remove(0)
        } else {
            outcomes.first().cloned().unwrap_or_else(|| {
                Err(RagError::GenerationFailed {
                    status: None,
                    message: "no scripted outcome".to_string(),
                })
            })
        }
    }
}
