//! # csv-rag Core
//!
//! Shared logic for csv-rag: data models, row normalization, the embedder
//! trait and vector math, the in-memory vector index, the retriever, prompt
//! assembly, and the caller-facing [`pipeline::Pipeline`].
//!
//! This crate performs no network or filesystem I/O. Concrete embedders and
//! completion clients live in the `csv-rag` app crate and are plugged in
//! through the [`embedding::Embedder`] and [`generate::CompletionClient`]
//! traits.

pub mod embedding;
pub mod error;
pub mod generate;
pub mod index;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod retrieve;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{RagError, Result};
