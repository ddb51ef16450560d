//! # csv-rag
//!
//! Ask natural-language questions about the rows of a CSV file.
//!
//! Selected columns of every row are normalized into one document, embedded
//! into a flat in-memory index, and the rows most similar to a question are
//! handed to a chat-completion model as context.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌──────────────┐
//! │ CSV rows │──▶│  Normalize  │──▶│ Vector index │
//! │ (table)  │   │  + Embed    │   │  (flat, L2)  │
//! └──────────┘   └─────────────┘   └──────┬───────┘
//!                                         │ top-k + budget
//!                                         ▼
//!                                  ┌──────────────┐
//!                                  │  Completion  │
//!                                  │ (chat API)   │
//!                                  └──────────────┘
//! ```
//!
//! The algorithms live in `csv-rag-core`. This crate adds configuration,
//! concrete embedders, the HTTP completion client, CSV loading, the
//! `csvrag` CLI and the JSON server.
//!
//! ## Quick Start
//!
//! ```bash
//! export GEMINI_API_KEY=...
//! csvrag ask "which fruit is yellow?" --csv data/fruit.csv --columns name,color
//! csvrag retrieve "yellow" --csv data/fruit.csv --top-k 3 --json
//! csvrag serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`table`] | CSV loading and `--columns` parsing |
//! | [`embedding`] | Local, OpenAI and disabled embedders |
//! | [`completion`] | OpenAI-compatible chat-completion client |
//! | [`ask`] | `ask` / `retrieve` commands and caller-side retry |
//! | [`server`] | JSON HTTP API |
//! | [`logging`] | `tracing` subscriber setup |

pub mod ask;
pub mod completion;
pub mod config;
pub mod embedding;
pub mod logging;
pub mod server;
pub mod table;
