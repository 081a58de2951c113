//! # QA Harness
//!
//! Session-scoped retrieval-augmented generation for QA work: upload
//! requirement documents and a target HTML page, then generate a markdown
//! test-case table and Python Selenium scripts grounded in them.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │   Uploads   │──▶│  Pipeline   │──▶│ VectorStore  │
//! │ pdf/md/html │   │ Load+Chunk  │   │ session_<id> │
//! └─────────────┘   │   +Embed    │   └──────┬───────┘
//!                   └─────────────┘          │ top-k
//!                                            ▼
//!                                     ┌──────────────┐
//!                                     │  Generators  │──▶ ChatModel
//!                                     │ tests/script │
//!                                     └──────┬───────┘
//!                          ┌─────────────────┤
//!                          ▼                 ▼
//!                     ┌─────────┐      ┌──────────┐
//!                     │   CLI   │      │   HTTP   │
//!                     └─────────┘      └──────────┘
//! ```
//!
//! Every session owns an upload directory `<upload_dir>/<id>/` and a
//! vector collection `session_<id>`; nothing is shared between sessions.
//! Stale sessions are swept when the server starts.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`error`] | Error types |
//! | [`session`] | Session identifiers |
//! | [`loader`] | Document parsers and registry |
//! | [`chunk`] | Overlapping text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Session-scoped vector store |
//! | [`llm`] | Chat model providers |
//! | [`generate`] | Test-plan and script generators |
//! | [`ingest`] | Ingestion pipeline |
//! | [`uploads`] | Per-session upload directories |
//! | [`sweep`] | Stale-session sweeper |
//! | [`server`] | HTTP API |
//! | [`commands`] | CLI command implementations |

pub mod chunk;
pub mod commands;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod generate;
pub mod ingest;
pub mod llm;
pub mod loader;
pub mod migrate;
pub mod models;
pub mod server;
pub mod session;
pub mod store;
pub mod sweep;
pub mod uploads;
