//! Core data models that flow through ingestion and retrieval.

use serde::Serialize;
use std::path::PathBuf;

/// Raw text extracted from one uploaded file.
///
/// Produced and consumed within a single ingestion call.
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    pub text: String,
    /// Full path the text was read from.
    pub source: PathBuf,
    /// Final path component, used as the human-facing source label.
    pub file_name: String,
}

/// A bounded, overlapping slice of a [`DocumentRecord`].
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub source: String,
    pub file_name: String,
    pub chunk_index: i64,
    pub text: String,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
}

/// A chunk returned from similarity search, with its cosine score.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk_id: String,
    pub source: String,
    pub file_name: String,
    pub chunk_index: i64,
    pub text: String,
    pub score: f32,
}
