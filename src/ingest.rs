//! Ingestion pipeline orchestration.
//!
//! Coordinates the flow for one session: load files → chunk → embed →
//! append to `session_<id>`. Files that fail to load are logged and
//! skipped; the batch only fails when nothing could be parsed or the vector
//! store rejects the write.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::chunk::split_documents;
use crate::config::Config;
use crate::loader::{LoadReport, ParserRegistry};
use crate::session::SessionId;
use crate::store::VectorStore;

pub const INGEST_SUCCESS_MESSAGE: &str = "Knowledge Base Built.";
pub const NO_DOCUMENTS_MESSAGE: &str = "No valid documents parsed.";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IngestStatus {
    Success,
    Error,
}

/// Result of one ingestion request. Serialised as the HTTP response body.
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub status: IngestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks: Option<usize>,
    pub message: String,
    /// Files that could not be parsed, with the reason.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
}

impl IngestOutcome {
    fn error(message: impl Into<String>, skipped: Vec<String>) -> Self {
        Self {
            status: IngestStatus::Error,
            chunks: None,
            message: message.into(),
            skipped,
        }
    }
}

/// Ingest `paths` into the session's collection using the built-in parsers.
pub async fn ingest_files(
    store: &VectorStore,
    config: &Config,
    session: &SessionId,
    paths: Vec<PathBuf>,
) -> IngestOutcome {
    let parsers = Arc::new(ParserRegistry::with_builtins());
    ingest_files_with(store, config, parsers, session, paths).await
}

/// Same as [`ingest_files`] with a caller-supplied parser registry.
pub async fn ingest_files_with(
    store: &VectorStore,
    config: &Config,
    parsers: Arc<ParserRegistry>,
    session: &SessionId,
    paths: Vec<PathBuf>,
) -> IngestOutcome {
    let file_count = paths.len();

    // PDF extraction is CPU-bound; keep it off the async workers.
    let report = match tokio::task::spawn_blocking(move || parsers.load_all(&paths)).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(session = %session, error = %e, "document loading task failed");
            return IngestOutcome::error(e.to_string(), Vec::new());
        }
    };
    let LoadReport {
        documents,
        failures,
    } = report;
    let skipped: Vec<String> = failures.iter().map(|f| f.to_string()).collect();

    if documents.is_empty() {
        tracing::warn!(session = %session, files = file_count, "no documents parsed");
        return IngestOutcome::error(NO_DOCUMENTS_MESSAGE, skipped);
    }

    let chunks = split_documents(
        &documents,
        config.chunking.chunk_size,
        config.chunking.chunk_overlap,
    );

    match store.add_chunks(&session.collection_name(), &chunks).await {
        Ok(stored) => {
            tracing::info!(
                session = %session,
                documents = documents.len(),
                chunks = stored,
                "ingested documents"
            );
            IngestOutcome {
                status: IngestStatus::Success,
                chunks: Some(stored),
                message: INGEST_SUCCESS_MESSAGE.to_string(),
                skipped,
            }
        }
        Err(e) => {
            tracing::error!(session = %session, error = %e, "vector store write failed");
            IngestOutcome::error(e.to_string(), skipped)
        }
    }
}
