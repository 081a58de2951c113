//! Session-scoped vector storage.
//!
//! A [`VectorStore`] pairs an [`EmbeddingProvider`] with a [`VectorIndex`]
//! backend. Rows are grouped into named collections (`session_<id>`); every
//! operation reads or writes exactly one collection.
//!
//! Backends:
//!
//! - [`SqliteIndex`](sqlite::SqliteIndex) persists to
//!   `<vector_db_path>/vectors.sqlite`.
//! - [`InMemoryIndex`](memory::InMemoryIndex) keeps everything in process;
//!   used by tests and throwaway runs.
//!
//! Both do brute-force cosine similarity. Collections are small (one
//! session's uploads), so no ANN structure is involved.

pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::config::Config;
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::error::RagError;
use crate::models::{Chunk, ScoredChunk};

/// A chunk together with its embedding, ready to be written to an index.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
    pub model: String,
}

/// Storage backend for embedded chunks.
///
/// # Contract
///
/// - `insert` appends; existing rows are never replaced.
/// - `search` ranks by cosine similarity descending, ties in insertion
///   order, and returns an empty list for an unknown collection.
/// - `drop_collection` returns `false` when nothing was stored under the
///   name, and never errors for absence.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn insert(&self, collection: &str, records: &[VectorRecord]) -> Result<()>;

    async fn search(&self, collection: &str, query: &[f32], k: usize)
        -> Result<Vec<ScoredChunk>>;

    async fn drop_collection(&self, collection: &str) -> Result<bool>;

    async fn count(&self, collection: &str) -> Result<usize>;

    /// Names of all non-empty collections, sorted.
    async fn collections(&self) -> Result<Vec<String>>;
}

/// Embedding provider plus index: the unit the rest of the crate talks to.
pub struct VectorStore {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    batch_size: usize,
}

impl VectorStore {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        batch_size: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            batch_size: batch_size.max(1),
        }
    }

    /// Build the configured embedder and open the SQLite index.
    pub async fn open(config: &Config) -> Result<Self, RagError> {
        let embedder = create_provider(&config.embedding)?;
        let index = sqlite::SqliteIndex::open(&config.storage.vector_db_file()).await?;
        Ok(Self::new(
            embedder,
            Arc::new(index),
            config.embedding.batch_size,
        ))
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Embed and append `chunks` to `collection`. Returns the number stored.
    pub async fn add_chunks(&self, collection: &str, chunks: &[Chunk]) -> Result<usize> {
        let mut stored = 0usize;

        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.embed_texts(&texts).await?;
            if vectors.len() != batch.len() {
                bail!(
                    "embedder returned {} vectors for {} chunks",
                    vectors.len(),
                    batch.len()
                );
            }

            let records: Vec<VectorRecord> = batch
                .iter()
                .zip(vectors)
                .map(|(chunk, vector)| VectorRecord {
                    chunk: chunk.clone(),
                    vector,
                    model: self.embedder.model_name().to_string(),
                })
                .collect();

            self.index.insert(collection, &records).await?;
            stored += records.len();
        }

        tracing::debug!(collection, stored, "added chunks");
        Ok(stored)
    }

    /// Top-`k` chunks of `collection` most similar to `query`.
    pub async fn similarity_search(
        &self,
        collection: &str,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        if k == 0 || self.index.count(collection).await? == 0 {
            return Ok(Vec::new());
        }
        let query_vec = self.embedder.embed_query(query).await?;
        self.index.search(collection, &query_vec, k).await
    }

    pub async fn delete_collection(&self, collection: &str) -> Result<bool> {
        let existed = self.index.drop_collection(collection).await?;
        if existed {
            tracing::info!(collection, "deleted collection");
        }
        Ok(existed)
    }

    pub async fn count(&self, collection: &str) -> Result<usize> {
        self.index.count(collection).await
    }

    pub async fn collections(&self) -> Result<Vec<String>> {
        self.index.collections().await
    }
}

/// Sort scored chunks by similarity, descending. The sort is stable, so
/// callers that pass rows in insertion order keep that order for ties.
pub(crate) fn rank(mut scored: Vec<ScoredChunk>, k: usize) -> Vec<ScoredChunk> {
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(k);
    scored
}
