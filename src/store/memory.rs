//! In-memory [`VectorIndex`] implementation for tests and throwaway runs.
//!
//! Collections map to `Vec`s behind a `std::sync::RwLock`; vector search is
//! brute-force cosine similarity over the named collection.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::ScoredChunk;

use super::{rank, VectorIndex, VectorRecord};

/// In-memory vector index. Nothing survives the process.
pub struct InMemoryIndex {
    collections: RwLock<HashMap<String, Vec<VectorRecord>>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Vec<VectorRecord>>>> {
        self.collections
            .read()
            .map_err(|_| anyhow!("in-memory index lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Vec<VectorRecord>>>> {
        self.collections
            .write()
            .map_err(|_| anyhow!("in-memory index lock poisoned"))
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn insert(&self, collection: &str, records: &[VectorRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        self.write()?
            .entry(collection.to_string())
            .or_default()
            .extend(records.iter().cloned());
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let guard = self.read()?;
        let Some(rows) = guard.get(collection) else {
            return Ok(Vec::new());
        };

        let scored = rows
            .iter()
            .map(|r| ScoredChunk {
                chunk_id: r.chunk.id.clone(),
                source: r.chunk.source.clone(),
                file_name: r.chunk.file_name.clone(),
                chunk_index: r.chunk.chunk_index,
                text: r.chunk.text.clone(),
                score: cosine_similarity(query, &r.vector),
            })
            .collect();

        Ok(rank(scored, k))
    }

    async fn drop_collection(&self, collection: &str) -> Result<bool> {
        Ok(self.write()?.remove(collection).is_some())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        Ok(self.read()?.get(collection).map_or(0, Vec::len))
    }

    async fn collections(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .read()?
            .iter()
            .filter(|(_, rows)| !rows.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        Ok(names)
    }
}
