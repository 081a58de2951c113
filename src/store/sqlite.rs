//! SQLite-backed [`VectorIndex`] implementation.
//!
//! One `vectors` table holds every collection; embeddings are stored as
//! little-endian f32 BLOBs and scored in process.

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::db;
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::migrate;
use crate::models::ScoredChunk;

use super::{rank, VectorIndex, VectorRecord};

/// SQLite implementation of the [`VectorIndex`] trait.
pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    /// Open the database at `db_path`, creating file and schema if needed.
    pub async fn open(db_path: &Path) -> Result<Self> {
        let pool = db::connect(db_path).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn insert(&self, collection: &str, records: &[VectorRecord]) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        for r in records {
            sqlx::query(
                r#"
                INSERT INTO vectors (id, collection, source, file_name, chunk_index,
                                     text, hash, model, dims, embedding, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&r.chunk.id)
            .bind(collection)
            .bind(&r.chunk.source)
            .bind(&r.chunk.file_name)
            .bind(r.chunk.chunk_index)
            .bind(&r.chunk.text)
            .bind(&r.chunk.hash)
            .bind(&r.model)
            .bind(r.vector.len() as i64)
            .bind(vec_to_blob(&r.vector))
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let rows = sqlx::query(
            r#"
            SELECT id, source, file_name, chunk_index, text, embedding
            FROM vectors
            WHERE collection = ?
            ORDER BY seq
            "#,
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        let scored = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                ScoredChunk {
                    chunk_id: row.get("id"),
                    source: row.get("source"),
                    file_name: row.get("file_name"),
                    chunk_index: row.get("chunk_index"),
                    text: row.get("text"),
                    score: cosine_similarity(query, &blob_to_vec(&blob)),
                }
            })
            .collect();

        Ok(rank(scored, k))
    }

    async fn drop_collection(&self, collection: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM vectors WHERE collection = ?")
            .bind(collection)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vectors WHERE collection = ?")
            .bind(collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(n as usize)
    }

    async fn collections(&self) -> Result<Vec<String>> {
        let names: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT collection FROM vectors ORDER BY collection")
                .fetch_all(&self.pool)
                .await?;
        Ok(names)
    }
}
