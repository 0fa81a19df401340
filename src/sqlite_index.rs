//! Persistent [`VectorIndex`] on SQLite.
//!
//! One row per symbol in the `symbols` table; the embedding is stored as a
//! little-endian `f32` BLOB and similarity is computed in Rust over all
//! rows (brute-force cosine). Rows are upserted by `symbol_id`, so
//! re-indexing the same tree replaces vectors instead of duplicating them,
//! and rows for symbols that no longer exist are pruned before each embed.
//!
//! The database runs in WAL mode. A writer that finds the database busy
//! waits up to `index.lock_timeout_secs` and then fails with an explicit
//! error naming the file.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use agentic_docs_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use agentic_docs_core::models::{IndexRecord, ScoredRecord};
use agentic_docs_core::store::{rank, VectorIndex};

pub struct SqliteIndex {
    pool: SqlitePool,
    path: PathBuf,
    lock_timeout: Duration,
}

impl SqliteIndex {
    /// Open (creating if needed) the index database at `path`.
    pub async fn open(path: &Path, lock_timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create index directory: {}", parent.display())
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(lock_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(lock_timeout)
            .connect_with(options)
            .await
            .map_err(|e| locked_or(e, path, lock_timeout))?;

        let index = Self {
            pool,
            path: path.to_path_buf(),
            lock_timeout,
        };
        index.migrate().await?;
        Ok(index)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS symbols (
                symbol_id TEXT PRIMARY KEY,
                qualname TEXT NOT NULL,
                file TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                dims INTEGER NOT NULL,
                embedding BLOB NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| self.locked(e))?;
        Ok(())
    }

    fn locked(&self, e: sqlx::Error) -> anyhow::Error {
        locked_or(e, &self.path, self.lock_timeout)
    }
}

fn locked_or(e: sqlx::Error, path: &Path, timeout: Duration) -> anyhow::Error {
    let busy = match &e {
        sqlx::Error::Database(db) => {
            matches!(db.code().as_deref(), Some("5") | Some("6"))
                || db.message().contains("locked")
        }
        sqlx::Error::PoolTimedOut => true,
        _ => false,
    };
    if busy {
        anyhow!(
            "Index database {} is locked by another process (waited {}s)",
            path.display(),
            timeout.as_secs()
        )
    } else {
        anyhow::Error::new(e).context(format!("Index database error: {}", path.display()))
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn add(&self, vectors: &[Vec<f32>], records: &[IndexRecord]) -> Result<()> {
        if vectors.len() != records.len() {
            bail!(
                "vectors and records must have the same length ({} vs {})",
                vectors.len(),
                records.len()
            );
        }

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await.map_err(|e| self.locked(e))?;
        for (vector, record) in vectors.iter().zip(records) {
            sqlx::query(
                r#"
                INSERT INTO symbols (symbol_id, qualname, file, content_hash, dims, embedding, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(symbol_id) DO UPDATE SET
                    qualname = excluded.qualname,
                    file = excluded.file,
                    content_hash = excluded.content_hash,
                    dims = excluded.dims,
                    embedding = excluded.embedding,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&record.symbol_id)
            .bind(&record.qualname)
            .bind(&record.file)
            .bind(&record.content_hash)
            .bind(vector.len() as i64)
            .bind(vec_to_blob(vector))
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| self.locked(e))?;
        }
        tx.commit().await.map_err(|e| self.locked(e))?;
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredRecord>> {
        let rows = sqlx::query(
            "SELECT symbol_id, qualname, file, content_hash, embedding FROM symbols",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| self.locked(e))?;

        let candidates = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                ScoredRecord {
                    record: IndexRecord {
                        symbol_id: row.get("symbol_id"),
                        qualname: row.get("qualname"),
                        file: row.get("file"),
                        content_hash: row.get("content_hash"),
                    },
                    score: cosine_similarity(query, &blob_to_vec(&blob)),
                }
            })
            .collect();

        Ok(rank(candidates, k))
    }

    async fn retain(&self, keep: &HashSet<String>) -> Result<usize> {
        let mut tx = self.pool.begin().await.map_err(|e| self.locked(e))?;
        let ids: Vec<String> = sqlx::query_scalar("SELECT symbol_id FROM symbols")
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| self.locked(e))?;

        let mut removed = 0;
        for id in ids.iter().filter(|id| !keep.contains(*id)) {
            sqlx::query("DELETE FROM symbols WHERE symbol_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(|e| self.locked(e))?;
            removed += 1;
        }
        tx.commit().await.map_err(|e| self.locked(e))?;
        Ok(removed)
    }

    async fn len(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM symbols")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| self.locked(e))?;
        Ok(count as usize)
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(id: &str, hash: &str) -> IndexRecord {
        IndexRecord {
            symbol_id: id.to_string(),
            qualname: id.to_string(),
            file: "src/pkg/mod.py".to_string(),
            content_hash: hash.to_string(),
        }
    }

    #[tokio::test]
    async fn persists_and_upserts_across_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".index/index.sqlite");
        let timeout = Duration::from_secs(2);

        let index = SqliteIndex::open(&path, timeout).await.unwrap();
        index
            .add(
                &[vec![1.0, 0.0], vec![0.0, 1.0]],
                &[record("a", "h1"), record("b", "h1")],
            )
            .await
            .unwrap();
        index.close().await.unwrap();

        let index = SqliteIndex::open(&path, timeout).await.unwrap();
        index
            .add(&[vec![0.6, 0.8]], &[record("a", "h2")])
            .await
            .unwrap();
        assert_eq!(index.len().await.unwrap(), 2);

        let hits = index.search(&[0.6, 0.8], 1).await.unwrap();
        assert_eq!(hits[0].record.symbol_id, "a");
        assert_eq!(hits[0].record.content_hash, "h2");
        assert!((hits[0].score - 1.0).abs() < 1e-5);
        index.close().await.unwrap();
    }

    #[tokio::test]
    async fn retain_prunes_rows_from_earlier_runs() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.sqlite");
        let timeout = Duration::from_secs(2);

        let index = SqliteIndex::open(&path, timeout).await.unwrap();
        index
            .add(
                &[vec![1.0, 0.0], vec![0.0, 1.0]],
                &[record("old_name", "h1"), record("keep", "h1")],
            )
            .await
            .unwrap();
        index.close().await.unwrap();

        let index = SqliteIndex::open(&path, timeout).await.unwrap();
        let keep: HashSet<String> = ["keep".to_string()].into_iter().collect();
        assert_eq!(index.retain(&keep).await.unwrap(), 1);
        assert_eq!(index.retain(&keep).await.unwrap(), 0);

        let hits = index.search(&[1.0, 0.0], 5).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.record.symbol_id.as_str()).collect();
        assert_eq!(ids, vec!["keep"]);
        index.close().await.unwrap();
    }

    #[tokio::test]
    async fn rejects_length_mismatch() {
        let tmp = TempDir::new().unwrap();
        let index = SqliteIndex::open(&tmp.path().join("i.sqlite"), Duration::from_secs(1))
            .await
            .unwrap();
        let err = index.add(&[], &[record("a", "h")]).await.unwrap_err();
        assert!(err.to_string().contains("same length"));
    }
}
