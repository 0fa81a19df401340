//! In-memory [`VectorIndex`] implementation for tests and small runs.
//!
//! Uses a `Vec` behind `std::sync::RwLock`. Search is brute-force cosine
//! similarity over all stored vectors.

use std::collections::HashSet;
use std::sync::RwLock;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{IndexRecord, ScoredRecord};

use super::{rank, VectorIndex};

struct StoredVector {
    record: IndexRecord,
    vector: Vec<f32>,
}

/// In-memory similarity index.
pub struct InMemoryIndex {
    vectors: RwLock<Vec<StoredVector>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            vectors: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory index lock poisoned")
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn add(&self, vectors: &[Vec<f32>], records: &[IndexRecord]) -> Result<()> {
        if vectors.len() != records.len() {
            bail!(
                "vectors and records must have the same length ({} vs {})",
                vectors.len(),
                records.len()
            );
        }
        let mut stored = self.vectors.write().map_err(poisoned)?;
        for (vector, record) in vectors.iter().zip(records) {
            stored.retain(|sv| sv.record.symbol_id != record.symbol_id);
            stored.push(StoredVector {
                record: record.clone(),
                vector: vector.clone(),
            });
        }
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredRecord>> {
        let stored = self.vectors.read().map_err(poisoned)?;
        let candidates = stored
            .iter()
            .map(|sv| ScoredRecord {
                record: sv.record.clone(),
                score: cosine_similarity(query, &sv.vector),
            })
            .collect();
        Ok(rank(candidates, k))
    }

    async fn retain(&self, keep: &HashSet<String>) -> Result<usize> {
        let mut stored = self.vectors.write().map_err(poisoned)?;
        let before = stored.len();
        stored.retain(|sv| keep.contains(&sv.record.symbol_id));
        Ok(before - stored.len())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.vectors.read().map_err(poisoned)?.len())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> IndexRecord {
        IndexRecord {
            symbol_id: id.to_string(),
            qualname: id.to_string(),
            file: "src/pkg/mod.py".to_string(),
            content_hash: format!("hash-{id}"),
        }
    }

    #[tokio::test]
    async fn search_orders_by_descending_score() {
        let index = InMemoryIndex::new();
        index
            .add(
                &[vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7071, 0.7071]],
                &[record("a"), record("b"), record("c")],
            )
            .await
            .unwrap();

        let hits = index.search(&[1.0, 0.0], 2).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.record.symbol_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn add_replaces_same_symbol_id() {
        let index = InMemoryIndex::new();
        index.add(&[vec![1.0, 0.0]], &[record("a")]).await.unwrap();
        index.add(&[vec![0.0, 1.0]], &[record("a")]).await.unwrap();
        assert_eq!(index.len().await.unwrap(), 1);

        let hits = index.search(&[0.0, 1.0], 1).await.unwrap();
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn retain_drops_records_outside_the_set() {
        let index = InMemoryIndex::new();
        index
            .add(&[vec![1.0, 0.0], vec![0.0, 1.0]], &[record("a"), record("b")])
            .await
            .unwrap();

        let keep: HashSet<String> = ["a".to_string()].into_iter().collect();
        assert_eq!(index.retain(&keep).await.unwrap(), 1);
        assert_eq!(index.len().await.unwrap(), 1);

        let hits = index.search(&[0.0, 1.0], 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.symbol_id, "a");
    }

    #[tokio::test]
    async fn add_rejects_length_mismatch() {
        let index = InMemoryIndex::new();
        let err = index.add(&[vec![1.0]], &[]).await.unwrap_err();
        assert!(err.to_string().contains("same length"));
    }
}
