//! Similarity index abstraction for Agentic Docs.
//!
//! The [`VectorIndex`] trait defines the operations the context retriever
//! needs from a vector store, enabling pluggable backends (SQLite,
//! in-memory, or a remote vector database).
//!
//! Implementations must be `Send + Sync`: after the single-threaded embed
//! phase, many generation workers query the index concurrently.

pub mod memory;

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{IndexRecord, ScoredRecord};

/// Abstract similarity index.
///
/// Vectors are expected to be unit length on both insertion and query, so
/// the score returned by [`search`](VectorIndex::search) is cosine
/// similarity.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`add`](VectorIndex::add) | Insert vectors with metadata, replacing records with the same `symbol_id` |
/// | [`search`](VectorIndex::search) | Top-`k` records by descending similarity |
/// | [`retain`](VectorIndex::retain) | Drop records whose `symbol_id` is not in a set |
/// | [`len`](VectorIndex::len) | Number of stored records |
/// | [`close`](VectorIndex::close) | Release connections; idempotent |
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Store `vectors[i]` with `records[i]`.
    ///
    /// Fails if the two slices differ in length.
    async fn add(&self, vectors: &[Vec<f32>], records: &[IndexRecord]) -> Result<()>;

    /// Return at most `k` records ordered by descending score.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredRecord>>;

    /// Remove every record whose `symbol_id` is not in `keep`, returning
    /// how many were removed.
    async fn retain(&self, keep: &HashSet<String>) -> Result<usize>;

    /// Number of records currently stored.
    async fn len(&self) -> Result<usize>;

    /// Close the backend. Safe to call more than once.
    async fn close(&self) -> Result<()>;
}

/// Sort candidates by descending score and keep the first `k`.
pub fn rank(mut candidates: Vec<ScoredRecord>, k: usize) -> Vec<ScoredRecord> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.truncate(k);
    candidates
}
