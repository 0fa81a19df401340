//! Context Retriever.
//!
//! Embeds every symbol once per run and answers "which symbols are most
//! like this one" for the generation prompts. Vectors are normalized
//! before insertion and before querying, so the index's cosine score and
//! a dot product agree.

use anyhow::{anyhow, bail, Result};
use std::collections::HashSet;
use std::sync::Arc;

use agentic_docs_core::embedding::{normalized, Embedder};
use agentic_docs_core::models::{IndexRecord, Neighbor, Symbol};
use agentic_docs_core::store::VectorIndex;

pub struct ContextRetriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    batch_size: usize,
}

impl ContextRetriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>, batch_size: usize) -> Self {
        Self {
            embedder,
            index,
            batch_size: batch_size.max(1),
        }
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Embed and store all `symbols`, first dropping records for symbols
    /// that are not in this run. Any embedding error aborts: without
    /// vectors no context can be built.
    pub async fn embed_and_store(&self, symbols: &[Symbol]) -> Result<usize> {
        let current: HashSet<String> = symbols.iter().map(|s| s.symbol_id.clone()).collect();
        let pruned = self.index.retain(&current).await?;
        if pruned > 0 {
            tracing::info!(pruned, "dropped index records for removed symbols");
        }

        let mut stored = 0;
        for batch in symbols.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|s| s.embedding_text().to_string()).collect();
            let vectors = self.embedder.embed(&texts).await?;
            if vectors.len() != texts.len() {
                bail!(
                    "embedder returned {} vectors for {} texts",
                    vectors.len(),
                    texts.len()
                );
            }

            let vectors: Vec<Vec<f32>> = vectors.iter().map(|v| normalized(v)).collect();
            let records: Vec<IndexRecord> = batch.iter().map(IndexRecord::from).collect();
            self.index.add(&vectors, &records).await?;
            stored += batch.len();
            tracing::debug!(stored, total = symbols.len(), "embedded batch");
        }
        Ok(stored)
    }

    /// The `k` nearest symbols to `symbol`, by descending score, never
    /// including `symbol` itself.
    pub async fn retrieve(&self, symbol: &Symbol, k: usize) -> Result<Vec<Neighbor>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let query = self
            .embedder
            .embed(&[symbol.embedding_text().to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Empty embedding response"))?;

        let hits = self.index.search(&normalized(&query), k + 1).await?;
        Ok(hits
            .into_iter()
            .filter(|hit| hit.record.qualname != symbol.qualname)
            .take(k)
            .map(|hit| Neighbor {
                qualname: hit.record.qualname,
                score: hit.score,
            })
            .collect())
    }
}

/// Render neighbors for a prompt, one `- qualname (score 0.83)` per line.
pub fn format_context(neighbors: &[Neighbor]) -> String {
    neighbors
        .iter()
        .map(|n| format!("- {} (score {:.2})", n.qualname, n.score))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentic_docs_core::models::SymbolKind;
    use agentic_docs_core::store::memory::InMemoryIndex;
    use async_trait::async_trait;

    /// Maps the first character of each text to an axis.
    struct AxisEmbedder;

    #[async_trait]
    impl Embedder for AxisEmbedder {
        fn model_name(&self) -> &str {
            "axis"
        }
        fn dims(&self) -> usize {
            3
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| match t.chars().next() {
                    Some('a') => vec![2.0, 0.1, 0.0],
                    Some('b') => vec![1.0, 0.3, 0.0],
                    _ => vec![0.0, 0.0, 5.0],
                })
                .collect())
        }
    }

    struct ShortEmbedder;

    #[async_trait]
    impl Embedder for ShortEmbedder {
        fn model_name(&self) -> &str {
            "short"
        }
        fn dims(&self) -> usize {
            1
        }
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(Vec::new())
        }
    }

    fn symbol(name: &str, doc: &str) -> Symbol {
        Symbol {
            symbol_id: name.into(),
            kind: SymbolKind::Function,
            file: "src/m.py".into(),
            qualname: name.into(),
            parent: Some("m".into()),
            signature: None,
            docstring: Some(doc.into()),
            start: 1,
            end: 2,
            content_hash: "h".into(),
            decorators: vec![],
        }
    }

    #[tokio::test]
    async fn retrieve_excludes_self_and_caps_at_k() {
        let retriever = ContextRetriever::new(Arc::new(AxisEmbedder), Arc::new(InMemoryIndex::new()), 2);
        let symbols = vec![
            symbol("m.a", "alpha"),
            symbol("m.b", "beta"),
            symbol("m.c", "gamma"),
        ];
        assert_eq!(retriever.embed_and_store(&symbols).await.unwrap(), 3);

        let neighbors = retriever.retrieve(&symbols[0], 1).await.unwrap();
        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].qualname, "m.b");

        let all = retriever.retrieve(&symbols[0], 5).await.unwrap();
        assert!(all.iter().all(|n| n.qualname != "m.a"));
        assert_eq!(all.len(), 2);
        assert!(all[0].score >= all[1].score);
    }

    #[tokio::test]
    async fn removed_symbols_stop_appearing_as_neighbors() {
        let index = Arc::new(InMemoryIndex::new());
        let first = ContextRetriever::new(Arc::new(AxisEmbedder), index.clone(), 2);
        first
            .embed_and_store(&[symbol("m.a", "alpha"), symbol("m.b", "beta")])
            .await
            .unwrap();

        let second = ContextRetriever::new(Arc::new(AxisEmbedder), index.clone(), 2);
        let keep = symbol("m.c", "gamma");
        second
            .embed_and_store(&[symbol("m.a", "alpha"), keep.clone()])
            .await
            .unwrap();
        assert_eq!(index.len().await.unwrap(), 2);

        let neighbors = second.retrieve(&keep, 5).await.unwrap();
        let names: Vec<_> = neighbors.iter().map(|n| n.qualname.as_str()).collect();
        assert_eq!(names, vec!["m.a"]);
    }

    #[tokio::test]
    async fn vector_count_mismatch_is_fatal() {
        let retriever = ContextRetriever::new(Arc::new(ShortEmbedder), Arc::new(InMemoryIndex::new()), 8);
        let err = retriever
            .embed_and_store(&[symbol("m.a", "alpha")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("0 vectors for 1 texts"));
    }

    #[test]
    fn context_lines() {
        let text = format_context(&[
            Neighbor { qualname: "m.a".into(), score: 0.834 },
            Neighbor { qualname: "m.b".into(), score: 0.5 },
        ]);
        assert_eq!(text, "- m.a (score 0.83)\n- m.b (score 0.50)");
    }
}
