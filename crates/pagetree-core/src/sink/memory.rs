//! In-memory [`IndexSink`] for tests and embedders of the core crate.
//!
//! Chunks live in a `BTreeMap` behind `std::sync::RwLock`. Queries score
//! each chunk by the fraction of distinct query terms its text contains.

use std::collections::{BTreeMap, HashSet};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use super::{query_terms, validate_query, IndexSink, QueryHit};
use crate::error::SinkError;
use crate::models::Chunk;
use crate::search::{sort_scored, ScoredChunk};

#[derive(Debug, Default)]
pub struct InMemorySink {
    chunks: RwLock<BTreeMap<String, Chunk>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored chunk, ordered by id.
    pub fn chunks(&self) -> Vec<Chunk> {
        self.chunks
            .read()
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn get(&self, id: &str) -> Option<Chunk> {
        self.chunks.read().ok().and_then(|m| m.get(id).cloned())
    }
}

fn poisoned<T>(_: PoisonError<T>) -> SinkError {
    SinkError::Backend(anyhow::anyhow!("in-memory sink lock poisoned"))
}

#[async_trait]
impl IndexSink for InMemorySink {
    async fn upsert(&self, chunks: &[Chunk]) -> Result<usize, SinkError> {
        let mut stored = self.chunks.write().map_err(poisoned)?;
        for c in chunks {
            stored.insert(c.id.clone(), c.clone());
        }
        Ok(chunks.len())
    }

    async fn delete_by_source_node(&self, node_id: &str) -> Result<usize, SinkError> {
        let mut stored = self.chunks.write().map_err(poisoned)?;
        let before = stored.len();
        stored.retain(|_, c| c.source_node_id != node_id);
        Ok(before - stored.len())
    }

    async fn replace_nodes(
        &self,
        node_ids: &[String],
        chunks: &[Chunk],
    ) -> Result<(usize, usize), SinkError> {
        let mut stored = self.chunks.write().map_err(poisoned)?;
        let before = stored.len();
        stored.retain(|_, c| !node_ids.contains(&c.source_node_id));
        let deleted = before - stored.len();
        for c in chunks {
            stored.insert(c.id.clone(), c.clone());
        }
        Ok((deleted, chunks.len()))
    }

    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<QueryHit>, SinkError> {
        validate_query(text, top_k)?;
        let terms = query_terms(text);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let stored = self.chunks.read().map_err(poisoned)?;
        let mut scored: Vec<ScoredChunk> = stored
            .values()
            .filter_map(|c| {
                let words: HashSet<String> = query_terms(&c.text).into_iter().collect();
                let matched = terms.iter().filter(|t| words.contains(*t)).count();
                if matched == 0 {
                    return None;
                }
                let score = matched as f64 / terms.len() as f64;
                Some(ScoredChunk {
                    chunk_id: c.id.clone(),
                    score,
                    keyword_score: score,
                    vector_score: 0.0,
                })
            })
            .collect();
        sort_scored(&mut scored);
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .enumerate()
            .filter_map(|(i, s)| {
                stored.get(&s.chunk_id).map(|c| QueryHit {
                    rank: i + 1,
                    chunk_id: c.id.clone(),
                    text: c.text.clone(),
                    metadata: c.metadata(),
                    score: s.score,
                })
            })
            .collect())
    }

    async fn clear(&self) -> Result<usize, SinkError> {
        let mut stored = self.chunks.write().map_err(poisoned)?;
        let n = stored.len();
        stored.clear();
        Ok(n)
    }

    async fn count(&self) -> Result<usize, SinkError> {
        Ok(self.chunks.read().map_err(poisoned)?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{build_node_chunks, OversizeGuard};
    use crate::models::{Block, BlockType};

    fn chunks_for(node: &str, texts: &[&str]) -> Vec<Chunk> {
        let blocks: Vec<Block> = texts
            .iter()
            .map(|t| Block::new(BlockType::Paragraph, *t))
            .collect();
        build_node_chunks(node, &[], &blocks, &OversizeGuard::default())
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_by_id() {
        let sink = InMemorySink::new();
        let chunks = chunks_for("n", &["alpha", "beta"]);
        assert_eq!(sink.upsert(&chunks).await.unwrap(), 2);
        assert_eq!(sink.upsert(&chunks).await.unwrap(), 2);
        assert_eq!(sink.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_upsert_overwrites_text() {
        let sink = InMemorySink::new();
        sink.upsert(&chunks_for("n", &["old"])).await.unwrap();
        sink.upsert(&chunks_for("n", &["new"])).await.unwrap();
        assert_eq!(sink.get("n-0").unwrap().text, "new");
    }

    #[tokio::test]
    async fn test_delete_by_source_node() {
        let sink = InMemorySink::new();
        sink.upsert(&chunks_for("a", &["1", "2"])).await.unwrap();
        sink.upsert(&chunks_for("b", &["3"])).await.unwrap();
        assert_eq!(sink.delete_by_source_node("a").await.unwrap(), 2);
        assert_eq!(sink.delete_by_source_node("a").await.unwrap(), 0);
        assert_eq!(sink.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_replace_nodes_swaps_only_named_nodes() {
        let sink = InMemorySink::new();
        sink.upsert(&chunks_for("a", &["1", "2"])).await.unwrap();
        sink.upsert(&chunks_for("b", &["3"])).await.unwrap();

        let (deleted, inserted) = sink
            .replace_nodes(&["a".to_string()], &chunks_for("a", &["1 edited"]))
            .await
            .unwrap();
        assert_eq!((deleted, inserted), (2, 1));
        assert!(sink.get("a-1").is_none());
        assert_eq!(sink.get("a-0").unwrap().text, "1 edited");
        assert!(sink.get("b-0").is_some());
    }

    #[tokio::test]
    async fn test_query_ranks_by_overlap() {
        let sink = InMemorySink::new();
        sink.upsert(&chunks_for(
            "n",
            &["rust async runtime", "rust only", "python asyncio"],
        ))
        .await
        .unwrap();

        let hits = sink.query("Rust async", 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk_id, "n-0");
        assert_eq!(hits[0].rank, 1);
        assert!((hits[0].score - 1.0).abs() < 1e-9);
        assert_eq!(hits[1].chunk_id, "n-1");
        assert!((hits[1].score - 0.5).abs() < 1e-9);
        assert_eq!(hits[1].metadata.source_node_id, "n");
    }

    #[tokio::test]
    async fn test_query_respects_top_k_and_rejects_blank() {
        let sink = InMemorySink::new();
        sink.upsert(&chunks_for("n", &["x y", "x", "x z"])).await.unwrap();
        assert_eq!(sink.query("x", 2).await.unwrap().len(), 2);
        assert!(sink.query("", 2).await.is_err());
        assert!(sink.query("x", 0).await.is_err());
    }

    #[tokio::test]
    async fn test_clear() {
        let sink = InMemorySink::new();
        sink.upsert(&chunks_for("n", &["a", "b", "c"])).await.unwrap();
        assert_eq!(sink.clear().await.unwrap(), 3);
        assert_eq!(sink.count().await.unwrap(), 0);
    }
}
