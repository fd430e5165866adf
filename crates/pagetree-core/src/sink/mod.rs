//! Index sink abstraction.
//!
//! An [`IndexSink`] persists chunks and answers similarity queries over
//! them. The app crate provides a SQLite implementation; [`memory`] holds
//! an in-process one.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::SinkError;
use crate::models::{Chunk, ChunkMetadata};

/// One ranked query result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryHit {
    /// 1-based position in the result list.
    pub rank: usize,
    pub chunk_id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    /// Relevance in `[0.0, 1.0]`. Higher is better.
    pub score: f64,
}

/// Persistent store for chunks.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert`](IndexSink::upsert) | Insert or overwrite chunks by id |
/// | [`delete_by_source_node`](IndexSink::delete_by_source_node) | Drop one node's chunks before re-insertion |
/// | [`replace_nodes`](IndexSink::replace_nodes) | Swap the chunk sets of several nodes in one step |
/// | [`query`](IndexSink::query) | Ranked similarity search |
/// | [`clear`](IndexSink::clear) | Drop everything |
/// | [`count`](IndexSink::count) | Number of stored chunks |
#[async_trait]
pub trait IndexSink: Send + Sync {
    /// Insert or overwrite `chunks`, keyed by chunk id. Returns the number
    /// of chunks written. Upserting the same chunk twice leaves one copy.
    async fn upsert(&self, chunks: &[Chunk]) -> Result<usize, SinkError>;

    /// Delete every chunk whose `source_node_id` is `node_id`. Returns the
    /// number deleted.
    async fn delete_by_source_node(&self, node_id: &str) -> Result<usize, SinkError>;

    /// Delete every chunk belonging to `node_ids`, then write `chunks`.
    /// Returns `(deleted, inserted)`.
    ///
    /// Backends that can should override this so a failure leaves the
    /// previous chunks in place. The default runs the two steps one after
    /// the other and is not atomic.
    async fn replace_nodes(
        &self,
        node_ids: &[String],
        chunks: &[Chunk],
    ) -> Result<(usize, usize), SinkError> {
        let mut deleted = 0;
        for node_id in node_ids {
            deleted += self.delete_by_source_node(node_id).await?;
        }
        let inserted = self.upsert(chunks).await?;
        Ok((deleted, inserted))
    }

    /// Up to `top_k` hits for `text`, best first.
    ///
    /// Fails with [`SinkError::InvalidRequest`] for a blank query or a
    /// `top_k` of zero.
    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<QueryHit>, SinkError>;

    /// Delete every chunk. Returns the number deleted.
    async fn clear(&self) -> Result<usize, SinkError>;

    async fn count(&self) -> Result<usize, SinkError>;
}

/// Reject queries no sink can answer.
pub fn validate_query(text: &str, top_k: usize) -> Result<(), SinkError> {
    if text.trim().is_empty() {
        return Err(SinkError::InvalidRequest("query must not be empty".into()));
    }
    if top_k == 0 {
        return Err(SinkError::InvalidRequest("top_k must be at least 1".into()));
    }
    Ok(())
}

/// Split text into distinct lowercase alphanumeric terms, in first-seen
/// order.
pub fn query_terms(text: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for raw in text.split(|c: char| !c.is_alphanumeric()) {
        if raw.is_empty() {
            continue;
        }
        let term = raw.to_lowercase();
        if !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms
}
