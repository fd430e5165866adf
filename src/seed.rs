//! Demo corpus management: `seed` and `clear`.
//!
//! The corpus is 120 short topical documents in 12 categories, compiled
//! into the binary from `seed_corpus.tsv` (`category<TAB>text` per line).
//! Each document becomes one chunk with id `doc_NNN` under the synthetic
//! source node `seed`, so seeding twice leaves one copy of each.

use anyhow::{bail, Result};
use serde::Serialize;

use pagetree_core::chunk::content_hash;
use pagetree_core::models::{BlockType, Chunk};
use pagetree_core::sink::IndexSink;

use crate::config::Config;
use crate::sqlite_sink::SqliteSink;

/// `source_node_id` shared by every seeded chunk.
pub const SEED_NODE_ID: &str = "seed";

const CORPUS: &str = include_str!("seed_corpus.tsv");

#[derive(Debug, Clone, Serialize)]
pub struct SeedResponse {
    pub success: bool,
    pub message: String,
    pub total_documents: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub success: bool,
    pub message: String,
    pub deleted: usize,
}

/// Parse the embedded corpus into chunks.
pub fn seed_chunks() -> Result<Vec<Chunk>> {
    parse_corpus(CORPUS)
}

fn parse_corpus(corpus: &str) -> Result<Vec<Chunk>> {
    let mut chunks = Vec::new();
    for (lineno, line) in corpus.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let Some((category, text)) = line.split_once('\t') else {
            bail!("seed corpus line {} has no category column", lineno + 1);
        };
        let order = chunks.len();
        chunks.push(Chunk {
            id: format!("doc_{:03}", order + 1),
            hash: content_hash(text),
            text: text.to_string(),
            source_node_id: SEED_NODE_ID.to_string(),
            source_block_id: None,
            page_title_path: vec![category.to_string()],
            active_headings: Vec::new(),
            block_type: BlockType::Paragraph,
            order_within_node: order,
            last_updated: String::new(),
        });
    }
    Ok(chunks)
}

pub async fn seed_with<S: IndexSink + ?Sized>(sink: &S) -> Result<SeedResponse> {
    let chunks = seed_chunks()?;
    let written = sink.upsert(&chunks).await?;
    tracing::info!(documents = written, "seeded demo corpus");
    Ok(SeedResponse {
        success: true,
        message: format!("Database seeded with {} documents", written),
        total_documents: written,
    })
}

pub async fn clear_with<S: IndexSink + ?Sized>(sink: &S) -> Result<ClearResponse> {
    let deleted = sink.clear().await?;
    tracing::info!(deleted, "cleared index");
    Ok(ClearResponse {
        success: true,
        message: "Database cleared successfully".to_string(),
        deleted,
    })
}

/// CLI entry point for `ptree seed`.
pub async fn run_seed(config: &Config) -> Result<()> {
    let sink = SqliteSink::connect(config).await?;
    let resp = seed_with(&sink).await;
    sink.close().await;
    let resp = resp?;
    println!("seed");
    println!("  documents: {}", resp.total_documents);
    println!("ok");
    Ok(())
}

/// CLI entry point for `ptree clear`.
pub async fn run_clear(config: &Config) -> Result<()> {
    let sink = SqliteSink::connect(config).await?;
    let resp = clear_with(&sink).await;
    sink.close().await;
    let resp = resp?;
    println!("clear");
    println!("  deleted chunks: {}", resp.deleted);
    println!("ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagetree_core::sink::memory::InMemorySink;

    #[test]
    fn test_corpus_shape() {
        let chunks = seed_chunks().unwrap();
        assert_eq!(chunks.len(), 120);
        assert_eq!(chunks[0].id, "doc_001");
        assert_eq!(chunks[119].id, "doc_120");
        assert_eq!(chunks[0].page_title_path, vec!["Technology & Programming"]);
        assert!(chunks.iter().all(|c| c.source_node_id == SEED_NODE_ID));
        assert!(chunks
            .iter()
            .enumerate()
            .all(|(i, c)| c.order_within_node == i));
    }

    #[test]
    fn test_malformed_line_rejected() {
        assert!(parse_corpus("Cat\tgood\nno tab here\n").is_err());
        assert_eq!(parse_corpus("Cat\tgood\n\n").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_seed_is_idempotent_and_clear_empties() {
        let sink = InMemorySink::new();
        let first = seed_with(&sink).await.unwrap();
        assert_eq!(first.message, "Database seeded with 120 documents");
        seed_with(&sink).await.unwrap();
        assert_eq!(sink.count().await.unwrap(), 120);

        let cleared = clear_with(&sink).await.unwrap();
        assert_eq!(cleared.deleted, 120);
        assert_eq!(cleared.message, "Database cleared successfully");
        assert_eq!(sink.count().await.unwrap(), 0);
    }
}
