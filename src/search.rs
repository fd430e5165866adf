//! Similarity search over the SQLite index.
//!
//! Thin layer over [`SqliteSink::query`](pagetree_core::sink::IndexSink::query):
//! applies the configured `top_k` default and bounds, then shapes hits
//! into the response returned by the HTTP service and printed by the CLI.

use anyhow::{bail, Result};
use serde::Serialize;

use pagetree_core::models::ChunkMetadata;
use pagetree_core::sink::{IndexSink, QueryHit};

use crate::config::{Config, RetrievalConfig};
use crate::sqlite_sink::SqliteSink;

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub rank: usize,
    pub id: String,
    pub document: String,
    pub similarity_score: f64,
    pub metadata: ChunkMetadata,
}

impl From<QueryHit> for SearchResult {
    fn from(hit: QueryHit) -> Self {
        Self {
            rank: hit.rank,
            id: hit.chunk_id,
            document: hit.text,
            similarity_score: hit.score,
            metadata: hit.metadata,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub success: bool,
    pub message: String,
    pub query: String,
    pub top_k: usize,
    pub results: Vec<SearchResult>,
}

/// Validation failure the caller can fix, as opposed to a backend error.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct InvalidQuery(pub String);

/// Resolve and bounds-check the requested `top_k`.
pub fn resolve_top_k(retrieval: &RetrievalConfig, top_k: Option<usize>) -> Result<usize> {
    let k = top_k.unwrap_or(retrieval.default_top_k);
    if k < 1 || k > retrieval.max_top_k {
        bail!(InvalidQuery(format!(
            "top_k must be between 1 and {}",
            retrieval.max_top_k
        )));
    }
    Ok(k)
}

/// Search `sink` for `query`.
///
/// An empty query or out-of-range `top_k` fails with [`InvalidQuery`].
pub async fn search_with<S: IndexSink + ?Sized>(
    sink: &S,
    retrieval: &RetrievalConfig,
    query: &str,
    top_k: Option<usize>,
) -> Result<SearchResponse> {
    if query.trim().is_empty() {
        bail!(InvalidQuery("query must not be empty".to_string()));
    }
    let top_k = resolve_top_k(retrieval, top_k)?;

    let hits = sink.query(query, top_k).await?;
    let results: Vec<SearchResult> = hits.into_iter().map(SearchResult::from).collect();

    Ok(SearchResponse {
        success: true,
        message: format!("Found {} matching documents", results.len()),
        query: query.to_string(),
        top_k,
        results,
    })
}

/// Search the configured database.
pub async fn search_chunks(
    config: &Config,
    query: &str,
    top_k: Option<usize>,
) -> Result<SearchResponse> {
    let sink = SqliteSink::connect(config).await?;
    let response = search_with(&sink, &config.retrieval, query, top_k).await;
    sink.close().await;
    response
}

/// CLI entry point for `ptree search`.
pub async fn run_search(config: &Config, query: &str, top_k: Option<usize>) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let response = search_chunks(config, query, top_k).await?;
    if response.results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for r in &response.results {
        let path = r.metadata.page_title_path.join(" / ");
        println!("{}. [{:.2}] {}", r.rank, r.similarity_score, path);
        if !r.metadata.active_headings.is_empty() {
            println!("    section: {}", r.metadata.active_headings.join(" > "));
        }
        if !r.metadata.last_updated.is_empty() {
            println!("    updated: {}", r.metadata.last_updated);
        }
        println!("    type: {}", r.metadata.block_type);
        println!(
            "    excerpt: \"{}\"",
            excerpt(&r.document, 240).replace('\n', " ").trim()
        );
        println!("    id: {}", r.id);
        println!();
    }
    Ok(())
}

/// First `max_chars` characters of `text`, with `…` when cut.
fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
