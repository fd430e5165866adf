//! Ingestion pipeline orchestration.
//!
//! Coordinates one ingestion pass: walk, then replace the chunks of every
//! visited node through [`IndexSink::replace_nodes`].
//!
//! Every node the walk fetched successfully loses its old chunks,
//! including nodes that now produce no chunks. Nodes whose fetch failed
//! keep whatever was indexed for them before. When the sink cannot write
//! the new chunks, nothing is removed. The HTTP service and the CLI share [`ingest_node`].

use anyhow::Result;
use serde::Serialize;

use pagetree_core::chunk::OversizeGuard;
use pagetree_core::fetch::TreeFetcher;
use pagetree_core::sink::IndexSink;
use pagetree_core::walker::{NodeFailure, TreeWalker};

use crate::config::Config;
use crate::notion::NotionFetcher;
use crate::sqlite_sink::SqliteSink;

/// Result of one ingestion pass.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub success: bool,
    pub message: String,
    pub node_id: String,
    pub chunks_extracted: usize,
    pub chunks_inserted: usize,
    pub chunks_deleted: usize,
    pub nodes_visited: usize,
    pub failures: Vec<NodeFailure>,
}

impl IngestReport {
    fn failed(node_id: &str, message: String) -> Self {
        Self {
            success: false,
            message,
            node_id: node_id.to_string(),
            chunks_extracted: 0,
            chunks_inserted: 0,
            chunks_deleted: 0,
            nodes_visited: 0,
            failures: Vec::new(),
        }
    }
}

/// Ingest the tree under `node_id` from `fetcher` into `sink`.
///
/// Never fails: every problem is reported through
/// [`IngestReport::success`] and [`IngestReport::message`].
pub async fn ingest_with<F, S>(
    fetcher: &F,
    sink: &S,
    node_id: &str,
    guard: OversizeGuard,
) -> IngestReport
where
    F: TreeFetcher + ?Sized,
    S: IndexSink + ?Sized,
{
    tracing::info!(node_id, "ingestion started");

    let outcome = match TreeWalker::new(fetcher).with_guard(guard).walk(node_id).await {
        Ok(o) => o,
        Err(e) => {
            tracing::warn!(node_id, error = %e.source, "ingestion aborted");
            return IngestReport::failed(node_id, format!("{}: {}", e, e.source));
        }
    };

    let mut report = IngestReport {
        success: true,
        message: String::new(),
        node_id: node_id.to_string(),
        chunks_extracted: outcome.chunks.len(),
        chunks_inserted: 0,
        chunks_deleted: 0,
        nodes_visited: outcome.nodes_visited(),
        failures: outcome.failures.clone(),
    };

    let node_ids: Vec<String> = outcome.visited.iter().map(|v| v.node_id.clone()).collect();
    match sink.replace_nodes(&node_ids, &outcome.chunks).await {
        Ok((deleted, inserted)) => {
            report.chunks_deleted = deleted;
            report.chunks_inserted = inserted;
        }
        Err(e) => {
            tracing::warn!(node_id, "replacing chunks failed: {}", e);
            report.success = false;
            report.message = format!("Failed to store chunks: {}", e);
            return report;
        }
    }

    report.message = if outcome.is_partial() {
        format!(
            "Ingested {} chunks from {} nodes; {} subtrees skipped",
            report.chunks_inserted,
            report.nodes_visited,
            report.failures.len()
        )
    } else {
        format!(
            "Ingested {} chunks from {} nodes",
            report.chunks_inserted, report.nodes_visited
        )
    };

    tracing::info!(
        node_id,
        extracted = report.chunks_extracted,
        inserted = report.chunks_inserted,
        deleted = report.chunks_deleted,
        nodes = report.nodes_visited,
        failures = report.failures.len(),
        "ingestion finished"
    );
    report
}

/// Ingest `node_id` using the configured Notion fetcher and SQLite sink.
///
/// Fails only when the fetcher or sink cannot be constructed (missing
/// secret, unreadable database).
pub async fn ingest_node(config: &Config, node_id: &str) -> Result<IngestReport> {
    let fetcher = NotionFetcher::from_config(&config.notion)?;
    let sink = SqliteSink::connect(config).await?;
    let report = ingest_with(&fetcher, &sink, node_id, config.chunking.guard()).await;
    sink.close().await;
    Ok(report)
}

/// CLI entry point for `ptree ingest`.
pub async fn run_ingest(config: &Config, node_id: &str, dry_run: bool, print: bool) -> Result<()> {
    if dry_run {
        let fetcher = NotionFetcher::from_config(&config.notion)?;
        let outcome = TreeWalker::new(&fetcher)
            .with_guard(config.chunking.guard())
            .walk(node_id)
            .await
            .map_err(|e| anyhow::anyhow!("{}: {}", e, e.source))?;

        println!("ingest {} (dry-run)", node_id);
        println!("  nodes visited: {}", outcome.nodes_visited());
        println!("  chunks extracted: {}", outcome.chunks.len());
        for f in &outcome.failures {
            println!("  skipped: {} ({}): {}", f.node_id, f.title, f.message);
        }
        if print {
            println!("{}", serde_json::to_string_pretty(&outcome.chunks)?);
        }
        return Ok(());
    }

    let report = ingest_node(config, node_id).await?;

    println!("ingest {}", node_id);
    println!("  nodes visited: {}", report.nodes_visited);
    println!("  chunks extracted: {}", report.chunks_extracted);
    println!("  chunks deleted: {}", report.chunks_deleted);
    println!("  chunks inserted: {}", report.chunks_inserted);
    for f in &report.failures {
        println!("  skipped: {} ({}): {}", f.node_id, f.title, f.message);
    }
    if report.success {
        println!("ok");
    } else {
        anyhow::bail!("{}", report.message);
    }
    Ok(())
}
