//! Index statistics.
//!
//! Summary of what's indexed: chunk counts, embedding coverage, and a
//! per-node breakdown. Used by `ptree stats`.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;

/// Per-node breakdown of chunk counts.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeStats {
    pub node_id: String,
    /// Last entry of the stored title path.
    pub title: String,
    pub chunk_count: i64,
    pub embedded_count: i64,
    pub last_indexed_ts: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexStats {
    pub total_chunks: i64,
    pub total_embedded: i64,
    pub nodes: Vec<NodeStats>,
}

pub async fn collect_stats(pool: &SqlitePool) -> Result<IndexStats> {
    let total_chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
        .fetch_one(pool)
        .await?;

    let total_embedded: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM chunk_vectors v JOIN chunks c ON c.id = v.chunk_id AND c.hash = v.hash",
    )
    .fetch_one(pool)
    .await?;

    let rows = sqlx::query(
        r#"
        SELECT
            c.source_node_id,
            MIN(c.page_title_path) AS title_path,
            COUNT(c.id) AS chunk_count,
            COUNT(v.chunk_id) AS embedded_count,
            MAX(c.indexed_at) AS last_indexed
        FROM chunks c
        LEFT JOIN chunk_vectors v ON v.chunk_id = c.id AND v.hash = c.hash
        GROUP BY c.source_node_id
        ORDER BY chunk_count DESC, c.source_node_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    let nodes = rows
        .iter()
        .map(|row| {
            let title_path: String = row.get("title_path");
            let title = serde_json::from_str::<Vec<String>>(&title_path)
                .ok()
                .and_then(|p| p.last().cloned())
                .unwrap_or_default();
            NodeStats {
                node_id: row.get("source_node_id"),
                title,
                chunk_count: row.get("chunk_count"),
                embedded_count: row.get("embedded_count"),
                last_indexed_ts: row.get("last_indexed"),
            }
        })
        .collect();

    Ok(IndexStats {
        total_chunks,
        total_embedded,
        nodes,
    })
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let stats = collect_stats(&pool).await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("pagetree index stats");
    println!("======================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Nodes:       {}", stats.nodes.len());
    println!("  Chunks:      {}", stats.total_chunks);
    println!(
        "  Embedded:    {} / {} ({}%)",
        stats.total_embedded,
        stats.total_chunks,
        if stats.total_chunks > 0 {
            (stats.total_embedded * 100) / stats.total_chunks
        } else {
            0
        }
    );

    if !stats.nodes.is_empty() {
        println!();
        println!("  By node:");
        println!(
            "  {:<36} {:<24} {:>8} {:>10}   {}",
            "NODE", "TITLE", "CHUNKS", "EMBEDDED", "INDEXED"
        );
        println!("  {}", "-".repeat(96));

        for n in &stats.nodes {
            println!(
                "  {:<36} {:<24} {:>8} {:>10}   {}",
                n.node_id,
                truncate(&n.title, 24),
                n.chunk_count,
                n.embedded_count,
                format_ts_relative(n.last_indexed_ts)
            );
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;

    if delta < 0 {
        format_ts_iso(ts)
    } else if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
