//! Embedding maintenance.
//!
//! Vectors live in `chunk_vectors`, keyed by chunk id and tagged with the
//! model name and the chunk hash they were computed from. A chunk is
//! *pending* when it has no vector for the current model or its stored
//! hash no longer matches the chunk's text.

use anyhow::{bail, Result};
use sqlx::{Row, SqlitePool};

use pagetree_core::models::Chunk;

use crate::config::{Config, EmbeddingConfig};
use crate::db;
use crate::embedding;

/// Find and embed chunks that are missing or have stale embeddings.
pub async fn run_embed_pending(
    config: &Config,
    limit: Option<usize>,
    batch_size_override: Option<usize>,
    dry_run: bool,
) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let provider = embedding::create_provider(&config.embedding)?;
    let model_name = provider.model_name().to_string();
    let pool = db::connect(config).await?;
    let batch_size = batch_size_override
        .unwrap_or(config.embedding.batch_size)
        .max(1);

    let pending = find_pending_chunks(&pool, &model_name, limit).await?;

    if dry_run {
        println!("embed pending (dry-run)");
        println!("  chunks needing embeddings: {}", pending.len());
        pool.close().await;
        return Ok(());
    }

    if pending.is_empty() {
        println!("embed pending");
        println!("  all chunks up to date");
        pool.close().await;
        return Ok(());
    }

    let total = pending.len();
    let mut embedded = 0u64;
    let mut failed = 0u64;

    for batch in pending.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(|p| p.text.clone()).collect();

        match embedding::embed_texts(&config.embedding, &texts).await {
            Ok(vectors) => {
                for (item, vec) in batch.iter().zip(vectors.iter()) {
                    let blob = embedding::vec_to_blob(vec);
                    upsert_embedding(
                        &pool,
                        &item.chunk_id,
                        &model_name,
                        provider.dims(),
                        &item.hash,
                        &blob,
                    )
                    .await?;
                    embedded += 1;
                }
            }
            Err(e) => {
                tracing::warn!(batch = batch.len(), "embedding batch failed: {:#}", e);
                failed += batch.len() as u64;
            }
        }
    }

    println!("embed pending");
    println!("  total pending: {}", total);
    println!("  embedded: {}", embedded);
    println!("  failed: {}", failed);

    pool.close().await;
    Ok(())
}

/// Delete all embeddings and regenerate them for every chunk.
///
/// Useful after switching models or dimensions.
pub async fn run_embed_rebuild(config: &Config, batch_size_override: Option<usize>) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let pool = db::connect(config).await?;
    let cleared = sqlx::query("DELETE FROM chunk_vectors")
        .execute(&pool)
        .await?
        .rows_affected();
    pool.close().await;

    println!("embed rebuild: cleared {} existing embeddings", cleared);
    run_embed_pending(config, None, batch_size_override, false).await
}

/// Embed freshly upserted chunks. Non-fatal on failure.
///
/// Returns `(embedded, pending)`. Chunks whose stored vector already
/// matches their hash count as embedded without a provider call.
pub async fn embed_chunks_inline(
    config: &EmbeddingConfig,
    pool: &SqlitePool,
    chunks: &[Chunk],
) -> (u64, u64) {
    if !config.is_enabled() || chunks.is_empty() {
        return (0, 0);
    }

    let provider = match embedding::create_provider(config) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!("could not create embedding provider: {:#}", e);
            return (0, chunks.len() as u64);
        }
    };

    let model_name = provider.model_name().to_string();
    let mut embedded = 0u64;
    let mut pending = 0u64;

    for batch in chunks.chunks(config.batch_size.max(1)) {
        let mut need_embedding = Vec::new();
        for chunk in batch {
            let existing: Option<String> =
                sqlx::query_scalar("SELECT hash FROM chunk_vectors WHERE chunk_id = ? AND model = ?")
                    .bind(&chunk.id)
                    .bind(&model_name)
                    .fetch_optional(pool)
                    .await
                    .unwrap_or(None);

            if existing.as_deref() == Some(chunk.hash.as_str()) {
                embedded += 1;
                continue;
            }
            need_embedding.push(chunk);
        }

        if need_embedding.is_empty() {
            continue;
        }

        let texts: Vec<String> = need_embedding.iter().map(|c| c.text.clone()).collect();

        match embedding::embed_texts(config, &texts).await {
            Ok(vectors) => {
                for (chunk, vec) in need_embedding.iter().zip(vectors.iter()) {
                    let blob = embedding::vec_to_blob(vec);
                    if let Err(e) = upsert_embedding(
                        pool,
                        &chunk.id,
                        &model_name,
                        provider.dims(),
                        &chunk.hash,
                        &blob,
                    )
                    .await
                    {
                        tracing::warn!(chunk_id = %chunk.id, "failed to store embedding: {:#}", e);
                        pending += 1;
                    } else {
                        embedded += 1;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(batch = need_embedding.len(), "embedding batch failed: {:#}", e);
                pending += need_embedding.len() as u64;
            }
        }
    }

    (embedded, pending)
}

/// Drop vectors whose chunk no longer exists.
pub async fn prune_orphan_vectors(pool: &SqlitePool) -> Result<u64> {
    let result =
        sqlx::query("DELETE FROM chunk_vectors WHERE chunk_id NOT IN (SELECT id FROM chunks)")
            .execute(pool)
            .await?;
    Ok(result.rows_affected())
}

struct PendingChunk {
    chunk_id: String,
    text: String,
    hash: String,
}

async fn find_pending_chunks(
    pool: &SqlitePool,
    model: &str,
    limit: Option<usize>,
) -> Result<Vec<PendingChunk>> {
    let limit_val = limit.map(|l| l as i64).unwrap_or(-1);

    let rows = sqlx::query(
        r#"
        SELECT c.id AS chunk_id, c.text, c.hash
        FROM chunks c
        LEFT JOIN chunk_vectors v ON v.chunk_id = c.id AND v.model = ?
        WHERE v.chunk_id IS NULL OR v.hash != c.hash
        ORDER BY c.source_node_id, c.order_within_node
        LIMIT ?
        "#,
    )
    .bind(model)
    .bind(limit_val)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| PendingChunk {
            chunk_id: row.get("chunk_id"),
            text: row.get("text"),
            hash: row.get("hash"),
        })
        .collect())
}

async fn upsert_embedding(
    pool: &SqlitePool,
    chunk_id: &str,
    model: &str,
    dims: usize,
    hash: &str,
    blob: &[u8],
) -> Result<()> {
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        r#"
        INSERT INTO chunk_vectors (chunk_id, embedding, model, dims, hash, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(chunk_id) DO UPDATE SET
            embedding = excluded.embedding,
            model = excluded.model,
            dims = excluded.dims,
            hash = excluded.hash,
            created_at = excluded.created_at
        "#,
    )
    .bind(chunk_id)
    .bind(blob)
    .bind(model)
    .bind(dims as i64)
    .bind(hash)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::migrate_pool;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        migrate_pool(&pool).await.unwrap();
        pool
    }

    async fn insert_chunk(pool: &SqlitePool, id: &str, hash: &str) {
        sqlx::query(
            "INSERT INTO chunks (id, source_node_id, block_type, order_within_node, text, hash, indexed_at)
             VALUES (?, 'n', 'paragraph', 0, 'text', ?, 0)",
        )
        .bind(id)
        .bind(hash)
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_pending_detects_missing_and_stale() {
        let pool = memory_pool().await;
        insert_chunk(&pool, "a", "h1").await;
        insert_chunk(&pool, "b", "h2").await;
        insert_chunk(&pool, "c", "h3").await;
        upsert_embedding(&pool, "a", "m", 2, "h1", &vec_blob()).await.unwrap();
        upsert_embedding(&pool, "b", "m", 2, "old", &vec_blob()).await.unwrap();

        let pending = find_pending_chunks(&pool, "m", None).await.unwrap();
        let ids: Vec<&str> = pending.iter().map(|p| p.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);

        let limited = find_pending_chunks(&pool, "m", Some(1)).await.unwrap();
        assert_eq!(limited.len(), 1);

        // A different model makes every chunk pending.
        assert_eq!(find_pending_chunks(&pool, "other", None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_prune_orphans() {
        let pool = memory_pool().await;
        insert_chunk(&pool, "a", "h1").await;
        upsert_embedding(&pool, "a", "m", 2, "h1", &vec_blob()).await.unwrap();
        upsert_embedding(&pool, "gone", "m", 2, "h9", &vec_blob()).await.unwrap();

        assert_eq!(prune_orphan_vectors(&pool).await.unwrap(), 1);
        let left: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunk_vectors")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(left, 1);
    }

    #[tokio::test]
    async fn test_inline_disabled_is_noop() {
        let pool = memory_pool().await;
        let (embedded, pending) = embed_chunks_inline(&EmbeddingConfig::default(), &pool, &[]).await;
        assert_eq!((embedded, pending), (0, 0));
    }

    fn vec_blob() -> Vec<u8> {
        embedding::vec_to_blob(&[0.5, 0.5])
    }
}
