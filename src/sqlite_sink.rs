//! SQLite-backed [`IndexSink`].
//!
//! Chunks are stored as rows in `chunks` with their JSON-encoded title
//! path and headings, mirrored into the FTS5 table `chunks_fts` for
//! keyword retrieval. When an embedding provider is configured, vectors
//! are computed after each upsert and stored in `chunk_vectors`.
//!
//! # Query
//!
//! 1. Keyword arm: FTS5 BM25 over the distinct query terms, each quoted
//!    and OR-ed, so user input never reaches the FTS5 query grammar.
//! 2. Vector arm (embeddings enabled): cosine similarity between the
//!    query vector and every vector whose hash matches its chunk.
//! 3. [`hybrid_merge`] of both arms. With embeddings disabled, or when
//!    the query cannot be embedded, alpha is `0.0` and the ranking is the
//!    keyword ranking.
//!
//! # Vectors across re-ingestion
//!
//! [`delete_by_source_node`](IndexSink::delete_by_source_node) leaves
//! vectors in place. The following upsert reuses any vector whose hash
//! still matches, then prunes vectors for chunks that no longer exist.
//!
//! [`replace_nodes`](IndexSink::replace_nodes) runs the deletes and the
//! writes in one transaction, so a failed write keeps the old chunks and
//! concurrent ingestions of the same node are serialized by SQLite.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{Row, SqlitePool};

use pagetree_core::error::SinkError;
use pagetree_core::models::{BlockType, Chunk};
use pagetree_core::search::{hybrid_merge, ChunkCandidate};
use pagetree_core::sink::{query_terms, validate_query, IndexSink, QueryHit};

use crate::config::{Config, EmbeddingConfig, RetrievalConfig};
use crate::db;
use crate::embed_cmd;
use crate::embedding;
use crate::migrate;

pub struct SqliteSink {
    pool: SqlitePool,
    retrieval: RetrievalConfig,
    embedding: EmbeddingConfig,
}

impl SqliteSink {
    /// Wrap an existing pool. The schema must already exist.
    pub fn new(pool: SqlitePool, config: &Config) -> Self {
        Self {
            pool,
            retrieval: config.retrieval.clone(),
            embedding: config.embedding.clone(),
        }
    }

    /// Open the configured database and make sure the schema exists.
    pub async fn connect(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::migrate_pool(&pool).await?;
        Ok(Self::new(pool, config))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(self) {
        self.pool.close().await;
    }

    pub async fn get(&self, id: &str) -> Result<Option<Chunk>> {
        let row = sqlx::query(&format!("SELECT {} FROM chunks WHERE id = ?", CHUNK_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_chunk).transpose()
    }

    /// Every chunk of one node, in reading order.
    pub async fn chunks_for_node(&self, node_id: &str) -> Result<Vec<Chunk>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM chunks WHERE source_node_id = ? ORDER BY order_within_node",
            CHUNK_COLUMNS
        ))
        .bind(node_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_chunk).collect()
    }

    async fn write_chunks(&self, chunks: &[Chunk]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let written = insert_chunk_rows(&mut *tx, chunks).await?;
        tx.commit().await?;
        Ok(written)
    }

    async fn remove_node(&self, node_id: &str) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let deleted = delete_node_rows(&mut *tx, node_id).await?;
        tx.commit().await?;
        Ok(deleted)
    }

    /// Delete `node_ids` and write `chunks` in one transaction. On error
    /// nothing is committed.
    async fn replace(&self, node_ids: &[String], chunks: &[Chunk]) -> Result<(usize, usize)> {
        let mut tx = self.pool.begin().await?;
        let mut deleted = 0;
        for node_id in node_ids {
            deleted += delete_node_rows(&mut *tx, node_id).await?;
        }
        let inserted = insert_chunk_rows(&mut *tx, chunks).await?;
        tx.commit().await?;
        Ok((deleted, inserted))
    }

    /// Embed freshly written chunks and drop vectors left without a chunk.
    async fn after_write(&self, chunks: &[Chunk]) -> Result<()> {
        if self.embedding.is_enabled() && !chunks.is_empty() {
            let (embedded, pending) =
                embed_cmd::embed_chunks_inline(&self.embedding, &self.pool, chunks).await;
            if pending > 0 {
                tracing::warn!(
                    embedded,
                    pending,
                    "some chunks were not embedded; run `ptree embed pending`"
                );
            }
        }
        embed_cmd::prune_orphan_vectors(&self.pool).await?;
        Ok(())
    }

    async fn remove_all(&self) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chunks_fts").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM chunk_vectors")
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM chunks").execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(result.rows_affected() as usize)
    }

    async fn keyword_candidates(&self, text: &str, limit: i64) -> Result<Vec<ChunkCandidate>> {
        let Some(fts_query) = fts_match_expr(text) else {
            return Ok(Vec::new());
        };

        let rows = sqlx::query(
            r#"
            SELECT chunk_id, rank
            FROM chunks_fts
            WHERE chunks_fts MATCH ?
            ORDER BY rank
            LIMIT ?
            "#,
        )
        .bind(&fts_query)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let rank: f64 = row.get("rank");
                // negate so higher = better
                ChunkCandidate::new(row.get::<String, _>("chunk_id"), -rank)
            })
            .collect())
    }

    async fn vector_candidates(&self, text: &str, limit: i64) -> Result<Vec<ChunkCandidate>> {
        let provider = embedding::create_provider(&self.embedding)?;
        let query_vec = embedding::embed_query(&self.embedding, text).await?;

        let rows = sqlx::query(
            r#"
            SELECT v.chunk_id, v.embedding
            FROM chunk_vectors v
            JOIN chunks c ON c.id = v.chunk_id AND c.hash = v.hash
            WHERE v.model = ?
            "#,
        )
        .bind(provider.model_name())
        .fetch_all(&self.pool)
        .await?;

        let mut candidates: Vec<ChunkCandidate> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vec = embedding::blob_to_vec(&blob);
                ChunkCandidate::new(
                    row.get::<String, _>("chunk_id"),
                    embedding::cosine_similarity(&query_vec, &vec) as f64,
                )
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.raw_score
                .partial_cmp(&a.raw_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(limit.max(0) as usize);
        Ok(candidates)
    }

    async fn ranked_hits(&self, text: &str, top_k: usize) -> Result<Vec<QueryHit>> {
        let limit = self.retrieval.candidate_k.max(top_k as i64);
        let keyword = self.keyword_candidates(text, limit).await?;

        let (vector, alpha) = if self.embedding.is_enabled() {
            match self.vector_candidates(text, limit).await {
                Ok(v) => (v, self.retrieval.hybrid_alpha),
                Err(e) => {
                    tracing::warn!("vector retrieval unavailable, using keyword only: {:#}", e);
                    (Vec::new(), 0.0)
                }
            }
        } else {
            (Vec::new(), 0.0)
        };

        let mut scored = hybrid_merge(&keyword, &vector, alpha);
        scored.truncate(top_k);

        let mut hits = Vec::with_capacity(scored.len());
        for s in scored {
            // A chunk deleted between the two reads is dropped from the list.
            if let Some(chunk) = self.get(&s.chunk_id).await? {
                hits.push(QueryHit {
                    rank: hits.len() + 1,
                    metadata: chunk.metadata(),
                    chunk_id: chunk.id,
                    text: chunk.text,
                    score: s.score,
                });
            }
        }
        Ok(hits)
    }
}

#[async_trait]
impl IndexSink for SqliteSink {
    async fn upsert(&self, chunks: &[Chunk]) -> Result<usize, SinkError> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let written = self.write_chunks(chunks).await?;
        self.after_write(chunks).await?;
        Ok(written)
    }

    async fn delete_by_source_node(&self, node_id: &str) -> Result<usize, SinkError> {
        Ok(self.remove_node(node_id).await?)
    }

    async fn replace_nodes(
        &self,
        node_ids: &[String],
        chunks: &[Chunk],
    ) -> Result<(usize, usize), SinkError> {
        let counts = self.replace(node_ids, chunks).await?;
        self.after_write(chunks).await?;
        Ok(counts)
    }

    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<QueryHit>, SinkError> {
        validate_query(text, top_k)?;
        Ok(self.ranked_hits(text, top_k).await?)
    }

    async fn clear(&self) -> Result<usize, SinkError> {
        Ok(self.remove_all().await?)
    }

    async fn count(&self) -> Result<usize, SinkError> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await
            .map_err(anyhow::Error::from)?;
        Ok(n as usize)
    }
}

async fn insert_chunk_rows(conn: &mut SqliteConnection, chunks: &[Chunk]) -> Result<usize> {
    let now = chrono::Utc::now().timestamp();

    for chunk in chunks {
        let title_path = serde_json::to_string(&chunk.page_title_path)?;
        let headings = serde_json::to_string(&chunk.active_headings)?;

        sqlx::query(
            r#"
            INSERT INTO chunks (id, source_node_id, source_block_id, page_title_path,
                                active_headings, block_type, order_within_node,
                                last_updated, text, hash, indexed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                source_node_id = excluded.source_node_id,
                source_block_id = excluded.source_block_id,
                page_title_path = excluded.page_title_path,
                active_headings = excluded.active_headings,
                block_type = excluded.block_type,
                order_within_node = excluded.order_within_node,
                last_updated = excluded.last_updated,
                text = excluded.text,
                hash = excluded.hash,
                indexed_at = excluded.indexed_at
            "#,
        )
        .bind(&chunk.id)
        .bind(&chunk.source_node_id)
        .bind(&chunk.source_block_id)
        .bind(&title_path)
        .bind(&headings)
        .bind(chunk.block_type.as_str())
        .bind(chunk.order_within_node as i64)
        .bind(&chunk.last_updated)
        .bind(&chunk.text)
        .bind(&chunk.hash)
        .bind(now)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("Failed to upsert chunk {}", chunk.id))?;

        sqlx::query("DELETE FROM chunks_fts WHERE chunk_id = ?")
            .bind(&chunk.id)
            .execute(&mut *conn)
            .await?;
        sqlx::query("INSERT INTO chunks_fts (chunk_id, text) VALUES (?, ?)")
            .bind(&chunk.id)
            .bind(&chunk.text)
            .execute(&mut *conn)
            .await?;
    }

    Ok(chunks.len())
}

async fn delete_node_rows(conn: &mut SqliteConnection, node_id: &str) -> Result<usize> {
    sqlx::query(
        "DELETE FROM chunks_fts WHERE chunk_id IN (SELECT id FROM chunks WHERE source_node_id = ?)",
    )
    .bind(node_id)
    .execute(&mut *conn)
    .await?;
    let result = sqlx::query("DELETE FROM chunks WHERE source_node_id = ?")
        .bind(node_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() as usize)
}

const CHUNK_COLUMNS: &str = "id, source_node_id, source_block_id, page_title_path, \
     active_headings, block_type, order_within_node, last_updated, text, hash";

fn row_to_chunk(row: &SqliteRow) -> Result<Chunk> {
    let id: String = row.get("id");
    let title_path: String = row.get("page_title_path");
    let headings: String = row.get("active_headings");
    let block_type: String = row.get("block_type");
    let order: i64 = row.get("order_within_node");

    Ok(Chunk {
        page_title_path: serde_json::from_str(&title_path)
            .with_context(|| format!("Corrupt page_title_path on chunk {}", id))?,
        active_headings: serde_json::from_str(&headings)
            .with_context(|| format!("Corrupt active_headings on chunk {}", id))?,
        block_type: block_type.parse::<BlockType>()?,
        order_within_node: order.max(0) as usize,
        source_node_id: row.get("source_node_id"),
        source_block_id: row.get("source_block_id"),
        last_updated: row.get("last_updated"),
        text: row.get("text"),
        hash: row.get("hash"),
        id,
    })
}

/// FTS5 expression matching any of the query's terms, or `None` when the
/// query has no searchable terms.
fn fts_match_expr(text: &str) -> Option<String> {
    let terms = query_terms(text);
    if terms.is_empty() {
        return None;
    }
    Some(
        terms
            .iter()
            .map(|t| format!("\"{}\"", t))
            .collect::<Vec<_>>()
            .join(" OR "),
    )
}
