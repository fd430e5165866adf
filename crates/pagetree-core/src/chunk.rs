//! Per-node chunk builder.
//!
//! Scans one node's flattened block sequence left to right and emits one
//! [`Chunk`] per content-bearing block:
//!
//! 1. Feed the block to the [`HeadingTracker`].
//! 2. Skip `subnode_reference` blocks (traversal only, no chunk).
//! 3. Render ancestor titles + active headings + own content.
//! 4. Aggregate `last_updated` over the block and its active headings.
//! 5. Assign `id = "{node_id}-{order}"`, where `order` counts emitted
//!    chunks, so orders run `0..n` without gaps.
//!
//! Ids are not the block's raw position in the flattened sequence. A
//! skipped subnode reference does not consume an order, so `root-1` is
//! the second chunk of `root` even when a subnode reference precedes it.
//!
//! Chunks whose estimated token count exceeds the configured budget are
//! logged but not split.
//!
//! # Example
//!
//! ```rust
//! use pagetree_core::chunk::{build_node_chunks, OversizeGuard};
//! use pagetree_core::models::{Block, BlockType};
//!
//! let blocks = vec![Block::new(BlockType::Paragraph, "Hello")];
//! let chunks = build_node_chunks("root", &["Root".to_string()], &blocks, &OversizeGuard::default());
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].id, "root-0");
//! assert_eq!(chunks[0].text, "# Root\n\nHello");
//! ```

use sha2::{Digest, Sha256};

use crate::context::render_chunk_text;
use crate::heading::HeadingTracker;
use crate::models::{Block, BlockType, Chunk};
use crate::timestamp::aggregate_last_updated;

/// Default token budget for a single chunk.
pub const DEFAULT_MAX_TOKENS: usize = 256;

/// Rough words → tokens ratio.
pub const DEFAULT_TOKENS_PER_WORD: f64 = 1.3;

/// Flags chunks that are probably too long for the embedding model.
#[derive(Debug, Clone, Copy)]
pub struct OversizeGuard {
    pub max_tokens: usize,
    pub tokens_per_word: f64,
}

impl Default for OversizeGuard {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            tokens_per_word: DEFAULT_TOKENS_PER_WORD,
        }
    }
}

impl OversizeGuard {
    pub fn estimated_tokens(&self, text: &str) -> f64 {
        text.split_whitespace().count() as f64 * self.tokens_per_word
    }

    pub fn is_oversize(&self, text: &str) -> bool {
        self.estimated_tokens(text) > self.max_tokens as f64
    }
}

/// Deterministic chunk id for the `order`-th chunk of `node_id`.
pub fn chunk_id(node_id: &str, order: usize) -> String {
    format!("{}-{}", node_id, order)
}

/// SHA-256 hex digest of chunk text.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Build the chunks for one node.
///
/// `title_path` must already include the node's own title. The heading
/// state starts empty for every call.
pub fn build_node_chunks(
    node_id: &str,
    title_path: &[String],
    blocks: &[Block],
    guard: &OversizeGuard,
) -> Vec<Chunk> {
    let mut headings = HeadingTracker::new();
    let mut chunks = Vec::with_capacity(blocks.len());

    for (index, block) in blocks.iter().enumerate() {
        headings.observe(index, block);

        if block.block_type == BlockType::SubnodeReference {
            continue;
        }

        let order = chunks.len();
        let text = render_chunk_text(title_path, &headings, block);

        if guard.is_oversize(&text) {
            tracing::warn!(
                node_id,
                order,
                words = text.split_whitespace().count(),
                max_tokens = guard.max_tokens,
                "chunk exceeds token budget; may need splitting"
            );
        }

        chunks.push(Chunk {
            id: chunk_id(node_id, order),
            hash: content_hash(&text),
            text,
            source_node_id: node_id.to_string(),
            source_block_id: None,
            page_title_path: title_path.to_vec(),
            active_headings: headings.texts(),
            block_type: block.block_type,
            order_within_node: order,
            last_updated: aggregate_last_updated(block, &headings),
        });
    }

    tracing::debug!(node_id, chunks = chunks.len(), "built node chunks");
    chunks
}
