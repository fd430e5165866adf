//! Core data models used throughout pagetree.
//!
//! These types represent the blocks a [`TreeFetcher`](crate::fetch::TreeFetcher)
//! produces, and the chunks that flow from the chunking engine into an
//! [`IndexSink`](crate::sink::IndexSink).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The fixed set of block types the chunking engine understands.
///
/// Headings are levels 1–3. [`BlockType::SubnodeReference`] is the only
/// type that never yields a chunk: it marks a child node to recurse into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    Paragraph,
    BulletedItem,
    NumberedItem,
    Code,
    Quote,
    Todo,
    Toggle,
    Link,
    #[serde(rename = "heading_1")]
    Heading1,
    #[serde(rename = "heading_2")]
    Heading2,
    #[serde(rename = "heading_3")]
    Heading3,
    SubnodeReference,
}

impl BlockType {
    /// All block types, in declaration order.
    pub const ALL: [BlockType; 12] = [
        BlockType::Paragraph,
        BlockType::BulletedItem,
        BlockType::NumberedItem,
        BlockType::Code,
        BlockType::Quote,
        BlockType::Todo,
        BlockType::Toggle,
        BlockType::Link,
        BlockType::Heading1,
        BlockType::Heading2,
        BlockType::Heading3,
        BlockType::SubnodeReference,
    ];

    /// Stable snake_case identifier, as stored in the index.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::Paragraph => "paragraph",
            BlockType::BulletedItem => "bulleted_item",
            BlockType::NumberedItem => "numbered_item",
            BlockType::Code => "code",
            BlockType::Quote => "quote",
            BlockType::Todo => "todo",
            BlockType::Toggle => "toggle",
            BlockType::Link => "link",
            BlockType::Heading1 => "heading_1",
            BlockType::Heading2 => "heading_2",
            BlockType::Heading3 => "heading_3",
            BlockType::SubnodeReference => "subnode_reference",
        }
    }

    /// Heading depth (1–3), or `None` for non-heading blocks.
    pub fn heading_level(&self) -> Option<usize> {
        match self {
            BlockType::Heading1 => Some(1),
            BlockType::Heading2 => Some(2),
            BlockType::Heading3 => Some(3),
            _ => None,
        }
    }

    pub fn is_heading(&self) -> bool {
        self.heading_level().is_some()
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown block type identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown block type: {0}")]
pub struct UnknownBlockType(pub String);

impl FromStr for BlockType {
    type Err = UnknownBlockType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BlockType::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| UnknownBlockType(s.to_string()))
    }
}

/// One ordered unit of content within a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block identifier. Always set for [`BlockType::SubnodeReference`]
    /// (the referenced child node id); informational otherwise.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    /// Plain text content, possibly empty.
    #[serde(default)]
    pub content: String,
    /// ISO-8601 timestamp, or empty when unknown.
    #[serde(default)]
    pub last_modified: String,
    /// Whether nested blocks exist beneath this one.
    #[serde(default)]
    pub has_children: bool,
}

impl Block {
    pub fn new(block_type: BlockType, content: impl Into<String>) -> Self {
        Self {
            id: None,
            block_type,
            content: content.into(),
            last_modified: String::new(),
            has_children: false,
        }
    }

    /// A reference to the child node `node_id`.
    pub fn subnode(node_id: impl Into<String>) -> Self {
        let node_id = node_id.into();
        Self {
            id: Some(node_id.clone()),
            block_type: BlockType::SubnodeReference,
            content: node_id,
            last_modified: String::new(),
            has_children: false,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn modified_at(mut self, ts: impl Into<String>) -> Self {
        self.last_modified = ts.into();
        self
    }
}

/// A node's flattened block sequence plus the child nodes it references.
///
/// Nested blocks are already spliced in place: each block's descendants
/// appear immediately after it, before its next sibling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeChildren {
    pub blocks: Vec<Block>,
    pub subnode_ids: Vec<String>,
}

/// The atomic output unit of the chunking engine.
///
/// Chunks are ephemeral: built during one ingestion pass, handed to an
/// index sink, then dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// `"{source_node_id}-{order_within_node}"`. Stable across runs on an
    /// unchanged tree, so re-ingesting a node overwrites its chunks.
    pub id: String,
    /// Rendered context lines plus the block's own formatted content.
    pub text: String,
    pub source_node_id: String,
    pub source_block_id: Option<String>,
    /// Ancestor node titles, root-first, including the owning node.
    pub page_title_path: Vec<String>,
    /// Active heading texts, level ascending, unset levels skipped.
    pub active_headings: Vec<String>,
    pub block_type: BlockType,
    pub order_within_node: usize,
    /// Most recent timestamp among the block and its contributing
    /// headings, in its original string form. Empty if none parsed.
    pub last_updated: String,
    /// SHA-256 of `text`, used to detect stale embeddings.
    pub hash: String,
}

impl Chunk {
    /// The metadata half of the chunk, as returned alongside query hits.
    pub fn metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            source_node_id: self.source_node_id.clone(),
            source_block_id: self.source_block_id.clone(),
            page_title_path: self.page_title_path.clone(),
            active_headings: self.active_headings.clone(),
            block_type: self.block_type,
            order_within_node: self.order_within_node,
            last_updated: self.last_updated.clone(),
        }
    }
}

/// Structured chunk metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source_node_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_block_id: Option<String>,
    pub page_title_path: Vec<String>,
    pub active_headings: Vec<String>,
    pub block_type: BlockType,
    pub order_within_node: usize,
    pub last_updated: String,
}
