//! In-memory [`TreeFetcher`] for tests and offline use.
//!
//! Nodes are registered with an already-flattened block list. Child node
//! ids are derived from the `subnode_reference` blocks in that list.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;

use super::TreeFetcher;
use crate::error::FetchFailure;
use crate::models::{Block, BlockType, NodeChildren};

#[derive(Debug, Clone)]
struct StoredNode {
    title: String,
    blocks: Vec<Block>,
}

/// A fixed tree held in memory.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    nodes: HashMap<String, StoredNode>,
    failing: HashSet<String>,
    calls: RwLock<Vec<String>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node. Replaces any node with the same id.
    pub fn node(mut self, id: &str, title: &str, blocks: Vec<Block>) -> Self {
        self.nodes.insert(
            id.to_string(),
            StoredNode {
                title: title.to_string(),
                blocks,
            },
        );
        self
    }

    /// Make every fetch for `id` fail.
    pub fn failing(mut self, id: &str) -> Self {
        self.failing.insert(id.to_string());
        self
    }

    /// Node ids passed to `fetch_children`, in call order.
    pub fn children_calls(&self) -> Vec<String> {
        self.calls.read().map(|c| c.clone()).unwrap_or_default()
    }

    fn lookup(&self, node_id: &str) -> Result<&StoredNode, FetchFailure> {
        if self.failing.contains(node_id) {
            return Err(FetchFailure::new(node_id, "simulated fetch failure"));
        }
        self.nodes
            .get(node_id)
            .ok_or_else(|| FetchFailure::new(node_id, "node not found"))
    }
}

#[async_trait]
impl TreeFetcher for MemoryFetcher {
    async fn fetch_title(&self, node_id: &str) -> Result<String, FetchFailure> {
        self.lookup(node_id).map(|n| n.title.clone())
    }

    async fn fetch_children(&self, node_id: &str) -> Result<NodeChildren, FetchFailure> {
        if let Ok(mut calls) = self.calls.write() {
            calls.push(node_id.to_string());
        }
        let node = self.lookup(node_id)?;
        let subnode_ids = node
            .blocks
            .iter()
            .filter(|b| b.block_type == BlockType::SubnodeReference)
            .filter_map(|b| b.id.clone())
            .collect();
        Ok(NodeChildren {
            blocks: node.blocks.clone(),
            subnode_ids,
        })
    }
}
