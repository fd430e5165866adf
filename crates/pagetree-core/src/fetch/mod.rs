//! Tree fetcher abstraction.
//!
//! A [`TreeFetcher`] is the only way the chunking engine reads a tree. The
//! app crate provides a Notion-backed implementation; [`memory`] holds a
//! fixture for tests and offline use.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;

use crate::error::FetchFailure;
use crate::models::NodeChildren;

/// Read access to a tree of nodes.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`fetch_title`](TreeFetcher::fetch_title) | The node's display title |
/// | [`fetch_children`](TreeFetcher::fetch_children) | Flattened blocks and child node ids |
#[async_trait]
pub trait TreeFetcher: Send + Sync {
    /// Fetch a node's title.
    ///
    /// Returns `Ok("")` when the node exists but carries no extractable
    /// title. Fails only when the node itself cannot be reached.
    async fn fetch_title(&self, node_id: &str) -> Result<String, FetchFailure>;

    /// Fetch a node's blocks, with nested blocks spliced immediately after
    /// their parent, and the ids of child nodes in discovery order.
    async fn fetch_children(&self, node_id: &str) -> Result<NodeChildren, FetchFailure>;
}
