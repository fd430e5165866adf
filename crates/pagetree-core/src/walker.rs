//! Depth-first tree walker.
//!
//! Visits a node tree in pre-order: each node is fully fetched and chunked
//! before any of its children. Traversal uses an explicit work stack. Every
//! frame carries its own immutable [`TitlePath`] snapshot, so a title
//! pushed for one branch is never visible from another.
//!
//! # Failure policy
//!
//! - The entry node failing to fetch aborts the walk with [`WalkError`].
//! - Any other node failing is logged with its id and the nearest known
//!   title, recorded in [`WalkOutcome::failures`], and its subtree is
//!   skipped. Siblings and ancestors keep their chunks.
//! - A node id reached twice in one walk is visited only once.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use crate::chunk::{build_node_chunks, OversizeGuard};
use crate::error::{FetchFailure, WalkError};
use crate::fetch::TreeFetcher;
use crate::models::{Chunk, NodeChildren};

/// Ancestor titles from the traversal root down to the current node.
///
/// Cheap to clone. Extending a path creates a new one and leaves the
/// original untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitlePath(Arc<[String]>);

impl TitlePath {
    pub fn root() -> Self {
        Self(Arc::from(Vec::new()))
    }

    /// A new path with `title` appended.
    pub fn child(&self, title: impl Into<String>) -> Self {
        let mut titles = self.0.to_vec();
        titles.push(title.into());
        Self(Arc::from(titles))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// The deepest non-empty title, if any.
    pub fn nearest_title(&self) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .map(String::as_str)
            .find(|t| !t.trim().is_empty())
    }
}

impl Default for TitlePath {
    fn default() -> Self {
        Self::root()
    }
}

/// A node that was fetched and chunked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisitedNode {
    pub node_id: String,
    pub title: String,
    pub depth: usize,
    pub chunk_count: usize,
}

/// A node whose subtree was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeFailure {
    pub node_id: String,
    /// Nearest known title: the node's own if it was fetched, else its
    /// closest titled ancestor's.
    pub title: String,
    pub message: String,
}

/// Everything one walk produced.
#[derive(Debug, Clone, Default)]
pub struct WalkOutcome {
    /// Chunks in pre-order, node by node, each node's in block order.
    pub chunks: Vec<Chunk>,
    /// Nodes in visit order.
    pub visited: Vec<VisitedNode>,
    pub failures: Vec<NodeFailure>,
}

impl WalkOutcome {
    pub fn nodes_visited(&self) -> usize {
        self.visited.len()
    }

    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

struct Frame {
    node_id: String,
    parent_path: TitlePath,
    depth: usize,
}

struct EnterError {
    title: Option<String>,
    failure: FetchFailure,
}

/// Walks a tree through a [`TreeFetcher`], producing chunks.
pub struct TreeWalker<'a, F: ?Sized> {
    fetcher: &'a F,
    guard: OversizeGuard,
}

impl<'a, F: TreeFetcher + ?Sized> TreeWalker<'a, F> {
    pub fn new(fetcher: &'a F) -> Self {
        Self {
            fetcher,
            guard: OversizeGuard::default(),
        }
    }

    pub fn with_guard(mut self, guard: OversizeGuard) -> Self {
        self.guard = guard;
        self
    }

    /// Walk the subtree rooted at `root_id`.
    pub async fn walk(&self, root_id: &str) -> Result<WalkOutcome, WalkError> {
        let mut outcome = WalkOutcome::default();
        let mut seen: HashSet<String> = HashSet::new();
        let mut stack = vec![Frame {
            node_id: root_id.to_string(),
            parent_path: TitlePath::root(),
            depth: 0,
        }];

        while let Some(frame) = stack.pop() {
            if !seen.insert(frame.node_id.clone()) {
                tracing::warn!(node_id = %frame.node_id, "node already visited; skipping");
                continue;
            }

            let entered = self.enter(&frame).await;
            let (path, children) = match entered {
                Ok(entered) => entered,
                Err(e) if frame.depth == 0 => {
                    return Err(WalkError {
                        node_id: frame.node_id,
                        source: e.failure,
                    });
                }
                Err(e) => {
                    let title = e
                        .title
                        .filter(|t| !t.trim().is_empty())
                        .or_else(|| frame.parent_path.nearest_title().map(str::to_string))
                        .unwrap_or_default();
                    tracing::warn!(
                        node_id = %frame.node_id,
                        title = %title,
                        error = %e.failure,
                        "fetch failed; skipping subtree"
                    );
                    outcome.failures.push(NodeFailure {
                        node_id: frame.node_id,
                        title,
                        message: e.failure.to_string(),
                    });
                    continue;
                }
            };

            let chunks =
                build_node_chunks(&frame.node_id, path.as_slice(), &children.blocks, &self.guard);
            outcome.visited.push(VisitedNode {
                node_id: frame.node_id.clone(),
                title: path.as_slice().last().cloned().unwrap_or_default(),
                depth: frame.depth,
                chunk_count: chunks.len(),
            });
            outcome.chunks.extend(chunks);

            // Reverse so the first child is popped next.
            for child_id in children.subnode_ids.into_iter().rev() {
                stack.push(Frame {
                    node_id: child_id,
                    parent_path: path.clone(),
                    depth: frame.depth + 1,
                });
            }
        }

        tracing::debug!(
            root_id,
            nodes = outcome.visited.len(),
            chunks = outcome.chunks.len(),
            failures = outcome.failures.len(),
            "walk finished"
        );
        Ok(outcome)
    }

    async fn enter(&self, frame: &Frame) -> Result<(TitlePath, NodeChildren), EnterError> {
        let title = self
            .fetcher
            .fetch_title(&frame.node_id)
            .await
            .map_err(|failure| EnterError {
                title: None,
                failure,
            })?;
        let children = self
            .fetcher
            .fetch_children(&frame.node_id)
            .await
            .map_err(|failure| EnterError {
                title: Some(title.clone()),
                failure,
            })?;
        Ok((frame.parent_path.child(title), children))
    }
}

/// Walk `root_id` with the given oversize guard.
pub async fn walk_tree<F: TreeFetcher + ?Sized>(
    fetcher: &F,
    root_id: &str,
    guard: OversizeGuard,
) -> Result<WalkOutcome, WalkError> {
    TreeWalker::new(fetcher).with_guard(guard).walk(root_id).await
}
