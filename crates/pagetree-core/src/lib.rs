//! # pagetree core
//!
//! Hierarchical chunking for block-structured document trees.
//!
//! Walks a tree of nodes (pages) through a [`fetch::TreeFetcher`], turns
//! each content block into a [`models::Chunk`] carrying its ancestor
//! titles and active headings, and hands chunks to an
//! [`sink::IndexSink`].
//!
//! This crate contains no tokio, sqlx, network or filesystem I/O.
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`models`] | Blocks, chunks, chunk metadata |
//! | [`heading`] | Three-level active heading stack |
//! | [`context`] | Title/heading prefix and per-type content rendering |
//! | [`timestamp`] | `last_updated` aggregation |
//! | [`chunk`] | Per-node chunk builder |
//! | [`walker`] | Depth-first traversal with per-branch title paths |
//! | [`fetch`] | Tree fetcher trait and in-memory fixture |
//! | [`sink`] | Index sink trait and in-memory sink |
//! | [`search`] | Score normalization and hybrid merge |
//! | [`embedding`] | Embedding trait and vector helpers |

pub mod chunk;
pub mod context;
pub mod embedding;
pub mod error;
pub mod fetch;
pub mod heading;
pub mod models;
pub mod search;
pub mod sink;
pub mod timestamp;
pub mod walker;
