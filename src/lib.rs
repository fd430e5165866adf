//! # pagetree
//!
//! Hierarchy-aware chunking and retrieval for Notion page trees.
//!
//! A page tree is walked depth-first through the Notion API. Every
//! content block becomes one chunk whose text carries its ancestor page
//! titles and the headings in force above it, so each chunk reads on its
//! own. Chunks land in a SQLite index with FTS5 keyword search and
//! optional embedding vectors, and are served through a CLI and an HTTP
//! API.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────┐   ┌───────────┐
//! │   Notion    │──▶│  pagetree-core    │──▶│  SQLite   │
//! │  REST API   │   │ walk+chunk+merge │   │ FTS5+Vec  │
//! └─────────────┘   └──────────────────┘   └────┬──────┘
//!                                               │
//!                          ┌────────────────────┤
//!                          ▼                    ▼
//!                     ┌──────────┐        ┌──────────┐
//!                     │   CLI    │        │   HTTP   │
//!                     │ (ptree)  │        │  (axum)  │
//!                     └──────────┘        └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ptree init                       # create database
//! ptree ingest <page-id>           # walk and index a page tree
//! ptree search "deployment steps"
//! ptree serve                      # start HTTP server on :8001
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`notion`] | Notion-backed tree fetcher |
//! | [`sqlite_sink`] | SQLite-backed index sink |
//! | [`ingest`] | Walk → delete → upsert pipeline |
//! | [`search`] | Similarity search responses |
//! | [`seed`] | Demo corpus seed and clear |
//! | [`embedding`] | Embedding providers |
//! | [`embed_cmd`] | Embedding backfill |
//! | [`server`] | HTTP service |
//! | [`stats`] | Index statistics |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod embed_cmd;
pub mod embedding;
pub mod ingest;
pub mod migrate;
pub mod notion;
pub mod search;
pub mod seed;
pub mod server;
pub mod sqlite_sink;
pub mod stats;
