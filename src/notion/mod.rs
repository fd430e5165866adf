//! Notion REST fetcher.
//!
//! Implements [`TreeFetcher`] over the public API:
//!
//! - `GET /v1/pages/{id}` for titles.
//! - `GET /v1/blocks/{id}/children` for content, following `next_cursor`
//!   until `has_more` is false.
//!
//! Blocks with `has_children` are expanded in place, so a nested block
//! appears immediately after its parent. Layout containers (`column_list`,
//! `column`, `synced_block`) contribute only their children. `child_page`
//! blocks become `subnode_reference` blocks and their ids are reported as
//! child nodes for the walker to visit.
//!
//! # Configuration
//!
//! ```toml
//! [notion]
//! base_url = "https://api.notion.com"   # or NOTION_BASE
//! version = "2022-06-28"                # or NOTION_VERSION
//! secret_env = "NOTION_SECRET"
//! timeout_secs = 10
//! page_size = 100
//! ```

pub mod blocks;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use pagetree_core::error::FetchFailure;
use pagetree_core::fetch::TreeFetcher;
use pagetree_core::models::{BlockType, NodeChildren};

use crate::config::NotionConfig;
use blocks::{map_type, to_block, NotionBlock};

#[derive(Debug, thiserror::Error)]
pub enum NotionError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
    #[error("unexpected response from {url}: {reason}")]
    Decode { url: String, reason: String },
}

#[derive(Debug, Deserialize)]
struct ChildrenPage {
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

pub struct NotionFetcher {
    client: reqwest::Client,
    base_url: String,
    secret: String,
    version: String,
    page_size: u32,
}

impl NotionFetcher {
    pub fn new(
        base_url: impl Into<String>,
        secret: impl Into<String>,
        version: impl Into<String>,
        timeout: Duration,
        page_size: u32,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret: secret.into(),
            version: version.into(),
            page_size,
        })
    }

    /// Build from `[notion]`, reading the secret from the environment.
    pub fn from_config(config: &NotionConfig) -> anyhow::Result<Self> {
        Self::new(
            config.resolved_base_url(),
            config.secret()?,
            config.resolved_version(),
            Duration::from_secs(config.timeout_secs),
            config.page_size,
        )
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, NotionError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.secret)
            .header("Notion-Version", &self.version)
            .query(query)
            .send()
            .await
            .map_err(|source| NotionError::Http {
                url: url.clone(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotionError::Status {
                url,
                status: status.as_u16(),
                body,
            });
        }

        resp.json::<Value>().await.map_err(|e| NotionError::Decode {
            url,
            reason: e.to_string(),
        })
    }

    /// Every direct child of `block_id`, across all result pages.
    async fn list_children(&self, block_id: &str) -> Result<Vec<NotionBlock>, NotionError> {
        let path = format!("/v1/blocks/{}/children", block_id);
        let mut cursor: Option<String> = None;
        let mut out = Vec::new();

        loop {
            let mut query = vec![("page_size", self.page_size.to_string())];
            if let Some(c) = &cursor {
                query.push(("start_cursor", c.clone()));
            }
            let value = self.get_json(&path, &query).await?;
            let page: ChildrenPage =
                serde_json::from_value(value).map_err(|e| NotionError::Decode {
                    url: format!("{}{}", self.base_url, path),
                    reason: e.to_string(),
                })?;

            for raw in page.results {
                match serde_json::from_value::<NotionBlock>(raw) {
                    Ok(block) => out.push(block),
                    Err(e) => tracing::warn!(parent = block_id, "skipping malformed block: {}", e),
                }
            }

            match page.next_cursor {
                Some(next) if page.has_more => cursor = Some(next),
                _ => break,
            }
        }

        Ok(out)
    }
}

#[async_trait]
impl TreeFetcher for NotionFetcher {
    async fn fetch_title(&self, node_id: &str) -> Result<String, FetchFailure> {
        let page = self
            .get_json(&format!("/v1/pages/{}", node_id), &[])
            .await
            .map_err(|e| FetchFailure::new(node_id, e))?;

        match blocks::extract_title(&page) {
            Some(title) => Ok(title),
            None => {
                tracing::warn!(node_id, "page has no title property");
                Ok(String::new())
            }
        }
    }

    async fn fetch_children(&self, node_id: &str) -> Result<NodeChildren, FetchFailure> {
        let mut children = NodeChildren::default();
        let top = self
            .list_children(node_id)
            .await
            .map_err(|e| FetchFailure::new(node_id, e))?;

        // Depth-first over nested blocks; each level is an iterator so a
        // block's children land before its next sibling.
        let mut stack = vec![top.into_iter()];
        loop {
            let next = match stack.last_mut() {
                Some(level) => level.next(),
                None => break,
            };
            let Some(raw) = next else {
                stack.pop();
                continue;
            };

            if let Some(block) = to_block(&raw) {
                if block.block_type == BlockType::SubnodeReference {
                    children.subnode_ids.push(raw.id.clone());
                }
                children.blocks.push(block);
            }

            if raw.has_children && map_type(&raw.kind).recurses() {
                let nested = self
                    .list_children(&raw.id)
                    .await
                    .map_err(|e| FetchFailure::new(node_id, e))?;
                stack.push(nested.into_iter());
            }
        }

        tracing::debug!(
            node_id,
            blocks = children.blocks.len(),
            subnodes = children.subnode_ids.len(),
            "fetched node children"
        );
        Ok(children)
    }
}
