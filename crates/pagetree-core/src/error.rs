//! Error taxonomy for the chunking engine and its collaborators.
//!
//! Only [`FetchFailure`] and [`SinkError`] ever cross a component
//! boundary. [`ExtractionFailure`] and [`TimestampParseFailure`] are
//! recovered where they occur and surface only in logs.

use std::error::Error as StdError;

/// Boxed error cause carried by [`FetchFailure`].
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// A node or its blocks could not be retrieved (transport, auth, HTTP
/// status, or response shape).
#[derive(Debug, thiserror::Error)]
#[error("failed to fetch node {node_id}: {cause}")]
pub struct FetchFailure {
    pub node_id: String,
    #[source]
    pub cause: BoxError,
}

impl FetchFailure {
    pub fn new(node_id: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        Self {
            node_id: node_id.into(),
            cause: cause.into(),
        }
    }
}

/// A block's expected text field was missing or malformed.
///
/// Recovered by substituting empty content.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("could not extract text from {block_type} block {block_id}: {reason}")]
pub struct ExtractionFailure {
    pub block_id: String,
    pub block_type: String,
    pub reason: String,
}

/// A timestamp string did not parse as ISO-8601.
///
/// Recovered by excluding the value from aggregation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unparsable timestamp {value:?}: {reason}")]
pub struct TimestampParseFailure {
    pub value: String,
    pub reason: String,
}

/// An index sink operation failed.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The caller supplied something the sink cannot act on.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// A traversal could not start: the entry node itself failed to fetch.
#[derive(Debug, thiserror::Error)]
#[error("entry node {node_id} could not be fetched")]
pub struct WalkError {
    pub node_id: String,
    #[source]
    pub source: FetchFailure,
}
