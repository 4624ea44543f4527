use crate::config::ValidationError;
use thiserror::Error;

/// Result type alias for search-router operations
pub type Result<T, E = SearchRouterError> = std::result::Result<T, E>;

/// Failure cause for a single search query.
///
/// Produced per query and stored at that query's position in the aggregated
/// response. None of these abort sibling queries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("search query must not be empty")]
    InvalidQuery,

    #[error("failed to build upstream request: {0}")]
    RequestConstruction(String),

    #[error("upstream request failed: {0}")]
    Transport(String),

    #[error("failed to decode upstream response: {0}")]
    Decode(String),

    #[error("upstream timeout for {0}")]
    UpstreamTimeout(String),

    #[error("search task failed: {0}")]
    TaskFailed(String),
}

impl SearchError {
    /// Short identifier used as a metric tag.
    pub fn kind(&self) -> &'static str {
        match self {
            SearchError::InvalidQuery => "invalid_query",
            SearchError::RequestConstruction(_) => "request_construction",
            SearchError::Transport(_) => "transport",
            SearchError::Decode(_) => "decode",
            SearchError::UpstreamTimeout(_) => "timeout",
            SearchError::TaskFailed(_) => "task_failed",
        }
    }
}

/// Errors that can occur while running the search router
#[derive(Error, Debug)]
pub enum SearchRouterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Response serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to build response: {0}")]
    Http(#[from] http::Error),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ValidationError),
}
