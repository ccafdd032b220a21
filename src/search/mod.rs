use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod github;
#[cfg(test)]
pub mod mock;

pub use github::{GitHubSearchClient, SearchClientConfig};

/// Token planted in phishing issues by the campaign being tracked.
pub const SEARCH_TERM: &str = "Ov23lit4gvZ7pVctYyZH";
pub const TYPE_FILTER: &str = "is:issue";
pub const MAX_PER_PAGE: u32 = 100;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub page: u32,
    pub per_page: u32,
}

impl SearchRequest {
    /// Newest-first page of the fixed query. `page` is 1-based.
    pub fn page(page: u32, per_page: u32) -> Self {
        SearchRequest {
            query: format!("{SEARCH_TERM} {TYPE_FILTER}"),
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub items: Vec<SearchItem>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchItem {
    pub id: u64,
    pub repository_url: String,
    pub title: String,
    pub user: SearchUser,
    pub created_at: String,
    pub html_url: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchUser {
    pub login: String,
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("http error: {0}")]
    Http(#[source] reqwest::Error),
    #[error("request timed out")]
    Timeout,
    #[error("api error {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("decode error: {0}")]
    Decode(#[source] serde_json::Error),
}

impl SearchError {
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() { SearchError::Timeout } else { SearchError::Http(err) }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SearchError::Api { status, .. } if *status == StatusCode::FORBIDDEN || *status == StatusCode::TOO_MANY_REQUESTS)
    }
}

#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<SearchPage, SearchError>;
}
