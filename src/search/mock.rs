use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{SearchClient, SearchError, SearchItem, SearchPage, SearchRequest, SearchUser};

/// Replays queued pages in order and records every request it sees. Once the
/// queue is drained every further page comes back empty.
#[derive(Debug, Default)]
pub struct MockSearchClient {
    responses: Mutex<VecDeque<Result<SearchPage, SearchError>>>,
    calls: Mutex<Vec<SearchRequest>>,
}

impl MockSearchClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_page(&self, items: Vec<SearchItem>) {
        let page = SearchPage { total_count: items.len() as u64, items };
        self.responses.lock().unwrap().push_back(Ok(page));
    }

    pub fn push_error(&self, err: SearchError) {
        self.responses.lock().unwrap().push_back(Err(err));
    }

    pub fn calls(&self) -> Vec<SearchRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchClient for MockSearchClient {
    async fn search(&self, request: &SearchRequest) -> Result<SearchPage, SearchError> {
        self.calls.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(SearchPage::default()))
    }
}

pub fn item(id: u64, login: &str, repo: &str) -> SearchItem {
    SearchItem {
        id,
        repository_url: format!("https://api.github.com/repos/{repo}"),
        title: format!("issue {id}"),
        user: SearchUser { login: login.to_string() },
        created_at: format!("2024-03-{:02}T10:00:00Z", (id % 28) + 1),
        html_url: format!("https://github.com/{repo}/issues/{id}"),
    }
}

/// `count` items with strictly descending ids starting at `top`.
pub fn descending(top: u64, count: u64, login: &str, repo: &str) -> Vec<SearchItem> {
    (0..count).map(|i| item(top - i, login, repo)).collect()
}
