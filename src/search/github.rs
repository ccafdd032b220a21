use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};

use super::{SearchClient, SearchError, SearchPage, SearchRequest};

const DEFAULT_BASE_URL: &str = "https://api.github.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const ACCEPT_V3: &str = "application/vnd.github.v3+json";

#[derive(Clone, Debug)]
pub struct SearchClientConfig {
    pub token: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for SearchClientConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl SearchClientConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.token = std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.trim().is_empty());
        if let Ok(base) = std::env::var("GITHUB_API_URL") {
            cfg.base_url = base;
        }
        if let Ok(timeout) = std::env::var("GITHUB_TIMEOUT_SECS") {
            if let Ok(parsed) = timeout.parse::<u64>() {
                cfg.timeout = Duration::from_secs(parsed);
            }
        }
        cfg
    }
}

#[derive(Clone)]
pub struct GitHubSearchClient {
    http: HttpClient,
    cfg: SearchClientConfig,
}

impl GitHubSearchClient {
    pub fn new(cfg: SearchClientConfig) -> Result<Self, SearchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_V3));
        headers.insert(USER_AGENT, HeaderValue::from_static(concat!("phish-watch/", env!("CARGO_PKG_VERSION"))));
        if let Some(token) = &cfg.token {
            if let Ok(mut v) = HeaderValue::from_str(&format!("token {token}")) {
                v.set_sensitive(true);
                headers.insert(AUTHORIZATION, v);
            }
        }
        let http = HttpClient::builder()
            .timeout(cfg.timeout)
            .default_headers(headers)
            .build()
            .map_err(SearchError::from_reqwest)?;
        Ok(Self { http, cfg })
    }

    pub fn has_token(&self) -> bool {
        self.cfg.token.is_some()
    }

    fn endpoint(&self) -> String {
        format!("{}/search/issues", self.cfg.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl SearchClient for GitHubSearchClient {
    async fn search(&self, request: &SearchRequest) -> Result<SearchPage, SearchError> {
        let response = self
            .http
            .get(self.endpoint())
            .query(&[
                ("q", request.query.clone()),
                ("per_page", request.per_page.to_string()),
                ("page", request.page.to_string()),
                ("sort", "created".to_string()),
                ("order", "desc".to_string()),
            ])
            .send()
            .await
            .map_err(SearchError::from_reqwest)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(SearchError::from_reqwest)?;

        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes).into_owned();
            return Err(SearchError::Api { status, body });
        }

        serde_json::from_slice::<SearchPage>(&bytes).map_err(SearchError::Decode)
    }
}
