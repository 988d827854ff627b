use std::fmt;

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde_json::Value;

use crate::{PageContents, SearchError, SearchHit, SearchProvider, SearchResults};

use super::{array_field, fetch_page, send_json, string_field};

const NAME: &str = "google";
const ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";
/// Custom Search returns at most ten results per request.
const MAX_RESULTS: usize = 10;

#[derive(Clone)]
pub struct GoogleBackend {
    http: reqwest::Client,
    api_key: String,
    cx: String,
}

impl fmt::Debug for GoogleBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleBackend").field("cx", &self.cx).finish()
    }
}

impl GoogleBackend {
    pub fn new(http: reqwest::Client, api_key: String, cx: String) -> Self {
        Self { http, api_key, cx }
    }

    fn search_request(&self, query: &str, top_n: usize) -> RequestBuilder {
        let num = top_n.clamp(1, MAX_RESULTS).to_string();
        self.http.get(ENDPOINT).query(&[
            ("key", self.api_key.as_str()),
            ("cx", self.cx.as_str()),
            ("q", query),
            ("num", num.as_str()),
        ])
    }
}

fn parse_hits(body: &Value) -> Vec<SearchHit> {
    array_field(body, "items")
        .iter()
        .map(|item| SearchHit {
            title: string_field(item, "title"),
            url: string_field(item, "link"),
            snippet: string_field(item, "snippet"),
        })
        .collect()
}

#[async_trait]
impl SearchProvider for GoogleBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn search(&self, query: &str, top_n: usize) -> Result<SearchResults, SearchError> {
        tracing::debug!(backend = NAME, query, top_n, "issuing search request");
        let body = send_json(NAME, self.search_request(query, top_n)).await?;
        let hits = parse_hits(&body);
        tracing::info!(backend = NAME, hits = hits.len(), "search completed");
        Ok(SearchResults {
            backend: NAME.to_string(),
            query: query.to_string(),
            hits,
        })
    }

    async fn fetch(&self, url: &str) -> Result<PageContents, SearchError> {
        fetch_page(NAME, &self.http, url).await
    }
}
