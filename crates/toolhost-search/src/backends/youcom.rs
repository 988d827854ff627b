use std::fmt;

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde_json::Value;

use crate::{PageContents, SearchError, SearchHit, SearchProvider, SearchResults};

use super::{array_field, fetch_page, send_json, string_field};

const NAME: &str = "youcom";
const ENDPOINT: &str = "https://api.ydc-index.io/search";

#[derive(Clone)]
pub struct YouComBackend {
    http: reqwest::Client,
    api_key: String,
}

impl fmt::Debug for YouComBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("YouComBackend").finish_non_exhaustive()
    }
}

impl YouComBackend {
    pub fn new(http: reqwest::Client, api_key: String) -> Self {
        Self { http, api_key }
    }

    fn search_request(&self, query: &str, top_n: usize) -> RequestBuilder {
        let count = top_n.max(1).to_string();
        self.http
            .get(ENDPOINT)
            .header("X-API-Key", &self.api_key)
            .query(&[("query", query), ("num_web_results", count.as_str())])
    }
}

/// Prefer the description; fall back to the joined snippets.
fn parse_hits(body: &Value) -> Vec<SearchHit> {
    array_field(body, "hits")
        .iter()
        .map(|hit| {
            let description = string_field(hit, "description");
            let snippet = if description.is_empty() {
                array_field(hit, "snippets")
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(" ")
            } else {
                description
            };
            SearchHit {
                title: string_field(hit, "title"),
                url: string_field(hit, "url"),
                snippet,
            }
        })
        .collect()
}

#[async_trait]
impl SearchProvider for YouComBackend {
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
