use std::fmt;

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde_json::{Value, json};

use crate::{PageContents, SearchError, SearchHit, SearchProvider, SearchResults};

use super::{array_field, fetch_page, send_json, string_field};

const NAME: &str = "exa";
const ENDPOINT: &str = "https://api.exa.ai/search";
const SNIPPET_CHARS: usize = 1_000;

#[derive(Clone)]
pub struct ExaBackend {
    http: reqwest::Client,
    api_key: String,
}

impl fmt::Debug for ExaBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExaBackend").finish_non_exhaustive()
    }
}

impl ExaBackend {
    pub fn new(http: reqwest::Client, api_key: String) -> Self {
        Self { http, api_key }
    }

    fn search_request(&self, query: &str, top_n: usize) -> RequestBuilder {
        self.http
            .post(ENDPOINT)
            .header("x-api-key", &self.api_key)
            .json(&json!({
                "query": query,
                "numResults": top_n.max(1),
                "contents": { "text": { "maxCharacters": SNIPPET_CHARS } }
            }))
    }
}

fn parse_hits(body: &Value) -> Vec<SearchHit> {
    array_field(body, "results")
        .iter()
        .map(|result| SearchHit {
            title: string_field(result, "title"),
            url: string_field(result, "url"),
            snippet: string_field(result, "text").trim().to_string(),
        })
        .collect()
}

#[async_trait]
impl SearchProvider for ExaBackend {
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
