mod exa;
mod google;
mod youcom;

use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode, header};
use serde_json::Value;

use crate::{PageContents, SearchError};

pub use exa::ExaBackend;
pub use google::GoogleBackend;
pub use youcom::YouComBackend;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Send `request` and decode a JSON body. Anything but 200 is an error
/// carrying the response text.
async fn send_json(backend: &'static str, request: RequestBuilder) -> Result<Value, SearchError> {
    let response = request
        .send()
        .await
        .map_err(|source| SearchError::Http { backend, source })?;
    let status = response.status();
    tracing::debug!(backend, status = status.as_u16(), "search response received");
    if status != StatusCode::OK {
        let body = response.text().await.unwrap_or_default();
        return Err(SearchError::Status {
            backend,
            status: status.as_u16(),
            body,
        });
    }
    response
        .json::<Value>()
        .await
        .map_err(|error| SearchError::Decode {
            backend,
            message: error.to_string(),
        })
}

async fn fetch_page(
    backend: &'static str,
    http: &reqwest::Client,
    url: &str,
) -> Result<PageContents, SearchError> {
    tracing::debug!(backend, url, "fetching page");
    let response = http
        .get(url)
        .timeout(FETCH_TIMEOUT)
        .send()
        .await
        .map_err(|source| SearchError::Http { backend, source })?;
    let status = response.status();
    if status != StatusCode::OK {
        return Err(SearchError::Status {
            backend,
            status: status.as_u16(),
            body: format!("failed to fetch {url}"),
        });
    }
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let text = response
        .text()
        .await
        .map_err(|source| SearchError::Http { backend, source })?;
    Ok(PageContents {
        url: url.to_string(),
        status: status.as_u16(),
        content_type,
        text,
    })
}

fn string_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn array_field<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}
