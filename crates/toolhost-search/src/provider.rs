use std::time::Duration;

use async_trait::async_trait;

use crate::backends::{ExaBackend, GoogleBackend, YouComBackend};
use crate::{Credentials, PageContents, SearchConfig, SearchError, SearchResults};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Search capability shared by every backend.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn search(&self, query: &str, top_n: usize) -> Result<SearchResults, SearchError>;

    async fn fetch(&self, url: &str) -> Result<PageContents, SearchError>;
}

/// The configured backend. Built once from validated configuration.
#[derive(Clone, Debug)]
pub enum SearchBackend {
    Google(GoogleBackend),
    Exa(ExaBackend),
    YouCom(YouComBackend),
}

impl SearchBackend {
    pub fn from_config(config: &SearchConfig) -> Result<Self, SearchError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|source| SearchError::Http {
                backend: config.backend().id(),
                source,
            })?;
        Ok(Self::with_client(config, http))
    }

    pub fn with_client(config: &SearchConfig, http: reqwest::Client) -> Self {
        let backend = match &config.credentials {
            Credentials::Google { api_key, cx } => {
                Self::Google(GoogleBackend::new(http, api_key.clone(), cx.clone()))
            }
            Credentials::Exa { api_key } => Self::Exa(ExaBackend::new(http, api_key.clone())),
            Credentials::YouCom { api_key } => {
                Self::YouCom(YouComBackend::new(http, api_key.clone()))
            }
        };
        tracing::info!(backend = backend.name(), "search backend configured");
        backend
    }

    fn provider(&self) -> &dyn SearchProvider {
        match self {
            Self::Google(backend) => backend,
            Self::Exa(backend) => backend,
            Self::YouCom(backend) => backend,
        }
    }
}

#[async_trait]
impl SearchProvider for SearchBackend {
    fn name(&self) -> &'static str {
        self.provider().name()
    }

    async fn search(&self, query: &str, top_n: usize) -> Result<SearchResults, SearchError> {
        self.provider().search(query, top_n).await
    }

    async fn fetch(&self, url: &str) -> Result<PageContents, SearchError> {
        self.provider().fetch(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_selects_matching_variant() {
        let config = SearchConfig {
            credentials: Credentials::Exa {
                api_key: "k".to_string(),
            },
        };
        let backend = SearchBackend::from_config(&config).expect("backend should build");
        assert!(matches!(backend, SearchBackend::Exa(_)));
        assert_eq!(backend.name(), "exa");
    }

    #[test]
    fn google_variant_reports_its_name() {
        let config = SearchConfig {
            credentials: Credentials::Google {
                api_key: "k".to_string(),
                cx: "c".to_string(),
            },
        };
        let backend = SearchBackend::with_client(&config, reqwest::Client::new());
        assert_eq!(backend.name(), "google");
    }
}
