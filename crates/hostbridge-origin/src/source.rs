use async_trait::async_trait;

use crate::error::Result;
use crate::fallback::fallback_list;

/// Where the dynamic allow-list comes from.
#[async_trait]
pub trait OriginListSource: Send + Sync {
    /// Fetch and validate the allow-list.
    async fn fetch(&self) -> Result<Vec<String>>;
}

/// Fixed in-memory allow-list. Used offline and in tests.
#[derive(Debug, Clone)]
pub struct StaticOriginSource {
    origins: Vec<String>,
}

impl StaticOriginSource {
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            origins: origins.into_iter().map(Into::into).collect(),
        }
    }

    /// Serve the built-in fallback list without touching the network.
    pub fn fallback() -> Self {
        Self {
            origins: fallback_list(),
        }
    }
}

#[async_trait]
impl OriginListSource for StaticOriginSource {
    async fn fetch(&self) -> Result<Vec<String>> {
        Ok(self.origins.clone())
    }
}

#[cfg(feature = "fetch")]
mod http {
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::Value;

    use super::OriginListSource;
    use crate::document::parse_allow_list;
    use crate::error::{OriginError, Result};

    /// Fetches the published allow-list document over HTTPS.
    #[derive(Debug, Clone)]
    pub struct HttpOriginSource {
        client: reqwest::Client,
        endpoint: String,
    }

    impl HttpOriginSource {
        /// Build a source for `endpoint`. `timeout` bounds each request.
        pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|err| OriginError::Fetch(err.to_string()))?;
            Ok(Self {
                client,
                endpoint: endpoint.into(),
            })
        }

        pub fn endpoint(&self) -> &str {
            &self.endpoint
        }
    }

    #[async_trait]
    impl OriginListSource for HttpOriginSource {
        async fn fetch(&self) -> Result<Vec<String>> {
            tracing::debug!(endpoint = %self.endpoint, "fetching valid origins list");

            let response = self
                .client
                .get(&self.endpoint)
                .send()
                .await
                .map_err(|err| OriginError::Fetch(err.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(OriginError::HttpStatus(status.as_u16()));
            }

            let document: Value = response
                .json()
                .await
                .map_err(|err| OriginError::Fetch(err.to_string()))?;
            parse_allow_list(&document)
        }
    }
}

#[cfg(feature = "fetch")]
pub use http::HttpOriginSource;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::FALLBACK_VALID_ORIGINS;

    #[tokio::test]
    async fn static_source_returns_its_list() {
        let source = StaticOriginSource::new(["a.example.com", "*.b.example.com"]);
        assert_eq!(
            source.fetch().await.unwrap(),
            vec!["a.example.com", "*.b.example.com"]
        );
    }

    #[tokio::test]
    async fn fallback_source_serves_builtin_list() {
        let list = StaticOriginSource::fallback().fetch().await.unwrap();
        assert_eq!(list.len(), FALLBACK_VALID_ORIGINS.len());
        assert!(list.iter().any(|origin| origin == "teams.microsoft.com"));
    }

    #[cfg(feature = "fetch")]
    #[test]
    fn http_source_keeps_endpoint() {
        let source = HttpOriginSource::new(
            "https://example.invalid/origins.json",
            std::time::Duration::from_millis(10),
        )
        .unwrap();
        assert_eq!(source.endpoint(), "https://example.invalid/origins.json");
    }
}
