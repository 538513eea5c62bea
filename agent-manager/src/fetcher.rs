//! Remote fetch of structured state.
//!
//! [`EndpointConfig`] is resolved once, at agent construction, into an
//! immutable URL; a malformed target fails construction rather than the
//! first poll. [`HttpFetcher`] performs one bounded GET per call. The request
//! and response are owned by the call, so the connection is released on every
//! exit path. There is no internal retry.

use crate::error::{ConfigurationError, FetchError};
use async_trait::async_trait;
use pulse::config::FetchConfig;
use pulse::extract::RawResponse;
use reqwest::header::ACCEPT;
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::debug;

/// Fetches and parses the current remote state.
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    async fn fetch(&self) -> Result<RawResponse, FetchError>;
}

/// Unresolved fetch target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    pub scheme: String,
    /// Host, optionally with `:port`
    pub host: String,
    /// Path and query, starting with `/`
    pub path_and_query: String,
}

impl EndpointConfig {
    pub fn new(
        scheme: impl Into<String>,
        host: impl Into<String>,
        path_and_query: impl Into<String>,
    ) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            path_and_query: path_and_query.into(),
        }
    }

    /// Resolves the target into a well-formed URL.
    pub fn resolve(&self) -> Result<Url, ConfigurationError> {
        let scheme = self.scheme.to_ascii_lowercase();
        if scheme != "http" && scheme != "https" {
            return Err(ConfigurationError::UnsupportedScheme(self.scheme.clone()));
        }

        let host = self.host.trim();
        if host.is_empty()
            || host
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '@'))
        {
            return Err(ConfigurationError::InvalidHost(self.host.clone()));
        }

        if !self.path_and_query.starts_with('/') {
            return Err(ConfigurationError::InvalidPath(self.path_and_query.clone()));
        }

        let url = Url::parse(&format!("{}://{}{}", scheme, host, self.path_and_query))
            .map_err(|e| ConfigurationError::MalformedUrl(e.to_string()))?;

        match url.host_str() {
            Some(h) if !h.is_empty() => Ok(url),
            _ => Err(ConfigurationError::InvalidHost(self.host.clone())),
        }
    }
}

/// HTTP GET fetcher expecting a JSON body.
pub struct HttpFetcher {
    url: Url,
    http_client: Client,
}

impl HttpFetcher {
    /// Resolves the endpoint and builds a client with a finite timeout.
    pub fn new(endpoint: &EndpointConfig, config: &FetchConfig) -> Result<Self, ConfigurationError> {
        if config.timeout_secs == 0 {
            return Err(ConfigurationError::ZeroTimeout);
        }

        let url = endpoint.resolve()?;
        let http_client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(ConfigurationError::HttpClient)?;

        Ok(Self { url, http_client })
    }
}

#[async_trait]
impl RemoteFetcher for HttpFetcher {
    async fn fetch(&self) -> Result<RawResponse, FetchError> {
        debug!(url = %self.url, "Fetching remote state");

        let response = self
            .http_client
            .get(self.url.clone())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(FetchError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(FetchError::Transport)?;
        serde_json::from_slice(&body).map_err(FetchError::Parse)
    }
}
