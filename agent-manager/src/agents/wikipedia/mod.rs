pub mod config;

use crate::agent::{Agent, CycleOutcome};
use crate::error::ConfigurationError;
use crate::fetcher::{EndpointConfig, HttpFetcher};
use crate::polling::PollingAgent;
use async_trait::async_trait;
use pulse::clock::Clock;
use pulse::config::FetchConfig;
use pulse::metric::MetricSink;
use pulse::AgentIdentity;
use std::sync::Arc;

use self::config::{metric_specs, GUID, SCHEME, STATISTICS_PATH, VERSION};

/// Wikipedia agent. Polls a MediaWiki site's statistics API and reports
/// the article count and the article creation rate.
pub struct WikipediaAgent {
    inner: PollingAgent,
}

impl WikipediaAgent {
    /// Create an agent for `host` (e.g., "en.wikipedia.org") over HTTPS.
    ///
    /// `name` becomes the agent's human readable label.
    pub fn new(
        name: &str,
        host: &str,
        fetch: &FetchConfig,
        sink: Arc<dyn MetricSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigurationError> {
        let endpoint = EndpointConfig::new(SCHEME, host, STATISTICS_PATH);
        Self::with_endpoint(name, endpoint, fetch, sink, clock)
    }

    /// Create an agent with a custom endpoint (for testing with a mock server).
    pub fn with_endpoint(
        name: &str,
        endpoint: EndpointConfig,
        fetch: &FetchConfig,
        sink: Arc<dyn MetricSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigurationError> {
        let fetcher = HttpFetcher::new(&endpoint, fetch)?;
        let inner = PollingAgent::new(
            AgentIdentity::new(GUID, VERSION, name),
            Box::new(fetcher),
            metric_specs(),
            sink,
            clock,
        )?;
        Ok(Self { inner })
    }
}

#[async_trait]
impl Agent for WikipediaAgent {
    fn identity(&self) -> &AgentIdentity {
        self.inner.identity()
    }

    async fn poll_cycle(&mut self) -> CycleOutcome {
        self.inner.poll_cycle().await
    }
}
