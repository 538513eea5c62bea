//! Agent registry - builds agents from configuration.
//!
//! Supported kinds:
//! - `wikipedia`: article count and creation rate for a MediaWiki host
//! - `json`: any JSON endpoint, with fields and metric names from config

use crate::agent::Agent;
use crate::agents::wikipedia::WikipediaAgent;
use crate::error::ConfigurationError;
use crate::fetcher::{EndpointConfig, HttpFetcher};
use crate::polling::PollingAgent;
use pulse::clock::Clock;
use pulse::config::{AgentDefinition, FetchConfig};
use pulse::metric::MetricSink;
use pulse::AgentIdentity;
use std::sync::Arc;

const DEFAULT_JSON_GUID: &str = "io.pulse.json";
const DEFAULT_JSON_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns all agent kinds that can be built from configuration.
pub fn available_kinds() -> &'static [&'static str] {
    &["json", "wikipedia"]
}

/// Builds the agent described by `definition`.
///
/// Every configuration problem surfaces here, before any polling starts.
pub fn build_agent(
    definition: &AgentDefinition,
    fetch: &FetchConfig,
    sink: Arc<dyn MetricSink>,
    clock: Arc<dyn Clock>,
) -> Result<Box<dyn Agent>, ConfigurationError> {
    match definition.kind.as_str() {
        "wikipedia" => {
            let endpoint = EndpointConfig::new(
                definition.scheme.as_str(),
                definition.host.as_str(),
                crate::agents::wikipedia::config::STATISTICS_PATH,
            );
            let agent =
                WikipediaAgent::with_endpoint(&definition.name, endpoint, fetch, sink, clock)?;
            Ok(Box::new(agent))
        }
        "json" => {
            let path = definition.path.as_deref().unwrap_or("/");
            let endpoint =
                EndpointConfig::new(definition.scheme.as_str(), definition.host.as_str(), path);
            let fetcher = HttpFetcher::new(&endpoint, fetch)?;
            let identity = AgentIdentity::new(
                definition
                    .guid
                    .clone()
                    .unwrap_or_else(|| DEFAULT_JSON_GUID.to_string()),
                definition
                    .version
                    .clone()
                    .unwrap_or_else(|| DEFAULT_JSON_VERSION.to_string()),
                definition.name.as_str(),
            );
            let agent = PollingAgent::new(
                identity,
                Box::new(fetcher),
                definition.metrics.clone(),
                sink,
                clock,
            )?;
            Ok(Box::new(agent))
        }
        other => Err(ConfigurationError::UnknownKind {
            kind: other.to_string(),
            available: available_kinds().join(", "),
        }),
    }
}
