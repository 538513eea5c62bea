// Agent identity and registration keys
pub mod identity;

// Time source for rate calculation
pub mod clock;

// Counter-to-rate conversion
pub mod processor;

// Field extraction from fetched documents
pub mod extract;

// Reported metrics and sinks
pub mod metric;

// Configuration
pub mod config;

pub use identity::AgentIdentity;
pub use metric::{MetricName, MetricSink, MetricSpec, ReportedMetric};
pub use processor::{RateProcessor, RateResult};
