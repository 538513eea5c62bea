//! Reported metrics and the sink they are delivered to.
//!
//! # Architecture
//!
//! ```text
//! Agent poll cycle
//!      ↓ report_metric(name, unit, value)
//! ┌─────────────────────────────────────────┐
//! │       MetricSink (implements trait)      │
//! │  - TracingSink: log each metric          │
//! │  - MemorySink: keep every record         │
//! │  - HttpSink: buffer + periodic POST      │
//! └─────────────────────────────────────────┘
//!      ↓
//!  Monitoring backend
//! ```
//!
//! Delivery is fire-and-forget: sinks never return errors to agents.

use crate::extract::FieldPath;
use crate::identity::AgentIdentity;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::info;


/// Name and unit of a reported metric, e.g. `Articles/Count` in `articles`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricName {
    pub name: String,
    pub unit: String,
}

impl MetricName {
    pub fn new(name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
        }
    }
}

/// One metric value on its way to the sink.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReportedMetric {
    pub name: String,
    pub unit: String,
    pub value: f64,
}

impl ReportedMetric {
    pub fn new(name: impl Into<String>, unit: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            value,
        }
    }
}

/// What to report for one numeric field of a fetched document.
///
/// `gauge` reports the absolute value; `rate` reports its per-second rate of
/// change. The two outputs are independent: an undefined rate never
/// suppresses the gauge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricSpec {
    pub field: FieldPath,
    #[serde(default)]
    pub gauge: Option<MetricName>,
    #[serde(default)]
    pub rate: Option<MetricName>,
}

/// Downstream receiver of reported metrics.
pub trait MetricSink: Send + Sync {
    /// Called once when an agent is registered.
    fn register(&self, _identity: &AgentIdentity) {}

    /// Delivers one metric. Must not block on network I/O.
    fn report(&self, source: &AgentIdentity, metric: ReportedMetric);
}

/// Logs every metric.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl MetricSink for TracingSink {
    fn register(&self, identity: &AgentIdentity) {
        info!(
            guid = %identity.guid,
            version = %identity.version,
            agent = %identity.label,
            "Agent registered with sink"
        );
    }

    fn report(&self, source: &AgentIdentity, metric: ReportedMetric) {
        info!(
            agent = %source.label,
            metric = %metric.name,
            unit = %metric.unit,
            value = metric.value,
            "Metric reported"
        );
    }
}

/// A metric together with the agent that reported it.
#[derive(Clone, Debug, PartialEq)]
pub struct SinkRecord {
    pub source: AgentIdentity,
    pub metric: ReportedMetric,
}

/// Keeps every reported metric in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    registered: Mutex<Vec<AgentIdentity>>,
    records: Mutex<Vec<SinkRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every record reported so far.
    pub fn records(&self) -> Vec<SinkRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Returns the latest value reported under `name`.
    pub fn latest(&self, name: &str) -> Option<f64> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .rev()
            .find(|r| r.metric.name == name)
            .map(|r| r.metric.value)
    }

    pub fn registered(&self) -> Vec<AgentIdentity> {
        self.registered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl MetricSink for MemorySink {
    fn register(&self, identity: &AgentIdentity) {
        self.registered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(identity.clone());
    }

    fn report(&self, source: &AgentIdentity, metric: ReportedMetric) {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(SinkRecord {
                source: source.clone(),
                metric,
            });
    }
}
