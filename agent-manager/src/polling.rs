//! Composed polling agent.
//!
//! One [`PollingAgent`] owns a remote fetcher, a list of fields to extract and
//! one [`RateProcessor`] per rate output. Per cycle:
//!
//! 1. fetch; on failure log and end the cycle (nothing reported)
//! 2. extract each field; a missing field is logged and skipped
//! 3. feed the value to the field's rate processor, if it has one
//! 4. report the rate (only when defined) and the gauge independently
//!
//! Processor state only ever advances on a successfully extracted sample,
//! and reporting happens after the state update, so a failed fetch or an
//! unreachable sink cannot corrupt the baseline.

use crate::agent::{Agent, CycleOutcome};
use crate::error::ConfigurationError;
use crate::fetcher::RemoteFetcher;
use async_trait::async_trait;
use pulse::clock::Clock;
use pulse::extract::{extract, FieldPath};
use pulse::metric::{MetricSink, MetricSpec, ReportedMetric};
use pulse::processor::{RateProcessor, RateResult, Sample};
use pulse::AgentIdentity;
use std::sync::Arc;
use tracing::{debug, warn};

struct TrackedField {
    spec: MetricSpec,
    rate: Option<RateProcessor>,
}

/// Generic fetch → extract → rate → report agent.
pub struct PollingAgent {
    identity: AgentIdentity,
    fetcher: Box<dyn RemoteFetcher>,
    fields: Vec<TrackedField>,
    sink: Arc<dyn MetricSink>,
    clock: Arc<dyn Clock>,
}

impl PollingAgent {
    /// Creates an agent reporting `specs` from documents returned by `fetcher`.
    ///
    /// Fails if `specs` is empty or a spec has neither a gauge nor a rate.
    pub fn new(
        identity: AgentIdentity,
        fetcher: Box<dyn RemoteFetcher>,
        specs: Vec<MetricSpec>,
        sink: Arc<dyn MetricSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigurationError> {
        if specs.is_empty() {
            return Err(ConfigurationError::NoMetrics(identity.label.clone()));
        }

        let mut fields = Vec::with_capacity(specs.len());
        for spec in specs {
            if spec.gauge.is_none() && spec.rate.is_none() {
                return Err(ConfigurationError::EmptyMetric(spec.field.to_string()));
            }
            let rate = spec.rate.as_ref().map(|_| RateProcessor::new());
            fields.push(TrackedField { spec, rate });
        }

        Ok(Self {
            identity,
            fetcher,
            fields,
            sink,
            clock,
        })
    }

    /// Sends one metric to the sink under this agent's identity.
    pub fn report_metric(&self, name: &str, unit: &str, value: f64) {
        self.sink
            .report(&self.identity, ReportedMetric::new(name, unit, value));
    }

    /// Returns the rate baseline held for `field`, if it has a rate output.
    pub fn rate_baseline(&self, field: &FieldPath) -> Option<Sample> {
        self.fields
            .iter()
            .find(|f| &f.spec.field == field)
            .and_then(|f| f.rate.as_ref())
            .and_then(|p| p.last_sample())
    }
}

#[async_trait]
impl Agent for PollingAgent {
    fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    async fn poll_cycle(&mut self) -> CycleOutcome {
        let raw = match self.fetcher.fetch().await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(
                    agent = %self.identity.label,
                    kind = %e.kind(),
                    timeout = e.is_timeout(),
                    error = %e,
                    "Fetch failed, skipping cycle"
                );
                return CycleOutcome::FetchFailed(e.kind());
            }
        };

        let now = self.clock.now();
        let mut outgoing: Vec<ReportedMetric> = Vec::new();
        let mut missing = 0usize;

        for field in &mut self.fields {
            let value = match extract(&raw, &field.spec.field) {
                Some(value) => value,
                None => {
                    warn!(
                        agent = %self.identity.label,
                        field = %field.spec.field,
                        "Field missing or not numeric"
                    );
                    missing += 1;
                    continue;
                }
            };

            if let (Some(processor), Some(rate_name)) = (field.rate.as_mut(), &field.spec.rate) {
                match processor.process(value, now) {
                    Ok(RateResult::Rate(rate)) => {
                        outgoing.push(ReportedMetric::new(&rate_name.name, &rate_name.unit, rate));
                    }
                    Ok(undefined) => {
                        debug!(
                            agent = %self.identity.label,
                            metric = %rate_name.name,
                            result = %undefined,
                            "Rate undefined this cycle"
                        );
                    }
                    Err(e) => {
                        warn!(
                            agent = %self.identity.label,
                            field = %field.spec.field,
                            error = %e,
                            "Rejected counter sample"
                        );
                    }
                }
            }

            if let Some(gauge) = &field.spec.gauge {
                outgoing.push(ReportedMetric::new(&gauge.name, &gauge.unit, value));
            }
        }

        if missing == self.fields.len() {
            return CycleOutcome::ExtractionMissed;
        }

        let count = outgoing.len();
        for metric in outgoing {
            self.sink.report(&self.identity, metric);
        }

        debug!(agent = %self.identity.label, metrics = count, "Poll cycle complete");
        CycleOutcome::Reported { metrics: count }
    }
}
