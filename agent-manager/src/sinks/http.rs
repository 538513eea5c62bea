//! HTTP sink - batches metrics and POSTs them to a collector.
//!
//! `report()` only appends to an in-memory buffer; a background task drains
//! the buffer on its own interval. A failed delivery puts the batch back so
//! the next flush retries it.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use pulse::metric::{MetricSink, ReportedMetric};
use pulse::AgentIdentity;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// One buffered metric, in wire form.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetricRecord {
    pub guid: String,
    pub label: String,
    pub name: String,
    pub unit: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct Component<'a> {
    guid: &'a str,
    version: &'a str,
    label: &'a str,
}

#[derive(Debug, Serialize)]
struct Payload<'a> {
    sent_at: DateTime<Utc>,
    components: Vec<Component<'a>>,
    metrics: &'a [MetricRecord],
}

/// Bounded FIFO; the oldest records are dropped first.
#[derive(Debug)]
struct MetricBuffer {
    records: VecDeque<MetricRecord>,
    max_size: usize,
    dropped: u64,
}

impl MetricBuffer {
    fn new(max_size: usize) -> Self {
        Self {
            records: VecDeque::new(),
            max_size,
            dropped: 0,
        }
    }

    fn push(&mut self, record: MetricRecord) {
        self.records.push_back(record);
        self.trim();
    }

    /// Puts a failed batch back in front of anything reported since.
    fn requeue(&mut self, batch: Vec<MetricRecord>) {
        for record in batch.into_iter().rev() {
            self.records.push_front(record);
        }
        self.trim();
    }

    fn drain(&mut self) -> Vec<MetricRecord> {
        self.records.drain(..).collect()
    }

    fn trim(&mut self) {
        while self.records.len() > self.max_size {
            self.records.pop_front();
            self.dropped += 1;
        }
    }
}

/// Handle to a running flush loop.
pub struct FlushLoop {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl FlushLoop {
    /// Stops the loop and waits for any in-flight flush to finish.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Metric flush loop ended abnormally");
        }
    }
}

/// Sink that delivers metrics to an HTTP collector in batches.
pub struct HttpSink {
    url: String,
    http_client: reqwest::Client,
    buffer: Mutex<MetricBuffer>,
    components: Mutex<Vec<AgentIdentity>>,
}

impl HttpSink {
    /// Creates a sink posting to `url`, buffering at most `buffer_max_size`
    /// metrics between flushes.
    pub fn new(url: impl Into<String>, buffer_max_size: usize) -> Result<Self> {
        Self::with_timeout(url, buffer_max_size, REQUEST_TIMEOUT)
    }

    /// Same as [`HttpSink::new`] with a custom per-request timeout.
    pub fn with_timeout(
        url: impl Into<String>,
        buffer_max_size: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for sink")?;

        Ok(Self {
            url: url.into(),
            http_client,
            buffer: Mutex::new(MetricBuffer::new(buffer_max_size.max(1))),
            components: Mutex::new(Vec::new()),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Number of metrics waiting for delivery.
    pub fn buffered(&self) -> usize {
        self.lock_buffer().records.len()
    }

    /// Metrics discarded because the buffer was full.
    pub fn dropped(&self) -> u64 {
        self.lock_buffer().dropped
    }

    /// Sends everything buffered in one request.
    ///
    /// Returns the number of metrics delivered. On failure the batch is
    /// requeued and the error returned.
    pub async fn flush(&self) -> Result<usize> {
        let batch = self.lock_buffer().drain();
        if batch.is_empty() {
            return Ok(0);
        }

        match self.send(&batch).await {
            Ok(()) => {
                debug!(metric_count = batch.len(), url = %self.url, "Flushed metrics");
                Ok(batch.len())
            }
            Err(e) => {
                self.lock_buffer().requeue(batch);
                Err(e)
            }
        }
    }

    /// Spawns a task that flushes every `every` until stopped.
    ///
    /// A flush already in progress when the loop is stopped runs to
    /// completion, so its batch is either delivered or requeued.
    pub fn spawn_flush_loop(self: Arc<Self>, every: Duration) -> FlushLoop {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            info!(
                url = %self.url,
                interval_ms = every.as_millis() as u64,
                "Starting metric flush loop"
            );

            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await; // nothing to send yet

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = stop_rx.changed() => break,
                }
                if let Err(e) = self.flush().await {
                    warn!(
                        error = %e,
                        buffered = self.buffered(),
                        "Metric flush failed, will retry"
                    );
                }
            }

            debug!("Metric flush loop stopped");
        });

        FlushLoop { stop_tx, handle }
    }

    async fn send(&self, batch: &[MetricRecord]) -> Result<()> {
        let components = self.lock_components().clone();
        let payload = Payload {
            sent_at: Utc::now(),
            components: components
                .iter()
                .map(|c| Component {
                    guid: &c.guid,
                    version: &c.version,
                    label: &c.label,
                })
                .collect(),
            metrics: batch,
        };

        let response = self
            .http_client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .context("Failed to send metrics to collector")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());

            anyhow::bail!("Collector returned error status {}: {}", status, body);
        }

        Ok(())
    }

    fn lock_buffer(&self) -> std::sync::MutexGuard<'_, MetricBuffer> {
        self.buffer.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_components(&self) -> std::sync::MutexGuard<'_, Vec<AgentIdentity>> {
        self.components.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl MetricSink for HttpSink {
    fn register(&self, identity: &AgentIdentity) {
        let mut components = self.lock_components();
        if !components.contains(identity) {
            components.push(identity.clone());
        }
    }

    fn report(&self, source: &AgentIdentity, metric: ReportedMetric) {
        self.lock_buffer().push(MetricRecord {
            guid: source.guid.clone(),
            label: source.label.clone(),
            name: metric.name,
            unit: metric.unit,
            value: metric.value,
            timestamp: Utc::now(),
        });
    }
}
