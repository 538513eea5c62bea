//! Metric sink selection.

pub mod http;

pub use http::{FlushLoop, HttpSink};

use anyhow::{Context, Result};
use pulse::config::{SinkConfig, SinkKind};
use pulse::metric::{MetricSink, TracingSink};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// The sink agents report into, plus its delivery task if it has one.
pub struct ActiveSink {
    sink: Arc<dyn MetricSink>,
    http: Option<Arc<HttpSink>>,
    flush_loop: Option<FlushLoop>,
}

impl ActiveSink {
    /// Builds the configured sink and starts its flush loop.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn start(config: &SinkConfig) -> Result<Self> {
        match config.kind {
            SinkKind::Log => {
                info!("Reporting metrics to the log");
                Ok(Self {
                    sink: Arc::new(TracingSink),
                    http: None,
                    flush_loop: None,
                })
            }
            SinkKind::Http => {
                let url = config
                    .url
                    .as_deref()
                    .context("HTTP sink requires sink.url")?;
                let http = Arc::new(HttpSink::new(url, config.buffer_max_size)?);
                let flush_loop = Arc::clone(&http)
                    .spawn_flush_loop(Duration::from_secs(config.flush_interval_secs));

                info!(url = %url, "Reporting metrics over HTTP");
                Ok(Self {
                    sink: Arc::clone(&http) as Arc<dyn MetricSink>,
                    http: Some(http),
                    flush_loop: Some(flush_loop),
                })
            }
        }
    }

    pub fn sink(&self) -> Arc<dyn MetricSink> {
        Arc::clone(&self.sink)
    }

    /// Stops the flush loop and makes one last delivery attempt.
    ///
    /// Waits for an in-flight flush first, so nothing it drained is lost.
    pub async fn shutdown(mut self) {
        if let Some(flush_loop) = self.flush_loop.take() {
            flush_loop.stop().await;
        }
        if let Some(http) = &self.http {
            match http.flush().await {
                Ok(count) => info!(metric_count = count, "Final metric flush complete"),
                Err(e) => warn!(
                    error = %e,
                    lost = http.buffered(),
                    "Final metric flush failed"
                ),
            }
        }
    }
}
