pub mod runtime;
pub use runtime::{apply_env_overrides, apply_overrides};

use crate::metric::MetricSpec;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::warn;

/// Complete agent configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PulseConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub agents: Vec<AgentDefinition>,
}

/// Scheduler configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Fixed-rate cadence between cycle starts (seconds)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Upper bound on a single poll cycle (seconds)
    #[serde(default = "default_cycle_timeout")]
    pub cycle_timeout_secs: u64,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

fn default_poll_interval() -> u64 {
    60
}

fn default_cycle_timeout() -> u64 {
    30
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            cycle_timeout_secs: default_cycle_timeout(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// What the scheduler does after repeated failed cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Keep polling at the configured interval
    #[default]
    Fixed,
    /// After `after_failures` consecutive failures, double the wait per
    /// further failure, capped at `max_interval_secs`
    Backoff {
        after_failures: u32,
        max_interval_secs: u64,
    },
}

/// Remote fetch configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Per-request timeout (seconds). Must be greater than zero.
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_fetch_timeout() -> u64 {
    10
}

fn default_user_agent() -> String {
    "pulse-agent/0.1".to_string()
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    #[default]
    Log,
    Http,
}

/// Metric sink configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SinkConfig {
    #[serde(default)]
    pub kind: SinkKind,
    /// Ingestion URL, required for the HTTP sink
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_flush_interval")]
    pub flush_interval_secs: u64,
    /// Records kept while the backend is unreachable; oldest are dropped first
    #[serde(default = "default_buffer_max_size")]
    pub buffer_max_size: usize,
}

fn default_flush_interval() -> u64 {
    60
}

fn default_buffer_max_size() -> usize {
    10_000
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: SinkKind::default(),
            url: None,
            flush_interval_secs: default_flush_interval(),
            buffer_max_size: default_buffer_max_size(),
        }
    }
}

/// Status API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_enabled")]
    pub enabled: bool,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

fn default_api_enabled() -> bool {
    true
}

fn default_api_port() -> u16 {
    3002
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: default_api_enabled(),
            port: default_api_port(),
        }
    }
}

/// One agent instance to build at start-up.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentDefinition {
    /// Agent kind (e.g., "wikipedia", "json")
    pub kind: String,
    /// Human readable instance label
    pub name: String,
    /// Target host, optionally with port
    pub host: String,
    #[serde(default = "default_scheme")]
    pub scheme: String,
    /// Path and query (json agents)
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub guid: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    /// Fields to report (json agents)
    #[serde(default)]
    pub metrics: Vec<MetricSpec>,
    /// Overrides `scheduler.poll_interval_secs` for this agent
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
}

fn default_scheme() -> String {
    "https".to_string()
}

impl PulseConfig {
    /// Checks values that would otherwise only fail once polling starts.
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.poll_interval_secs == 0 {
            bail!("scheduler.poll_interval_secs must be greater than zero");
        }
        if self.scheduler.cycle_timeout_secs == 0 {
            bail!("scheduler.cycle_timeout_secs must be greater than zero");
        }
        if let FailurePolicy::Backoff { after_failures, .. } = self.scheduler.failure_policy {
            if after_failures == 0 {
                bail!("scheduler.failure_policy.after_failures must be greater than zero");
            }
        }
        if self.fetch.timeout_secs == 0 {
            bail!("fetch.timeout_secs must be greater than zero");
        }
        if self.sink.kind == SinkKind::Http && self.sink.url.is_none() {
            bail!("sink.url is required when sink.kind = \"http\"");
        }
        if self.sink.flush_interval_secs == 0 {
            bail!("sink.flush_interval_secs must be greater than zero");
        }
        if self.sink.buffer_max_size == 0 {
            bail!("sink.buffer_max_size must be greater than zero");
        }
        for agent in &self.agents {
            if agent.poll_interval_secs == Some(0) {
                bail!("agent '{}': poll_interval_secs must be greater than zero", agent.name);
            }
        }
        Ok(())
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: impl AsRef<Path>) -> Result<PulseConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: PulseConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}

/// Load configuration from a TOML file, falling back to defaults if it does not exist.
pub fn load_or_default(path: impl AsRef<Path>) -> Result<PulseConfig> {
    let path = path.as_ref();
    if !path.exists() {
        warn!(path = %path.display(), "Config file not found, using defaults");
        return Ok(PulseConfig::default());
    }
    load_config(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = PulseConfig::default();
        assert_eq!(config.scheduler.poll_interval_secs, 60);
        assert_eq!(config.scheduler.cycle_timeout_secs, 30);
        assert_eq!(config.scheduler.failure_policy, FailurePolicy::Fixed);
        assert_eq!(config.fetch.timeout_secs, 10);
        assert_eq!(config.sink.kind, SinkKind::Log);
        assert_eq!(config.sink.buffer_max_size, 10_000);
        assert!(config.api.enabled);
        assert_eq!(config.api.port, 3002);
        assert!(config.agents.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
            [scheduler]
            poll_interval_secs = 30
            cycle_timeout_secs = 20

            [scheduler.failure_policy]
            mode = "backoff"
            after_failures = 3
            max_interval_secs = 900

            [fetch]
            timeout_secs = 5

            [sink]
            kind = "http"
            url = "http://localhost:8080/api/metrics"
            flush_interval_secs = 15

            [api]
            enabled = false

            [[agents]]
            kind = "wikipedia"
            name = "Wikipedia EN"
            host = "en.wikipedia.org"

            [[agents]]
            kind = "json"
            name = "Stats"
            host = "stats.example.com"
            path = "/v1/stats"
            poll_interval_secs = 120

            [[agents.metrics]]
            field = "totals.requests"
            rate = { name = "Requests/Rate", unit = "requests/sec" }
        "#;

        let config: PulseConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.scheduler.poll_interval_secs, 30);
        assert_eq!(
            config.scheduler.failure_policy,
            FailurePolicy::Backoff {
                after_failures: 3,
                max_interval_secs: 900
            }
        );
        assert_eq!(config.fetch.timeout_secs, 5);
        assert_eq!(config.fetch.user_agent, "pulse-agent/0.1"); // Default
        assert_eq!(config.sink.kind, SinkKind::Http);
        assert_eq!(config.sink.flush_interval_secs, 15);
        assert!(!config.api.enabled);

        assert_eq!(config.agents.len(), 2);
        assert_eq!(config.agents[0].scheme, "https");
        assert!(config.agents[0].metrics.is_empty());
        assert_eq!(config.agents[1].path.as_deref(), Some("/v1/stats"));
        assert_eq!(config.agents[1].poll_interval_secs, Some(120));
        assert_eq!(config.agents[1].metrics[0].field.to_string(), "totals.requests");
        assert!(config.agents[1].metrics[0].gauge.is_none());

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config() {
        let toml = r#"
            [fetch]
            timeout_secs = 3
        "#;

        let config: PulseConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.fetch.timeout_secs, 3);
        assert_eq!(config.scheduler.poll_interval_secs, 60); // Default
        assert_eq!(config.sink.kind, SinkKind::Log); // Default
    }

    #[test]
    fn test_invalid_field_path_rejected() {
        let toml = r#"
            [[agents]]
            kind = "json"
            name = "Broken"
            host = "example.com"

            [[agents.metrics]]
            field = "a..b"
            gauge = { name = "X", unit = "x" }
        "#;

        assert!(toml::from_str::<PulseConfig>(toml).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = PulseConfig::default();
        config.fetch.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = PulseConfig::default();
        config.scheduler.poll_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = PulseConfig::default();
        config.scheduler.failure_policy = FailurePolicy::Backoff {
            after_failures: 0,
            max_interval_secs: 60,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_http_sink_url() {
        let mut config = PulseConfig::default();
        config.sink.kind = SinkKind::Http;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sink.url"));

        config.sink.url = Some("http://localhost:8080".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [[agents]]
            kind = "wikipedia"
            name = "Wikipedia DE"
            host = "de.wikipedia.org"
            "#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.agents.len(), 1);
        assert_eq!(config.agents[0].host, "de.wikipedia.org");
    }

    #[test]
    fn test_load_config_parse_error_mentions_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[scheduler\npoll_interval_secs = ").unwrap();

        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_or_default(dir.path().join("missing.toml")).unwrap();
        assert!(config.agents.is_empty());
        assert_eq!(config.scheduler.poll_interval_secs, 60);
    }
}
