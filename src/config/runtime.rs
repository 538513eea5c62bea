use super::{PulseConfig, SinkKind};

/// Applies `PULSE_*` environment variables on top of a loaded configuration.
///
/// Values that fail to parse are ignored.
pub fn apply_env_overrides(config: &mut PulseConfig) {
    apply_overrides(config, |key| std::env::var(key).ok());
}

/// Applies overrides from an arbitrary key lookup.
///
/// Recognised keys:
/// - `PULSE_POLL_INTERVAL_SECS`
/// - `PULSE_FETCH_TIMEOUT_SECS`
/// - `PULSE_SINK_URL` (also switches the sink to HTTP)
/// - `PULSE_API_PORT`
pub fn apply_overrides<F>(config: &mut PulseConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("PULSE_POLL_INTERVAL_SECS") {
        if let Ok(n) = v.parse::<u64>() {
            config.scheduler.poll_interval_secs = n;
        }
    }
    if let Some(v) = lookup("PULSE_FETCH_TIMEOUT_SECS") {
        if let Ok(n) = v.parse::<u64>() {
            config.fetch.timeout_secs = n;
        }
    }
    if let Some(v) = lookup("PULSE_SINK_URL") {
        if !v.is_empty() {
            config.sink.kind = SinkKind::Http;
            config.sink.url = Some(v);
        }
    }
    if let Some(v) = lookup("PULSE_API_PORT") {
        if let Ok(port) = v.parse::<u16>() {
            config.api.port = port;
        }
    }
}
