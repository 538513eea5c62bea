//! Per-agent polling scheduler.
//!
//! Each agent gets its own scheduler task that invokes `poll_cycle()` on a
//! fixed-rate interval. The agent is owned by that task, so at most one cycle
//! per agent is ever in flight, and a slow agent never delays another.

use crate::agent::{Agent, CycleOutcome};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use pulse::config::{FailurePolicy, SchedulerConfig};
use pulse::AgentIdentity;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Timing and failure handling for a scheduler.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SchedulerSettings {
    /// Cadence between cycle starts
    pub interval: Duration,
    /// Upper bound on one cycle
    pub cycle_timeout: Duration,
    pub failure_policy: FailurePolicy,
}

impl SchedulerSettings {
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.poll_interval_secs),
            cycle_timeout: Duration::from_secs(config.cycle_timeout_secs),
            failure_policy: config.failure_policy,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Status information for a scheduled agent.
#[derive(Clone, Debug, Serialize)]
pub struct AgentStatus {
    #[serde(flatten)]
    pub identity: AgentIdentity,
    /// Polling interval in milliseconds
    pub interval_ms: u64,
    /// Last successful poll timestamp
    pub last_poll: Option<DateTime<Utc>>,
    /// Last error message (cleared on success)
    pub last_error: Option<String>,
    /// Summary of the most recent cycle
    pub last_outcome: Option<String>,
    /// Total cycles run
    pub cycle_count: u64,
    /// Total successful cycles
    pub poll_count: u64,
    /// Total failed cycles
    pub error_count: u64,
    /// Failed cycles since the last success
    pub consecutive_failures: u32,
    /// Cycles are skipped until this time
    pub backoff_until: Option<DateTime<Utc>>,
}

impl AgentStatus {
    pub fn new(identity: AgentIdentity, interval: Duration) -> Self {
        Self {
            identity,
            interval_ms: interval.as_millis() as u64,
            last_poll: None,
            last_error: None,
            last_outcome: None,
            cycle_count: 0,
            poll_count: 0,
            error_count: 0,
            consecutive_failures: 0,
            backoff_until: None,
        }
    }

    pub fn is_backing_off(&self) -> bool {
        self.backoff_until.map_or(false, |until| until > Utc::now())
    }
}

/// Result of one guarded cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleResult {
    Completed(CycleOutcome),
    Panicked(String),
    TimedOut,
}

impl CycleResult {
    pub fn is_success(&self) -> bool {
        matches!(self, CycleResult::Completed(outcome) if outcome.is_success())
    }
}

impl std::fmt::Display for CycleResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleResult::Completed(outcome) => write!(f, "{}", outcome),
            CycleResult::Panicked(msg) => write!(f, "panicked: {}", msg),
            CycleResult::TimedOut => write!(f, "timed out"),
        }
    }
}

/// How long to pause polling after `failures` consecutive failed cycles.
///
/// `None` means poll at the normal cadence.
pub fn backoff_delay(policy: FailurePolicy, failures: u32, interval: Duration) -> Option<Duration> {
    match policy {
        FailurePolicy::Fixed => None,
        FailurePolicy::Backoff {
            after_failures,
            max_interval_secs,
        } => {
            if failures < after_failures {
                return None;
            }
            let exponent = failures - after_failures + 1;
            let factor = 2u32.saturating_pow(exponent);
            let delay = interval
                .saturating_mul(factor)
                .min(Duration::from_secs(max_interval_secs));
            Some(delay)
        }
    }
}

/// Per-agent polling scheduler.
///
/// - Polls on a fixed-rate interval; missed ticks are skipped, never bursted
/// - Runs each cycle under a timeout and catches panics
/// - Applies the configured failure policy
/// - Tracks status (last poll, errors)
pub struct AgentScheduler {
    agent: Box<dyn Agent>,
    settings: SchedulerSettings,
    status: Arc<tokio::sync::Mutex<AgentStatus>>,
    backoff_until: Option<Instant>,
}

impl AgentScheduler {
    pub fn new(agent: Box<dyn Agent>, settings: SchedulerSettings) -> Self {
        let status = AgentStatus::new(agent.identity().clone(), settings.interval);
        Self {
            agent,
            settings,
            status: Arc::new(tokio::sync::Mutex::new(status)),
            backoff_until: None,
        }
    }

    /// Returns a clone of the status tracker for external monitoring.
    pub fn status(&self) -> Arc<tokio::sync::Mutex<AgentStatus>> {
        Arc::clone(&self.status)
    }

    /// Starts the polling loop (non-blocking).
    ///
    /// The first cycle runs immediately. Returns a JoinHandle; aborting it
    /// stops the agent.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        let label = self.agent.identity().label.clone();
        let period = self.settings.interval;

        tokio::spawn(async move {
            info!(
                agent = %label,
                interval_ms = period.as_millis() as u64,
                "Starting agent scheduler"
            );

            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut scheduler = self;

            loop {
                ticker.tick().await;

                if let Some(until) = scheduler.backoff_until {
                    if Instant::now() < until {
                        debug!(agent = %label, "Backing off, skipping cycle");
                        continue;
                    }
                }

                scheduler.run_cycle().await;
            }
        })
    }

    /// Runs one cycle with panic isolation and the cycle timeout, then
    /// records the result.
    pub async fn run_cycle(&mut self) -> CycleResult {
        debug!(agent = %self.agent.identity().label, "Polling agent");

        let cycle = AssertUnwindSafe(self.agent.poll_cycle()).catch_unwind();
        let result = match tokio::time::timeout(self.settings.cycle_timeout, cycle).await {
            Ok(Ok(outcome)) => CycleResult::Completed(outcome),
            Ok(Err(panic)) => CycleResult::Panicked(panic_message(panic.as_ref())),
            Err(_) => CycleResult::TimedOut,
        };

        self.record(&result).await;
        result
    }

    async fn record(&mut self, result: &CycleResult) {
        let label = self.agent.identity().label.clone();
        let mut status = self.status.lock().await;
        status.cycle_count += 1;
        status.last_outcome = Some(result.to_string());

        if result.is_success() {
            if status.consecutive_failures > 0 {
                info!(
                    agent = %label,
                    failures = status.consecutive_failures,
                    "Agent recovered"
                );
            }
            status.last_poll = Some(Utc::now());
            status.last_error = None;
            status.poll_count += 1;
            status.consecutive_failures = 0;
            status.backoff_until = None;
            self.backoff_until = None;
            return;
        }

        status.error_count += 1;
        status.consecutive_failures = status.consecutive_failures.saturating_add(1);
        status.last_error = Some(result.to_string());

        match result {
            CycleResult::Panicked(msg) => {
                error!(agent = %label, panic = %msg, "Poll cycle panicked");
            }
            CycleResult::TimedOut => {
                error!(
                    agent = %label,
                    timeout_ms = self.settings.cycle_timeout.as_millis() as u64,
                    "Poll cycle timed out"
                );
            }
            CycleResult::Completed(outcome) => {
                debug!(agent = %label, outcome = %outcome, "Poll cycle produced no data");
            }
        }

        if let Some(delay) = backoff_delay(
            self.settings.failure_policy,
            status.consecutive_failures,
            self.settings.interval,
        ) {
            if let FailurePolicy::Backoff { after_failures, .. } = self.settings.failure_policy {
                if status.consecutive_failures == after_failures {
                    warn!(
                        agent = %label,
                        failures = status.consecutive_failures,
                        "Repeated poll failures, backing off"
                    );
                }
            }
            self.backoff_until = Some(Instant::now() + delay);
            status.backoff_until = chrono::Duration::from_std(delay)
                .ok()
                .map(|d| Utc::now() + d);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
