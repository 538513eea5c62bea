use crate::error::FetchErrorKind;
use async_trait::async_trait;
use pulse::AgentIdentity;

/// Polling agent interface.
///
/// Any type that exposes an identity and a poll cycle can be registered with
/// the [`AgentManager`](crate::AgentManager). Shared behaviour (rate
/// conversion, field extraction, reporting) is composed in rather than
/// inherited; see [`PollingAgent`](crate::PollingAgent).
///
/// # Lifecycle
/// 1. Agent is constructed (configuration errors surface here)
/// 2. Manager registers it and spawns its scheduler
/// 3. Scheduler calls `poll_cycle()` on a fixed interval, one call at a time
/// 4. Agent reports zero or more metrics to its sink per cycle
/// 5. Manager aborts the scheduler on unregister or shutdown
///
/// # Example
/// ```no_run
/// use agent_manager::{Agent, CycleOutcome};
/// use async_trait::async_trait;
/// use pulse::AgentIdentity;
///
/// struct HeartbeatAgent {
///     identity: AgentIdentity,
/// }
///
/// #[async_trait]
/// impl Agent for HeartbeatAgent {
///     fn identity(&self) -> &AgentIdentity {
///         &self.identity
///     }
///
///     async fn poll_cycle(&mut self) -> CycleOutcome {
///         // Fetch, extract, report...
///         CycleOutcome::Reported { metrics: 0 }
///     }
/// }
/// ```
#[async_trait]
pub trait Agent: Send {
    fn identity(&self) -> &AgentIdentity;

    /// Runs one poll cycle.
    ///
    /// Never fails: per-cycle problems are logged, end the cycle early and are
    /// summarised in the returned [`CycleOutcome`] so the scheduler can track
    /// status. Metrics are delivered to the sink as a side effect.
    async fn poll_cycle(&mut self) -> CycleOutcome;
}

/// Summary of one poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Data was fetched; `metrics` values were reported
    Reported { metrics: usize },
    /// Remote fetch failed; nothing was reported
    FetchFailed(FetchErrorKind),
    /// Fetch succeeded but none of the expected fields were present
    ExtractionMissed,
}

impl CycleOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CycleOutcome::Reported { .. })
    }
}

impl std::fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleOutcome::Reported { metrics } => write!(f, "reported {} metrics", metrics),
            CycleOutcome::FetchFailed(kind) => write!(f, "fetch failed ({})", kind),
            CycleOutcome::ExtractionMissed => write!(f, "expected fields missing"),
        }
    }
}
