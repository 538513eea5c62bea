//! Agent manager - Orchestrates agent lifecycle.
//!
//! Owns one scheduler task per registered agent and tracks each agent's
//! status for monitoring.

use crate::agent::Agent;
use crate::runners::scheduler::{AgentScheduler, AgentStatus, SchedulerSettings};
use anyhow::{bail, Result};
use pulse::metric::MetricSink;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

/// Status tracking per `guid:label` key.
pub type StatusMap = Arc<tokio::sync::Mutex<HashMap<String, Arc<tokio::sync::Mutex<AgentStatus>>>>>;

/// Agent manager - Orchestrates all agent polling.
///
/// # Responsibilities
/// - Announce each agent to the metric sink
/// - Start a scheduler for each registered agent
/// - Track status for all agents
/// - Graceful shutdown
pub struct AgentManager {
    /// Default scheduler settings
    settings: SchedulerSettings,
    /// Destination for component registration
    sink: Arc<dyn MetricSink>,
    status_map: StatusMap,
    /// Per-key scheduler handles
    agent_handles: Arc<tokio::sync::Mutex<HashMap<String, JoinHandle<()>>>>,
}

impl AgentManager {
    pub fn new(settings: SchedulerSettings, sink: Arc<dyn MetricSink>) -> Self {
        Self {
            settings,
            sink,
            status_map: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
            agent_handles: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
        }
    }

    /// Returns a clone of the status map for external monitoring.
    pub fn status_map(&self) -> StatusMap {
        Arc::clone(&self.status_map)
    }

    /// Registers an agent and starts polling it.
    ///
    /// The first cycle runs immediately. `interval` overrides the default
    /// polling interval for this agent only.
    ///
    /// # Returns
    /// The agent's `guid:label` key
    pub async fn register(
        &self,
        agent: Box<dyn Agent>,
        interval: Option<Duration>,
    ) -> Result<String> {
        let identity = agent.identity().clone();
        let key = identity.key();

        let settings = match interval {
            Some(interval) => self.settings.with_interval(interval),
            None => self.settings,
        };
        if settings.interval.is_zero() {
            bail!("Agent '{}' has a zero polling interval", key);
        }

        let mut handles = self.agent_handles.lock().await;
        if handles.contains_key(&key) {
            bail!("Agent '{}' is already registered", key);
        }

        self.sink.register(&identity);

        let scheduler = AgentScheduler::new(agent, settings);
        let status_handle = scheduler.status();
        let handle = scheduler.start();

        handles.insert(key.clone(), handle);
        self.status_map.lock().await.insert(key.clone(), status_handle);

        info!(
            key = %key,
            version = %identity.version,
            interval_ms = settings.interval.as_millis() as u64,
            "Agent registered"
        );

        Ok(key)
    }

    /// Stops polling an agent and forgets its status.
    ///
    /// Returns false if no agent is registered under `key`.
    pub async fn unregister(&self, key: &str) -> bool {
        let handle = self.agent_handles.lock().await.remove(key);
        self.status_map.lock().await.remove(key);

        match handle {
            Some(handle) => {
                handle.abort();
                info!(key = %key, "Agent unregistered");
                true
            }
            None => false,
        }
    }

    /// Keys of all registered agents, sorted.
    pub async fn registered_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.agent_handles.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Shuts down all agent schedulers.
    ///
    /// In-flight cycles are cancelled; no further cycles start.
    pub async fn shutdown(&self) {
        info!("Shutting down agent manager");

        let mut handles = self.agent_handles.lock().await;
        let count = handles.len();
        if count > 0 {
            info!(scheduler_count = count, "Aborting agent scheduler tasks");
            for (_, handle) in handles.drain() {
                handle.abort();
            }
        }

        info!("All scheduler tasks aborted");
    }
}

impl Drop for AgentManager {
    fn drop(&mut self) {
        // Best-effort abort (try_lock since Drop is sync)
        if let Ok(mut handles) = self.agent_handles.try_lock() {
            for (_, handle) in handles.drain() {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Behavior, TestAgent};
    use pulse::config::FailurePolicy;
    use pulse::metric::MemorySink;
    use std::sync::atomic::Ordering;

    fn settings() -> SchedulerSettings {
        SchedulerSettings {
            interval: Duration::from_millis(20),
            cycle_timeout: Duration::from_secs(30),
            failure_policy: FailurePolicy::Fixed,
        }
    }

    fn manager() -> (AgentManager, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        (AgentManager::new(settings(), sink.clone()), sink)
    }

    #[tokio::test]
    async fn test_register_tracks_status_and_announces() {
        let (manager, sink) = manager();

        let key = manager
            .register(Box::new(TestAgent::new("alpha", Behavior::Succeed)), None)
            .await
            .unwrap();
        assert_eq!(key, "com.example.test:alpha");

        tokio::time::sleep(Duration::from_millis(50)).await;

        let map = manager.status_map();
        let map = map.lock().await;
        let status = map.get(&key).unwrap().lock().await;
        assert!(status.poll_count >= 1);
        assert_eq!(status.interval_ms, 20);

        assert_eq!(sink.registered().len(), 1);
        assert_eq!(sink.registered()[0].label, "alpha");
    }

    #[tokio::test]
    async fn test_duplicate_key_rejected() {
        let (manager, _sink) = manager();

        manager
            .register(Box::new(TestAgent::new("alpha", Behavior::Succeed)), None)
            .await
            .unwrap();
        let err = manager
            .register(Box::new(TestAgent::new("alpha", Behavior::Succeed)), None)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("already registered"));
        assert_eq!(manager.registered_keys().await, vec!["com.example.test:alpha"]);
    }

    #[tokio::test]
    async fn test_zero_interval_rejected() {
        let (manager, _sink) = manager();
        let result = manager
            .register(
                Box::new(TestAgent::new("alpha", Behavior::Succeed)),
                Some(Duration::ZERO),
            )
            .await;
        assert!(result.is_err());
        assert!(manager.registered_keys().await.is_empty());
    }

    #[tokio::test]
    async fn test_per_agent_interval_override() {
        let (manager, _sink) = manager();
        let key = manager
            .register(
                Box::new(TestAgent::new("slow-cadence", Behavior::Succeed)),
                Some(Duration::from_secs(3600)),
            )
            .await
            .unwrap();

        let map = manager.status_map();
        let map = map.lock().await;
        assert_eq!(map.get(&key).unwrap().lock().await.interval_ms, 3_600_000);
    }

    #[tokio::test]
    async fn test_slow_agent_does_not_delay_others() {
        let (manager, _sink) = manager();

        let slow = TestAgent::new("slow", Behavior::Sleep(Duration::from_secs(10)));
        let fast = TestAgent::new("fast", Behavior::Succeed);
        let slow_cycles = slow.counter();
        let fast_cycles = fast.counter();

        manager.register(Box::new(slow), None).await.unwrap();
        manager.register(Box::new(fast), None).await.unwrap();

        tokio::time::sleep(Duration::from_millis(300)).await;

        // Slow agent is stuck in its first cycle; fast agent keeps its cadence
        assert_eq!(slow_cycles.load(Ordering::SeqCst), 1);
        assert!(fast_cycles.load(Ordering::SeqCst) >= 5);

        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_panicking_agent_isolated() {
        let (manager, _sink) = manager();

        let bad = TestAgent::new("bad", Behavior::Panic);
        let good = TestAgent::new("good", Behavior::Succeed);
        let bad_cycles = bad.counter();
        let good_cycles = good.counter();

        let bad_key = manager.register(Box::new(bad), None).await.unwrap();
        manager.register(Box::new(good), None).await.unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(bad_cycles.load(Ordering::SeqCst) >= 3);
        assert!(good_cycles.load(Ordering::SeqCst) >= 3);

        let map = manager.status_map();
        let map = map.lock().await;
        let status = map.get(&bad_key).unwrap().lock().await;
        assert_eq!(status.poll_count, 0);
        assert!(status.error_count >= 3);
    }

    #[tokio::test]
    async fn test_unregister_stops_polling() {
        let (manager, _sink) = manager();
        let agent = TestAgent::new("alpha", Behavior::Succeed);
        let cycles = agent.counter();

        let key = manager.register(Box::new(agent), None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(manager.unregister(&key).await);
        assert!(!manager.unregister(&key).await);
        assert!(manager.status_map().lock().await.is_empty());

        tokio::time::sleep(Duration::from_millis(20)).await;
        let after_stop = cycles.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(cycles.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test]
    async fn test_shutdown_stops_all_agents() {
        let (manager, _sink) = manager();
        let a = TestAgent::new("a", Behavior::Succeed);
        let b = TestAgent::new("b", Behavior::Fail);
        let a_cycles = a.counter();
        let b_cycles = b.counter();

        manager.register(Box::new(a), None).await.unwrap();
        manager.register(Box::new(b), None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        manager.shutdown().await;
        assert!(manager.registered_keys().await.is_empty());

        tokio::time::sleep(Duration::from_millis(20)).await;
        let (a_stop, b_stop) = (a_cycles.load(Ordering::SeqCst), b_cycles.load(Ordering::SeqCst));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(a_cycles.load(Ordering::SeqCst), a_stop);
        assert_eq!(b_cycles.load(Ordering::SeqCst), b_stop);
    }
}
