//! Scripted agents and network stand-ins shared by unit tests.

use crate::agent::{Agent, CycleOutcome};
use crate::error::FetchErrorKind;
use async_trait::async_trait;
use pulse::AgentIdentity;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Copy, Debug)]
pub enum Behavior {
    Succeed,
    Fail,
    Panic,
    Sleep(Duration),
}

/// Agent that counts its cycles and behaves as scripted.
pub struct TestAgent {
    identity: AgentIdentity,
    behavior: Behavior,
    pub cycles: Arc<AtomicUsize>,
}

impl TestAgent {
    pub fn new(label: &str, behavior: Behavior) -> Self {
        Self {
            identity: AgentIdentity::new("com.example.test", "1.0.0", label),
            behavior,
            cycles: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.cycles)
    }
}

#[async_trait]
impl Agent for TestAgent {
    fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    async fn poll_cycle(&mut self) -> CycleOutcome {
        self.cycles.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::Succeed => CycleOutcome::Reported { metrics: 2 },
            Behavior::Fail => CycleOutcome::FetchFailed(FetchErrorKind::Transport),
            Behavior::Panic => panic!("boom"),
            Behavior::Sleep(d) => {
                tokio::time::sleep(d).await;
                CycleOutcome::Reported { metrics: 1 }
            }
        }
    }
}

/// Accepts TCP connections but never answers them. Returns `host:port`.
pub async fn silent_listener() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr.to_string()
}
