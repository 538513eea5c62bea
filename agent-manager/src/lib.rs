//! Pulse Agent Manager - periodic polling agents for remote metrics.
//!
//! An agent fetches a JSON document from a remote service, pulls numeric
//! fields out of it, turns cumulative counters into per-second rates and
//! reports named metrics to a sink. The manager runs every agent on its own
//! fixed-rate schedule.
//!
//! # Architecture
//!
//! ```text
//! Remote service (Wikipedia, any JSON API)
//!          ↓
//! ┌─────────────────────────────────────────┐
//! │       Agent (implements trait)           │
//! │  - Fetch document                        │
//! │  - Extract fields                        │
//! │  - Convert counters to rates             │
//! └─────────────────────────────────────────┘
//!          ↓
//! ┌─────────────────────────────────────────┐
//! │       Agent Manager                      │
//! │  - Schedule polling                      │
//! │  - Isolate failures per agent            │
//! │  - Track status                          │
//! └─────────────────────────────────────────┘
//!          ↓
//!     Metric sink (log, HTTP collector)
//! ```
//!
//! # Core Types
//!
//! - [`Agent`] - Trait that all agents must implement
//! - [`PollingAgent`] - Fetch/extract/rate/report pipeline agents compose
//! - [`AgentManager`] - Registers agents and owns their schedulers
//! - [`RemoteFetcher`] - Retrieves the raw document for one cycle

mod agent;
pub mod agents;
pub mod api;
pub mod error;
pub mod fetcher;
pub mod manager;
pub mod polling;
pub mod registry;
pub mod runners;
pub mod sinks;

#[cfg(test)]
mod testing;

// Re-export public types
pub use agent::{Agent, CycleOutcome};
pub use error::{ConfigurationError, FetchError, FetchErrorKind};
pub use fetcher::{EndpointConfig, HttpFetcher, RemoteFetcher};
pub use manager::AgentManager;
pub use polling::PollingAgent;
pub use runners::scheduler::{AgentScheduler, AgentStatus};
