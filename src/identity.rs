use serde::{Deserialize, Serialize};

/// Identity of a polling agent.
///
/// Immutable after construction. The `guid` names the agent type (several
/// instances of the same agent share it), the `label` names the instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentIdentity {
    /// Globally unique agent type identifier (e.g., "com.example.wikipedia")
    pub guid: String,
    /// Agent version
    pub version: String,
    /// Human readable instance label (e.g., "Wikipedia EN")
    pub label: String,
}

impl AgentIdentity {
    pub fn new(
        guid: impl Into<String>,
        version: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            guid: guid.into(),
            version: version.into(),
            label: label.into(),
        }
    }

    /// Key used to register the agent with the scheduler and the status API.
    ///
    /// Format: `{guid}:{label}`
    pub fn key(&self) -> String {
        format!("{}:{}", self.guid, self.label)
    }
}

impl std::fmt::Display for AgentIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} v{})", self.label, self.guid, self.version)
    }
}
