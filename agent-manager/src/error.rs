//! Error taxonomy for agents.
//!
//! Only [`ConfigurationError`] ever leaves an agent; it is raised at
//! construction time. [`FetchError`] is contained inside the poll cycle.
//! Missing fields and undefined rates are plain data (`Option`,
//! [`pulse::RateResult`]), not errors.

/// Construction-time failure. Prevents the agent from being registered.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("unsupported endpoint scheme '{0}': expected http or https")]
    UnsupportedScheme(String),

    #[error("invalid endpoint host '{0}'")]
    InvalidHost(String),

    #[error("endpoint path must start with '/', got '{0}'")]
    InvalidPath(String),

    #[error("endpoint URL could not be parsed: {0}")]
    MalformedUrl(String),

    #[error("fetch timeout must be greater than zero")]
    ZeroTimeout,

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("unknown agent kind '{kind}' (available: {available})")]
    UnknownKind { kind: String, available: String },

    #[error("agent '{0}' defines no metrics")]
    NoMetrics(String),

    #[error("metric on field '{0}' has neither a gauge nor a rate output")]
    EmptyMetric(String),
}

/// Coarse classification of a [`FetchError`] for logs and status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Transport,
    Parse,
}

impl std::fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchErrorKind::Transport => write!(f, "transport"),
            FetchErrorKind::Parse => write!(f, "parse"),
        }
    }
}

/// Per-cycle fetch failure. Always recoverable: the cycle simply has no data.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Connection, TLS, timeout or body read failure
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// Endpoint answered with a non-2xx status
    #[error("endpoint returned non-success status {0}")]
    Status(u16),

    /// Body was not valid JSON
    #[error("response body could not be parsed: {0}")]
    Parse(#[source] serde_json::Error),
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::Transport(_) | FetchError::Status(_) => FetchErrorKind::Transport,
            FetchError::Parse(_) => FetchErrorKind::Parse,
        }
    }

    /// True if the request hit the fetch timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Transport(e) if e.is_timeout())
    }
}
