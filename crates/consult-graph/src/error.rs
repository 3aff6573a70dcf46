use thiserror::Error;

/// Failure of a single node. Never escapes `run_graph` — the runtime
/// catches it and turns it into a `ResultPayload::Err` so one slow or
/// broken branch never takes down the others.
#[derive(Debug, Error, Clone)]
pub enum NodeError {
    #[error("node timed out after {ms}ms")]
    Timeout { ms: u64 },
    #[error("upstream error: {0}")]
    Upstream(String),
    #[error("node panicked")]
    Panicked,
}

impl NodeError {
    pub fn code(&self) -> &'static str {
        match self {
            NodeError::Timeout { .. } => "timeout",
            NodeError::Upstream(_) => "upstream",
            NodeError::Panicked => "panicked",
        }
    }
}
