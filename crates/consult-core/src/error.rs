use thiserror::Error;

/// Error kinds surfaced across the consultation assistant backend.
///
/// The variants named in the WS protocol (`bad_request` through `fatal`)
/// carry a stable `.code()` used verbatim in `error` frames and in
/// `agent-result` null payloads; the remaining variants are ambient plumbing
/// errors (config, storage, serialization) that get wrapped into `Fatal` or
/// `Upstream` at the boundary where they first meet a client-facing frame.
#[derive(Debug, Error)]
pub enum ConsultError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("overloaded: {0}")]
    Overloaded(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("fatal error: {0}")]
    Fatal(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("request timeout after {ms}ms")]
    Timeout { ms: u64 },
}

impl ConsultError {
    /// Short error code sent to clients in `error` frames and `agent-result`
    /// null payloads.
    pub fn code(&self) -> &'static str {
        match self {
            ConsultError::BadRequest(_) => "bad_request",
            ConsultError::NotFound(_) => "not_found",
            ConsultError::Overloaded(_) => "overloaded",
            ConsultError::Upstream(_) => "upstream",
            ConsultError::Fatal(_) => "fatal",
            ConsultError::Config(_) => "fatal",
            ConsultError::Database(_) => "fatal",
            ConsultError::Serialization(_) => "bad_request",
            ConsultError::Io(_) => "fatal",
            ConsultError::Timeout { .. } => "upstream",
        }
    }
}

pub type Result<T> = std::result::Result<T, ConsultError>;
