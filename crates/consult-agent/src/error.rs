use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    /// The room's mailbox is full and no droppable (non-customer) turn
    /// could be evicted to make room for this one.
    #[error("room mailbox overloaded")]
    Overloaded,

    #[error("persistence error: {0}")]
    Repo(#[from] consult_repo::error::RepoError),
}

impl AgentError {
    pub fn code(&self) -> &'static str {
        match self {
            AgentError::Overloaded => "overloaded",
            AgentError::Repo(_) => "fatal",
        }
    }
}
