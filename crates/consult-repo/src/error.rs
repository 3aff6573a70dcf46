use thiserror::Error;

/// Errors that can occur during session, transcript, or result persistence.
#[derive(Debug, Error)]
pub enum RepoError {
    /// The requested session does not exist in the database.
    #[error("session not found: {id}")]
    NotFound { id: String },

    /// A SQLite operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored JSON column failed to (de)serialize.
    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, RepoError>;
