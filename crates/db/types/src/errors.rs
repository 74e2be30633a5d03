use thiserror::Error;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DbError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("store returned status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("codec error: {0}")]
    Codec(String),

    #[error("entry {0} does not exist")]
    NonExistentEntry(String),

    #[error("{0}")]
    Other(String),
}

impl DbError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            DbError::Transport(_) => true,
            DbError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
