use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

/// Errors returned by node RPC calls.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("http status {0}: {1}")]
    Status(u16, String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i32, message: String },

    #[error("could not parse response: {0}")]
    Parse(String),

    #[error("empty result for {0}")]
    EmptyResult(String),
}

impl ClientError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Connection(_) | ClientError::EmptyResult(_) => true,
            ClientError::Status(code, _) => *code >= 500 || *code == 429,
            // -28: node still warming up
            ClientError::Rpc { code, .. } => *code == -28,
            ClientError::Parse(_) => false,
        }
    }
}
