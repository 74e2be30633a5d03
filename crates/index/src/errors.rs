use bitcoin::Txid;
use slp_btcio::ClientError;
use slp_db_types::DbError;
use slp_primitives::TokenId;
use thiserror::Error;

/// Error type for indexing operations.
///
/// `Rpc` and `Db` are upstream failures and are retried by the orchestrator. The remaining
/// variants describe the transaction or the caller and are never fixed by retrying the same call,
/// except where the ancestry data itself may still be catching up.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("node rpc: {0}")]
    Rpc(#[from] ClientError),

    #[error("store: {0}")]
    Db(#[from] DbError),

    /// An ancestor belongs to a different token than the one being validated.
    #[error("token mismatch at {txid}: expected {expected}, found {found}")]
    TokenMismatch {
        txid: Txid,
        expected: TokenId,
        found: TokenId,
    },

    /// Soft condition: the transaction carries no decodable SLP payload.
    #[error("{txid} is not an slp transaction: {reason}")]
    NotSlpTransaction { txid: Txid, reason: String },

    #[error("ancestry of {txid} exceeds {max_depth} transactions")]
    DagTooDeep { txid: Txid, max_depth: usize },

    /// A ledger entry the transaction depends on is absent from the store.
    #[error("missing store entry: {0}")]
    MissingEntry(String),

    /// A transaction kept failing; the store was asked to roll back and the host must restart
    /// indexing from `rollback_height`.
    #[error(
        "tx {txid} failed at block {block_height}, rollback to {rollback_height} requested"
    )]
    FatalRecoveryRequested {
        block_height: u64,
        rollback_height: u64,
        txid: Txid,
    },

    #[error("status out of sync: synced height {synced}, indexed block {indexed}")]
    StatusOutOfSync { synced: u64, indexed: u64 },

    #[error("webhook: {0}")]
    Webhook(String),
}

impl IndexerError {
    pub(crate) fn not_slp(txid: Txid, reason: impl ToString) -> Self {
        IndexerError::NotSlpTransaction {
            txid,
            reason: reason.to_string(),
        }
    }

    /// Failures of the node or the store.
    pub fn is_upstream(&self) -> bool {
        matches!(self, IndexerError::Rpc(_) | IndexerError::Db(_))
    }

    /// Returns true if retrying the operation may succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            IndexerError::Rpc(_)
            | IndexerError::Db(_)
            | IndexerError::MissingEntry(_)
            | IndexerError::Webhook(_) => true,

            IndexerError::InvalidArgument(_)
            | IndexerError::TokenMismatch { .. }
            | IndexerError::NotSlpTransaction { .. }
            | IndexerError::DagTooDeep { .. }
            | IndexerError::FatalRecoveryRequested { .. }
            | IndexerError::StatusOutOfSync { .. } => false,
        }
    }

    /// Returns true if the host process must stop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, IndexerError::FatalRecoveryRequested { .. })
    }
}

pub type IndexerResult<T> = Result<T, IndexerError>;
