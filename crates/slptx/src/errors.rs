use thiserror::Error;

/// Reasons a script is not a well-formed SLP payload.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SlpParseError {
    #[error("script does not start with OP_RETURN")]
    NotOpReturn,

    #[error("missing SLP lokad id")]
    MissingLokadId,

    #[error("script contains a non-push opcode")]
    NonPushOpcode,

    #[error("malformed script: {0}")]
    MalformedScript(String),

    #[error("invalid token type length {0}")]
    TokenTypeLength(usize),

    #[error("unknown transaction type {0:?}")]
    UnknownTxType(String),

    #[error("{tx_type} expects {expected} fields, got {actual}")]
    FieldCount {
        tx_type: &'static str,
        expected: &'static str,
        actual: usize,
    },

    #[error("invalid {field} length {len}")]
    FieldLength { field: &'static str, len: usize },

    #[error("decimals {0} out of range")]
    Decimals(u8),

    #[error("mint baton vout {0} out of range")]
    BatonVout(u8),

    #[error("NFT child rule violated: {0}")]
    NftChild(&'static str),
}
