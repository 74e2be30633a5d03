//! Core data types shared across the SLP indexer crates.

pub mod claim;
pub mod ledger;
pub mod token;
pub mod tx;

pub use claim::PinClaim;
pub use ledger::{
    AddressRecord, AddressTx, IndexerStatus, TokenBalance, TokenRecord, UtxoEntry, UtxoKind,
};
pub use token::{
    GenesisInfo, SlpValidity, TokenId, TokenIdParseError, TokenOperation, TokenType, TxType,
};
pub use tx::{TransactionRecord, TxInput, TxOutput};
