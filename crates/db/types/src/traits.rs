//! Trait definitions for the indexer's stores.
//!
//! Reads return `Ok(None)` when the key is absent so callers can tell "not found" apart from a
//! failing store.

use std::sync::Arc;

use async_trait::async_trait;
use bitcoin::Txid;
use slp_primitives::{
    AddressRecord, IndexerStatus, PinClaim, TokenId, TokenRecord, TransactionRecord, UtxoEntry,
};

use crate::DbResult;

/// Common handle to every table the indexer writes.
pub trait SlpDatabase: Send + Sync {
    fn tx_db(&self) -> Arc<impl TxDatabase>;
    fn processed_tx_db(&self) -> Arc<impl ProcessedTxDatabase>;
    fn utxo_db(&self) -> Arc<impl UtxoDatabase>;
    fn addr_db(&self) -> Arc<impl AddrDatabase>;
    fn token_db(&self) -> Arc<impl TokenDatabase>;
    fn status_db(&self) -> Arc<impl StatusDatabase>;
    fn pin_claim_db(&self) -> Arc<impl PinClaimDatabase>;
    fn backup_db(&self) -> Arc<impl BackupDatabase>;
}

/// Hydrated transaction records.
#[async_trait]
pub trait TxDatabase: Send + Sync + 'static {
    async fn get_tx(&self, txid: &Txid) -> DbResult<Option<TransactionRecord>>;

    /// Creates or replaces the record.
    async fn put_tx(&self, record: &TransactionRecord) -> DbResult<()>;

    async fn delete_tx(&self, txid: &Txid) -> DbResult<()>;
}

/// Audit log of processed transactions, written once per txid.
#[async_trait]
pub trait ProcessedTxDatabase: Send + Sync + 'static {
    /// Returns the block height the transaction was processed at.
    async fn get_processed(&self, txid: &Txid) -> DbResult<Option<u64>>;

    async fn put_processed(&self, txid: &Txid, block_height: u64) -> DbResult<()>;
}

/// Token-bearing UTXOs keyed by `txid:vout`.
#[async_trait]
pub trait UtxoDatabase: Send + Sync + 'static {
    async fn get_utxo(&self, key: &str) -> DbResult<Option<UtxoEntry>>;

    async fn put_utxo(&self, utxo: &UtxoEntry) -> DbResult<()>;

    async fn delete_utxo(&self, key: &str) -> DbResult<()>;
}

#[async_trait]
pub trait AddrDatabase: Send + Sync + 'static {
    async fn get_addr(&self, address: &str) -> DbResult<Option<AddressRecord>>;

    async fn put_addr(&self, address: &str, record: &AddressRecord) -> DbResult<()>;
}

#[async_trait]
pub trait TokenDatabase: Send + Sync + 'static {
    async fn get_token(&self, token_id: &TokenId) -> DbResult<Option<TokenRecord>>;

    async fn put_token(&self, record: &TokenRecord) -> DbResult<()>;
}

/// Single-row table tracking sync progress.
#[async_trait]
pub trait StatusDatabase: Send + Sync + 'static {
    async fn get_status(&self) -> DbResult<Option<IndexerStatus>>;

    async fn put_status(&self, status: &IndexerStatus) -> DbResult<()>;
}

#[async_trait]
pub trait PinClaimDatabase: Send + Sync + 'static {
    async fn get_pin_claim(&self, claim_txid: &Txid) -> DbResult<Option<PinClaim>>;

    async fn put_pin_claim(&self, claim: &PinClaim) -> DbResult<()>;
}

/// Snapshot control over the whole store.
#[async_trait]
pub trait BackupDatabase: Send + Sync + 'static {
    /// Snapshots the store as of `height`. The store keeps snapshots per `epoch`.
    async fn backup_db(&self, height: u64, epoch: u64) -> DbResult<()>;

    /// Restores the snapshot taken at `height`.
    async fn rollback_db(&self, height: u64) -> DbResult<()>;
}
