//! In-process store used by tests and dry runs.
//!
//! Every table is a map behind a mutex. Backups snapshot all tables so rollbacks can be
//! exercised without the external service.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use bitcoin::Txid;
use parking_lot::Mutex;
use slp_db_types::{
    AddrDatabase, BackupDatabase, DbError, DbResult, PinClaimDatabase, ProcessedTxDatabase,
    SlpDatabase, StatusDatabase, TokenDatabase, TxDatabase, UtxoDatabase,
};
use slp_primitives::{
    AddressRecord, IndexerStatus, PinClaim, TokenId, TokenRecord, TransactionRecord, UtxoEntry,
};

#[derive(Clone, Debug, Default)]
struct Tables {
    txs: HashMap<Txid, TransactionRecord>,
    processed: HashMap<Txid, u64>,
    utxos: HashMap<String, UtxoEntry>,
    addrs: HashMap<String, AddressRecord>,
    tokens: HashMap<TokenId, TokenRecord>,
    status: Option<IndexerStatus>,
    pin_claims: HashMap<Txid, PinClaim>,
}

/// All tables in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    snapshots: Mutex<BTreeMap<u64, Tables>>,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes across all tables.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Makes every subsequent write fail until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Heights that have a snapshot.
    pub fn snapshot_heights(&self) -> Vec<u64> {
        self.snapshots.lock().keys().copied().collect()
    }

    fn write<R>(&self, f: impl FnOnce(&mut Tables) -> R) -> DbResult<R> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DbError::Transport("injected write failure".to_owned()));
        }
        let res = f(&mut self.tables.lock());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(res)
    }

    fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> R {
        f(&self.tables.lock())
    }
}

#[async_trait]
impl TxDatabase for MemoryStore {
    async fn get_tx(&self, txid: &Txid) -> DbResult<Option<TransactionRecord>> {
        Ok(self.read(|t| t.txs.get(txid).cloned()))
    }

    async fn put_tx(&self, record: &TransactionRecord) -> DbResult<()> {
        self.write(|t| {
            t.txs.insert(record.txid, record.clone());
        })
    }

    async fn delete_tx(&self, txid: &Txid) -> DbResult<()> {
        self.write(|t| {
            t.txs.remove(txid);
        })
    }
}

#[async_trait]
impl ProcessedTxDatabase for MemoryStore {
    async fn get_processed(&self, txid: &Txid) -> DbResult<Option<u64>> {
        Ok(self.read(|t| t.processed.get(txid).copied()))
    }

    async fn put_processed(&self, txid: &Txid, block_height: u64) -> DbResult<()> {
        self.write(|t| {
            t.processed.entry(*txid).or_insert(block_height);
        })
    }
}

#[async_trait]
impl UtxoDatabase for MemoryStore {
    async fn get_utxo(&self, key: &str) -> DbResult<Option<UtxoEntry>> {
        Ok(self.read(|t| t.utxos.get(key).cloned()))
    }

    async fn put_utxo(&self, utxo: &UtxoEntry) -> DbResult<()> {
        self.write(|t| {
            t.utxos.insert(utxo.key(), utxo.clone());
        })
    }

    async fn delete_utxo(&self, key: &str) -> DbResult<()> {
        self.write(|t| {
            t.utxos.remove(key);
        })
    }
}

#[async_trait]
impl AddrDatabase for MemoryStore {
    async fn get_addr(&self, address: &str) -> DbResult<Option<AddressRecord>> {
        Ok(self.read(|t| t.addrs.get(address).cloned()))
    }

    async fn put_addr(&self, address: &str, record: &AddressRecord) -> DbResult<()> {
        self.write(|t| {
            t.addrs.insert(address.to_owned(), record.clone());
        })
    }
}

#[async_trait]
impl TokenDatabase for MemoryStore {
    async fn get_token(&self, token_id: &TokenId) -> DbResult<Option<TokenRecord>> {
        Ok(self.read(|t| t.tokens.get(token_id).cloned()))
    }

    async fn put_token(&self, record: &TokenRecord) -> DbResult<()> {
        self.write(|t| {
            t.tokens.insert(record.token_id, record.clone());
        })
    }
}

#[async_trait]
impl StatusDatabase for MemoryStore {
    async fn get_status(&self) -> DbResult<Option<IndexerStatus>> {
        Ok(self.read(|t| t.status))
    }

    async fn put_status(&self, status: &IndexerStatus) -> DbResult<()> {
        self.write(|t| t.status = Some(*status))
    }
}

#[async_trait]
impl PinClaimDatabase for MemoryStore {
    async fn get_pin_claim(&self, claim_txid: &Txid) -> DbResult<Option<PinClaim>> {
        Ok(self.read(|t| t.pin_claims.get(claim_txid).cloned()))
    }

    async fn put_pin_claim(&self, claim: &PinClaim) -> DbResult<()> {
        self.write(|t| {
            t.pin_claims.insert(claim.claim_txid, claim.clone());
        })
    }
}

#[async_trait]
impl BackupDatabase for MemoryStore {
    async fn backup_db(&self, height: u64, _epoch: u64) -> DbResult<()> {
        let snapshot = self.read(Tables::clone);
        self.snapshots.lock().insert(height, snapshot);
        Ok(())
    }

    async fn rollback_db(&self, height: u64) -> DbResult<()> {
        let snapshot = self
            .snapshots
            .lock()
            .get(&height)
            .cloned()
            .ok_or_else(|| DbError::NonExistentEntry(format!("snapshot {height}")))?;
        *self.tables.lock() = snapshot;
        Ok(())
    }
}

/// [`SlpDatabase`] over a shared [`MemoryStore`].
#[derive(Clone, Debug, Default)]
pub struct MemoryBackend {
    store: Arc<MemoryStore>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct access for assertions.
    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }
}

impl SlpDatabase for MemoryBackend {
    fn tx_db(&self) -> Arc<impl TxDatabase> {
        self.store.clone()
    }

    fn processed_tx_db(&self) -> Arc<impl ProcessedTxDatabase> {
        self.store.clone()
    }

    fn utxo_db(&self) -> Arc<impl UtxoDatabase> {
        self.store.clone()
    }

    fn addr_db(&self) -> Arc<impl AddrDatabase> {
        self.store.clone()
    }

    fn token_db(&self) -> Arc<impl TokenDatabase> {
        self.store.clone()
    }

    fn status_db(&self) -> Arc<impl StatusDatabase> {
        self.store.clone()
    }

    fn pin_claim_db(&self) -> Arc<impl PinClaimDatabase> {
        self.store.clone()
    }

    fn backup_db(&self) -> Arc<impl BackupDatabase> {
        self.store.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn txid() -> Txid {
        "d9aa162704578945543f5856400546310392a3e68a7922fbc3490e2f21cc7501"
            .parse()
            .unwrap()
    }

    #[tokio::test]
    async fn test_missing_entries_are_none() {
        let backend = MemoryBackend::new();
        assert!(backend.tx_db().get_tx(&txid()).await.unwrap().is_none());
        assert!(backend.status_db().get_status().await.unwrap().is_none());
        assert!(backend.utxo_db().get_utxo("x:1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_processed_is_write_once() {
        let backend = MemoryBackend::new();
        let db = backend.processed_tx_db();
        db.put_processed(&txid(), 10).await.unwrap();
        db.put_processed(&txid(), 20).await.unwrap();
        assert_eq!(db.get_processed(&txid()).await.unwrap(), Some(10));
    }

    #[tokio::test]
    async fn test_backup_and_rollback() {
        let backend = MemoryBackend::new();
        let tx_db = backend.tx_db();
        let record = TransactionRecord::new(txid(), 1000);

        backend.backup_db().backup_db(1000, 1000).await.unwrap();
        tx_db.put_tx(&record).await.unwrap();
        assert!(tx_db.get_tx(&txid()).await.unwrap().is_some());

        backend.backup_db().rollback_db(1000).await.unwrap();
        assert!(tx_db.get_tx(&txid()).await.unwrap().is_none());
        assert_eq!(backend.store().snapshot_heights(), vec![1000]);

        assert!(backend.backup_db().rollback_db(2000).await.is_err());
    }

    #[tokio::test]
    async fn test_injected_write_failure() {
        let backend = MemoryBackend::new();
        backend.store().set_fail_writes(true);
        let err = backend
            .tx_db()
            .put_tx(&TransactionRecord::new(txid(), 1))
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(backend.store().write_count(), 0);
    }
}
