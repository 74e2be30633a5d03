//! Client for the REST key-value service that persists indexer state.
//!
//! Each table is reached under `{url}/level/{table}`; snapshots are driven through
//! `{url}/level/backup` and `{url}/level/restore`.

mod client;
mod tables;

use std::{sync::Arc, time::Duration};

pub use client::StoreClient;
use slp_db_types::{
    AddrDatabase, BackupDatabase, DbResult, PinClaimDatabase, ProcessedTxDatabase, SlpDatabase,
    StatusDatabase, TokenDatabase, TxDatabase, UtxoDatabase,
};
pub use tables::{
    AddrDbHttp, BackupDbHttp, PinClaimDbHttp, ProcessedTxDbHttp, StatusDbHttp, TokenDbHttp,
    TxDbHttp, UtxoDbHttp,
};

/// Every table backed by the same HTTP client.
#[derive(Debug)]
pub struct HttpBackend {
    tx_db: Arc<TxDbHttp>,
    processed_tx_db: Arc<ProcessedTxDbHttp>,
    utxo_db: Arc<UtxoDbHttp>,
    addr_db: Arc<AddrDbHttp>,
    token_db: Arc<TokenDbHttp>,
    status_db: Arc<StatusDbHttp>,
    pin_claim_db: Arc<PinClaimDbHttp>,
    backup_db: Arc<BackupDbHttp>,
}

impl HttpBackend {
    pub fn new(client: Arc<StoreClient>) -> Self {
        Self {
            tx_db: Arc::new(TxDbHttp::new(client.clone())),
            processed_tx_db: Arc::new(ProcessedTxDbHttp::new(client.clone())),
            utxo_db: Arc::new(UtxoDbHttp::new(client.clone())),
            addr_db: Arc::new(AddrDbHttp::new(client.clone())),
            token_db: Arc::new(TokenDbHttp::new(client.clone())),
            status_db: Arc::new(StatusDbHttp::new(client.clone())),
            pin_claim_db: Arc::new(PinClaimDbHttp::new(client.clone())),
            backup_db: Arc::new(BackupDbHttp::new(client)),
        }
    }
}

/// Opens a backend against the service at `url`.
pub fn open_http_backend(url: &str, timeout: Option<Duration>) -> DbResult<Arc<HttpBackend>> {
    let client = StoreClient::new(url, timeout)?;
    Ok(Arc::new(HttpBackend::new(Arc::new(client))))
}

impl SlpDatabase for HttpBackend {
    fn tx_db(&self) -> Arc<impl TxDatabase> {
        self.tx_db.clone()
    }

    fn processed_tx_db(&self) -> Arc<impl ProcessedTxDatabase> {
        self.processed_tx_db.clone()
    }

    fn utxo_db(&self) -> Arc<impl UtxoDatabase> {
        self.utxo_db.clone()
    }

    fn addr_db(&self) -> Arc<impl AddrDatabase> {
        self.addr_db.clone()
    }

    fn token_db(&self) -> Arc<impl TokenDatabase> {
        self.token_db.clone()
    }

    fn status_db(&self) -> Arc<impl StatusDatabase> {
        self.status_db.clone()
    }

    fn pin_claim_db(&self) -> Arc<impl PinClaimDatabase> {
        self.pin_claim_db.clone()
    }

    fn backup_db(&self) -> Arc<impl BackupDatabase> {
        self.backup_db.clone()
    }
}
