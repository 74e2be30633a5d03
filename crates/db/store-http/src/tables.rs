use std::sync::Arc;

use async_trait::async_trait;
use bitcoin::Txid;
use serde::{Deserialize, Serialize};
use serde_json::json;
use slp_db_types::{
    AddrDatabase, BackupDatabase, DbResult, PinClaimDatabase, ProcessedTxDatabase,
    StatusDatabase, TokenDatabase, TxDatabase, UtxoDatabase,
};
use slp_primitives::{
    AddressRecord, IndexerStatus, PinClaim, TokenId, TokenRecord, TransactionRecord, UtxoEntry,
};

use crate::client::StoreClient;

const STATUS_KEY: &str = "status";

/// Declares a table handle holding the shared client.
macro_rules! define_http_table {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug)]
        pub struct $name {
            client: Arc<StoreClient>,
        }

        impl $name {
            pub fn new(client: Arc<StoreClient>) -> Self {
                Self { client }
            }
        }
    };
}

define_http_table!(
    /// `tx` table.
    TxDbHttp
);
define_http_table!(
    /// `ptx` table, the processed-transaction audit log.
    ProcessedTxDbHttp
);
define_http_table!(UtxoDbHttp);
define_http_table!(AddrDbHttp);
define_http_table!(TokenDbHttp);
define_http_table!(StatusDbHttp);
define_http_table!(PinClaimDbHttp);
define_http_table!(
    /// Snapshot endpoints.
    BackupDbHttp
);

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcessedEntry {
    txid: Txid,
    block_height: u64,
}

#[async_trait]
impl TxDatabase for TxDbHttp {
    async fn get_tx(&self, txid: &Txid) -> DbResult<Option<TransactionRecord>> {
        self.client.get("tx", &txid.to_string()).await
    }

    async fn put_tx(&self, record: &TransactionRecord) -> DbResult<()> {
        self.client
            .create("tx", "txid", &record.txid.to_string(), "txData", record)
            .await
    }

    async fn delete_tx(&self, txid: &Txid) -> DbResult<()> {
        self.client.delete("tx", &txid.to_string()).await
    }
}

#[async_trait]
impl ProcessedTxDatabase for ProcessedTxDbHttp {
    async fn get_processed(&self, txid: &Txid) -> DbResult<Option<u64>> {
        let entry: Option<ProcessedEntry> = self.client.get("ptx", &txid.to_string()).await?;
        Ok(entry.map(|e| e.block_height))
    }

    async fn put_processed(&self, txid: &Txid, block_height: u64) -> DbResult<()> {
        let entry = ProcessedEntry {
            txid: *txid,
            block_height,
        };
        self.client
            .create("ptx", "ptxKey", &txid.to_string(), "ptxData", &entry)
            .await
    }
}

#[async_trait]
impl UtxoDatabase for UtxoDbHttp {
    async fn get_utxo(&self, key: &str) -> DbResult<Option<UtxoEntry>> {
        self.client.get("utxo", key).await
    }

    async fn put_utxo(&self, utxo: &UtxoEntry) -> DbResult<()> {
        self.client
            .create("utxo", "utxoKey", &utxo.key(), "utxoData", utxo)
            .await
    }

    async fn delete_utxo(&self, key: &str) -> DbResult<()> {
        self.client.delete("utxo", key).await
    }
}

#[async_trait]
impl AddrDatabase for AddrDbHttp {
    async fn get_addr(&self, address: &str) -> DbResult<Option<AddressRecord>> {
        self.client.get("addr", address).await
    }

    async fn put_addr(&self, address: &str, record: &AddressRecord) -> DbResult<()> {
        self.client
            .create("addr", "addr", address, "addrData", record)
            .await
    }
}

#[async_trait]
impl TokenDatabase for TokenDbHttp {
    async fn get_token(&self, token_id: &TokenId) -> DbResult<Option<TokenRecord>> {
        self.client.get("token", &token_id.to_string()).await
    }

    async fn put_token(&self, record: &TokenRecord) -> DbResult<()> {
        self.client
            .create(
                "token",
                "tokenId",
                &record.token_id.to_string(),
                "tokenData",
                record,
            )
            .await
    }
}

#[async_trait]
impl StatusDatabase for StatusDbHttp {
    async fn get_status(&self) -> DbResult<Option<IndexerStatus>> {
        self.client.get("status", STATUS_KEY).await
    }

    async fn put_status(&self, status: &IndexerStatus) -> DbResult<()> {
        self.client
            .create("status", "statusKey", STATUS_KEY, "statusData", status)
            .await
    }
}

#[async_trait]
impl PinClaimDatabase for PinClaimDbHttp {
    async fn get_pin_claim(&self, claim_txid: &Txid) -> DbResult<Option<PinClaim>> {
        self.client.get("pinclaim", &claim_txid.to_string()).await
    }

    async fn put_pin_claim(&self, claim: &PinClaim) -> DbResult<()> {
        self.client
            .create(
                "pinclaim",
                "claimId",
                &claim.claim_txid.to_string(),
                "claimData",
                claim,
            )
            .await
    }
}

#[async_trait]
impl BackupDatabase for BackupDbHttp {
    async fn backup_db(&self, height: u64, epoch: u64) -> DbResult<()> {
        let url = self.client.table_url("backup");
        self.client
            .post_json(&url, &json!({ "height": height, "epoch": epoch }))
            .await
    }

    async fn rollback_db(&self, height: u64) -> DbResult<()> {
        let url = self.client.table_url("restore");
        self.client
            .post_json(&url, &json!({ "height": height }))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::entry_body;

    #[test]
    fn test_processed_entry_body() {
        let txid: Txid = "d9aa162704578945543f5856400546310392a3e68a7922fbc3490e2f21cc7501"
            .parse()
            .unwrap();
        let entry = ProcessedEntry {
            txid,
            block_height: 543_409,
        };
        let body = entry_body("ptxKey", &txid.to_string(), "ptxData", &entry).unwrap();

        assert_eq!(body["ptxKey"], txid.to_string());
        assert_eq!(body["ptxData"]["blockHeight"], 543_409);
    }

    #[test]
    fn test_status_body() {
        let status = IndexerStatus {
            start_block_height: 543_375,
            synced_block_height: 543_400,
            chain_tip_height: 700_000,
        };
        let body = entry_body("statusKey", STATUS_KEY, "statusData", &status).unwrap();

        assert_eq!(body["statusKey"], "status");
        assert_eq!(body["statusData"]["syncedBlockHeight"], 543_400);
    }
}
