//! Sync progress kept in the `status` table.

use slp_btcio::NodeRpc;
use slp_db_types::{SlpDatabase, StatusDatabase};
use slp_primitives::IndexerStatus;
use tracing::*;

use crate::errors::{IndexerError, IndexerResult};

/// Loads the status record, creating it on first run.
///
/// A fresh record starts at `start_height` with nothing synced beyond it and the node's current
/// tip.
pub async fn get_status<D: SlpDatabase>(
    db: &D,
    rpc: &dyn NodeRpc,
    start_height: u64,
) -> IndexerResult<IndexerStatus> {
    let status_db = db.status_db();
    if let Some(status) = status_db.get_status().await? {
        return Ok(status);
    }

    let status = IndexerStatus {
        start_block_height: start_height,
        synced_block_height: start_height,
        chain_tip_height: rpc.get_block_count().await?,
    };
    status_db.put_status(&status).await?;
    info!(
        start_height,
        tip = status.chain_tip_height,
        "created indexer status"
    );
    Ok(status)
}

/// Records `last_indexed` as synced and returns the next height to index.
///
/// # Errors
///
/// [`IndexerError::StatusOutOfSync`] unless `last_indexed` directly follows the synced height.
pub async fn update_indexed_block_height<D: SlpDatabase>(
    db: &D,
    last_indexed: u64,
) -> IndexerResult<u64> {
    let status_db = db.status_db();
    let mut status = status_db
        .get_status()
        .await?
        .ok_or_else(|| IndexerError::MissingEntry("status".to_owned()))?;

    if status.synced_block_height + 1 != last_indexed {
        return Err(IndexerError::StatusOutOfSync {
            synced: status.synced_block_height,
            indexed: last_indexed,
        });
    }

    status.synced_block_height = last_indexed;
    status_db.put_status(&status).await?;
    Ok(last_indexed + 1)
}

pub async fn update_chain_tip<D: SlpDatabase>(db: &D, tip: u64) -> IndexerResult<IndexerStatus> {
    let status_db = db.status_db();
    let mut status = status_db
        .get_status()
        .await?
        .ok_or_else(|| IndexerError::MissingEntry("status".to_owned()))?;

    if status.chain_tip_height != tip {
        status.chain_tip_height = tip;
        status_db.put_status(&status).await?;
    }
    Ok(status)
}
