//! Drives the indexer from the stored sync height up to the node tip, then follows new blocks.

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use slp_btcio::NodeRpc;
use slp_common::{retry_async, RetryPolicy};
use slp_config::IndexerConfig;
use slp_db_types::{BackupDatabase, SlpDatabase};
use slp_index::{
    get_status, update_chain_tip, update_indexed_block_height, BlockIndexer, IndexPhase,
    IndexerResult,
};
use tokio::{
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::*;

/// Sets `stop` on ctrl-c. The sync loop finishes the block in hand before exiting.
pub(crate) fn spawn_signal_listener(stop: Arc<AtomicBool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(%err, "failed to listen for ctrl-c");
            return;
        }
        info!("received ctrl-c, stopping after the current block");
        stop.store(true, Ordering::SeqCst);
    })
}

pub(crate) struct SyncWorker<D> {
    db: Arc<D>,
    rpc: Arc<dyn NodeRpc>,
    indexer: BlockIndexer<D>,
    start_height: u64,
    backup_epoch: u64,
    poll_interval: Duration,
    tip_retry: RetryPolicy,
    stop: Arc<AtomicBool>,
}

impl<D> fmt::Debug for SyncWorker<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncWorker")
            .field("start_height", &self.start_height)
            .field("backup_epoch", &self.backup_epoch)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl<D: SlpDatabase> SyncWorker<D> {
    pub(crate) fn new(
        db: Arc<D>,
        rpc: Arc<dyn NodeRpc>,
        indexer: BlockIndexer<D>,
        config: &IndexerConfig,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            db,
            rpc,
            indexer,
            start_height: config.start_block_height,
            backup_epoch: config.backup_epoch.max(1),
            poll_interval: Duration::from_millis(config.block_poll_interval_ms),
            tip_retry: RetryPolicy::default(),
            stop,
        }
    }

    #[cfg(test)]
    fn with_tip_retry(mut self, policy: RetryPolicy) -> Self {
        self.tip_retry = policy;
        self
    }

    fn stopping(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    async fn chain_tip(&self) -> IndexerResult<u64> {
        let tip = retry_async(&self.tip_retry, "getblockcount", || {
            self.rpc.get_block_count()
        })
        .await?;
        Ok(tip)
    }

    /// Indexes one block, advances the synced height and snapshots the store on epoch boundaries.
    async fn index_block(&self, block_height: u64) -> IndexerResult<()> {
        self.indexer.process_block(block_height).await?;
        let next = update_indexed_block_height(self.db.as_ref(), block_height).await?;

        if next % self.backup_epoch == 0 {
            self.db
                .backup_db()
                .backup_db(next, self.backup_epoch)
                .await?;
            info!(height = next, epoch = self.backup_epoch, "requested store backup");
        }
        Ok(())
    }

    /// Catches up with the node. Returns the last synced height.
    pub(crate) async fn initial_sync(&self) -> IndexerResult<u64> {
        self.indexer.set_phase(IndexPhase::InitialSync);

        let status = get_status(self.db.as_ref(), self.rpc.as_ref(), self.start_height).await?;
        let mut synced = status.synced_block_height;
        let mut tip = self.chain_tip().await?;
        update_chain_tip(self.db.as_ref(), tip).await?;
        info!(from = synced + 1, tip, "starting initial sync");

        while synced < tip {
            if self.stopping() {
                info!(synced, "stop requested during initial sync");
                return Ok(synced);
            }

            let height = synced + 1;
            self.index_block(height).await?;
            synced = height;

            tip = self.chain_tip().await?;
            update_chain_tip(self.db.as_ref(), tip).await?;
        }

        info!(synced, "initial sync complete");
        Ok(synced)
    }

    /// Polls the node for new blocks until stopped. Returns the last synced height.
    pub(crate) async fn follow_tip(&self, mut synced: u64) -> IndexerResult<u64> {
        self.indexer.set_phase(IndexPhase::TipFollowing);

        let mut interval = time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !self.stopping() {
            interval.tick().await;

            let tip = match self.chain_tip().await {
                Ok(tip) => tip,
                Err(err) => {
                    warn!(%err, "failed to poll chain tip");
                    continue;
                }
            };

            while synced < tip && !self.stopping() {
                let height = synced + 1;
                match self.index_block(height).await {
                    Ok(()) => synced = height,
                    Err(err) if err.is_recoverable() => {
                        warn!(height, %err, "block failed, retrying on next poll");
                        break;
                    }
                    Err(err) => return Err(err),
                }
                update_chain_tip(self.db.as_ref(), tip).await?;
            }
        }

        info!(synced, "stopped following the chain tip");
        Ok(synced)
    }

    pub(crate) async fn run(&self) -> IndexerResult<u64> {
        let synced = self.initial_sync().await?;
        if self.stopping() {
            return Ok(synced);
        }
        self.follow_tip(synced).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU64;

    use bitcoin::{hashes::Hash, BlockHash};
    use slp_btcio::{BlockInfo, MockNodeRpc};
    use slp_db_store_memory::MemoryBackend;
    use slp_db_types::StatusDatabase;
    use slp_index::BlockIndexerBuilder;

    use super::*;

    fn config(start: u64, epoch: u64) -> IndexerConfig {
        IndexerConfig {
            start_block_height: start,
            backup_epoch: epoch,
            block_poll_interval_ms: 1,
            filter_retry_attempts: 0,
            ..Default::default()
        }
    }

    /// A node whose blocks carry no transactions, with a movable tip.
    fn growing_chain(tip: Arc<AtomicU64>) -> MockNodeRpc {
        let mut rpc = MockNodeRpc::new();
        rpc.expect_get_block_count()
            .returning(move || Ok(tip.load(Ordering::SeqCst)));
        rpc.expect_get_block_hash()
            .returning(|_| Ok(BlockHash::all_zeros()));
        rpc.expect_get_block().returning(|hash| {
            Ok(BlockInfo {
                hash: *hash,
                height: 0,
                tx: vec![],
            })
        });
        rpc
    }

    fn empty_chain(tip: u64) -> MockNodeRpc {
        growing_chain(Arc::new(AtomicU64::new(tip)))
    }

    fn worker(
        db: Arc<MemoryBackend>,
        rpc: MockNodeRpc,
        config: IndexerConfig,
        stop: Arc<AtomicBool>,
    ) -> SyncWorker<MemoryBackend> {
        let rpc: Arc<dyn NodeRpc> = Arc::new(rpc);
        let indexer = BlockIndexerBuilder::new(db.clone(), rpc.clone(), config.clone())
            .with_rpc_retry(RetryPolicy::none())
            .build();
        SyncWorker::new(db, rpc, indexer, &config, stop).with_tip_retry(RetryPolicy::none())
    }

    #[tokio::test]
    async fn test_initial_sync_reaches_tip_and_backs_up() {
        let db = Arc::new(MemoryBackend::new());
        let stop = Arc::new(AtomicBool::new(false));
        let worker = worker(db.clone(), empty_chain(105), config(100, 2), stop);

        let synced = worker.initial_sync().await.unwrap();
        assert_eq!(synced, 105);

        let status = db.status_db().get_status().await.unwrap().unwrap();
        assert_eq!(status.start_block_height, 100);
        assert_eq!(status.synced_block_height, 105);
        assert_eq!(status.chain_tip_height, 105);

        // Snapshots are taken when the next height to index is a multiple of the epoch.
        assert_eq!(db.store().snapshot_heights(), vec![102, 104, 106]);
    }

    #[tokio::test]
    async fn test_initial_sync_honours_stop_flag() {
        let db = Arc::new(MemoryBackend::new());
        let stop = Arc::new(AtomicBool::new(true));
        let worker = worker(db.clone(), empty_chain(110), config(100, 1000), stop.clone());

        assert_eq!(worker.run().await.unwrap(), 100);
        let status = db.status_db().get_status().await.unwrap().unwrap();
        assert_eq!(status.synced_block_height, 100);
        assert_eq!(status.chain_tip_height, 110);
    }

    #[tokio::test]
    async fn test_resumes_from_stored_status() {
        let db = Arc::new(MemoryBackend::new());
        let stop = Arc::new(AtomicBool::new(false));
        let first = worker(db.clone(), empty_chain(103), config(100, 1000), stop.clone());
        assert_eq!(first.initial_sync().await.unwrap(), 103);

        let second = worker(db.clone(), empty_chain(106), config(500, 1000), stop);
        assert_eq!(second.initial_sync().await.unwrap(), 106);

        let status = db.status_db().get_status().await.unwrap().unwrap();
        assert_eq!(status.start_block_height, 100);
        assert_eq!(status.synced_block_height, 106);
    }

    #[tokio::test]
    async fn test_follow_tip_indexes_new_blocks() {
        let tip = Arc::new(AtomicU64::new(102));
        let rpc = growing_chain(tip.clone());

        let db = Arc::new(MemoryBackend::new());
        let stop = Arc::new(AtomicBool::new(false));
        let worker = worker(db.clone(), rpc, config(100, 1000), stop.clone());
        assert_eq!(worker.initial_sync().await.unwrap(), 102);

        tip.store(104, Ordering::SeqCst);
        let stopper = {
            let db = db.clone();
            tokio::spawn(async move {
                loop {
                    let status = db.status_db().get_status().await.unwrap().unwrap();
                    if status.synced_block_height >= 104 {
                        stop.store(true, Ordering::SeqCst);
                        break;
                    }
                    time::sleep(Duration::from_millis(1)).await;
                }
            })
        };

        assert_eq!(worker.follow_tip(102).await.unwrap(), 104);
        assert_eq!(worker.indexer.phase(), IndexPhase::TipFollowing);
        stopper.await.unwrap();

        let status = db.status_db().get_status().await.unwrap().unwrap();
        assert_eq!(status.chain_tip_height, 104);
    }
}
