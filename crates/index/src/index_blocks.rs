//! Block and transaction orchestration.
//!
//! A block is filtered and sorted, its token transactions are processed strictly in order, and its
//! remaining transactions are checked for burned token UTXOs and pin claims.

use std::{
    collections::{HashMap, VecDeque},
    fmt,
    sync::Arc,
};

use bitcoin::Txid;
use parking_lot::RwLock;
use slp_btcio::NodeRpc;
use slp_common::{retry_async, RetryPolicy};
use slp_config::IndexerConfig;
use slp_db_types::{BackupDatabase, ProcessedTxDatabase, SlpDatabase, TxDatabase};
use slp_primitives::{PinClaim, SlpValidity, TokenOperation, TokenType, TransactionRecord, TxType};
use tracing::*;

use crate::{
    blacklist::Blacklist,
    cache::{TxCache, TxSource},
    claims::{ClaimWebhook, PinClaimScanner},
    dag::DagValidator,
    decoder::{TokenDecoder, TokenInfoSource},
    errors::{IndexerError, IndexerResult},
    filter::BlockFilter,
    processors::{Processors, TokenTxData},
};

/// Returned by [`BlockIndexer::process_block`] when the block completed.
pub const BLOCK_PROCESSED: u32 = 1;

/// Where the host is in its sync lifecycle.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum IndexPhase {
    #[default]
    Startup,
    InitialSync,
    /// Following the tip block by block. Failing transactions are skipped instead of retried.
    TipFollowing,
}

/// Result of [`BlockIndexer::process_tx`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TxOutcome {
    /// Found in the processed-tx table; nothing was written.
    AlreadyProcessed,
    /// Token transaction of a blacklisted token, stored as ignored.
    Blacklisted(TransactionRecord),
    /// Token transaction stored with its verdict.
    Indexed(TransactionRecord),
    /// Not a token transaction, with the pin claim it carried, if any.
    NotToken(Option<PinClaim>),
}

/// Assembles a [`BlockIndexer`].
///
/// Every collaborator not set explicitly is built over the node and the store.
pub struct BlockIndexerBuilder<D> {
    db: Arc<D>,
    rpc: Arc<dyn NodeRpc>,
    config: IndexerConfig,
    blacklist: Blacklist,
    webhook: Option<Arc<dyn ClaimWebhook>>,
    rpc_retry: Option<RetryPolicy>,
    tx_source: Option<Arc<dyn TxSource>>,
    token_source: Option<Arc<dyn TokenInfoSource>>,
    processors: Option<Processors>,
}

impl<D> fmt::Debug for BlockIndexerBuilder<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockIndexerBuilder")
            .field("config", &self.config)
            .field("blacklist", &self.blacklist)
            .field("rpc_retry", &self.rpc_retry)
            .finish_non_exhaustive()
    }
}

impl<D: SlpDatabase + 'static> BlockIndexerBuilder<D> {
    pub fn new(db: Arc<D>, rpc: Arc<dyn NodeRpc>, config: IndexerConfig) -> Self {
        Self {
            db,
            rpc,
            config,
            blacklist: Blacklist::default(),
            webhook: None,
            rpc_retry: None,
            tx_source: None,
            token_source: None,
            processors: None,
        }
    }

    pub fn with_blacklist(mut self, blacklist: Blacklist) -> Self {
        self.blacklist = blacklist;
        self
    }

    pub fn with_webhook(mut self, webhook: Arc<dyn ClaimWebhook>) -> Self {
        self.webhook = Some(webhook);
        self
    }

    /// Policy for block lookups. Defaults to [`RetryPolicy::default`].
    pub fn with_rpc_retry(mut self, policy: RetryPolicy) -> Self {
        self.rpc_retry = Some(policy);
        self
    }

    pub fn with_tx_source(mut self, txs: Arc<dyn TxSource>) -> Self {
        self.tx_source = Some(txs);
        self
    }

    pub fn with_token_source(mut self, tokens: Arc<dyn TokenInfoSource>) -> Self {
        self.token_source = Some(tokens);
        self
    }

    pub fn with_processors(mut self, processors: Processors) -> Self {
        self.processors = Some(processors);
        self
    }

    pub fn build(self) -> BlockIndexer<D> {
        let cache_max = self.config.cache_max_entries;
        let decoder = Arc::new(TokenDecoder::new(self.rpc.clone(), cache_max));

        let tokens = self
            .token_source
            .unwrap_or_else(|| decoder.clone() as Arc<dyn TokenInfoSource>);
        let txs = self.tx_source.unwrap_or_else(|| {
            let cache = TxCache::new(self.rpc.clone(), self.db.clone(), decoder, cache_max);
            Arc::new(cache) as Arc<dyn TxSource>
        });
        let processors = self
            .processors
            .unwrap_or_else(|| Processors::store_backed(self.db.clone()));

        let filter_retry =
            RetryPolicy::default().with_max_retries(self.config.filter_retry_attempts);
        let filter = BlockFilter::new(
            self.db.clone(),
            txs.clone(),
            tokens.clone(),
            self.blacklist.clone(),
            filter_retry,
        );

        BlockIndexer {
            dag: DagValidator::new(txs.clone(), self.config.max_dag_depth),
            claims: PinClaimScanner::new(self.rpc.clone(), self.db.clone(), self.webhook),
            db: self.db,
            rpc: self.rpc,
            txs,
            tokens,
            filter,
            processors,
            blacklist: self.blacklist,
            rpc_retry: self.rpc_retry.unwrap_or_default(),
            tx_retry_limit: self.config.tx_retry_limit,
            backup_epoch: self.config.backup_epoch,
            phase: RwLock::new(IndexPhase::Startup),
        }
    }
}

/// Indexes blocks and transactions into the store.
pub struct BlockIndexer<D> {
    db: Arc<D>,
    rpc: Arc<dyn NodeRpc>,
    txs: Arc<dyn TxSource>,
    tokens: Arc<dyn TokenInfoSource>,
    dag: DagValidator,
    filter: BlockFilter<D>,
    processors: Processors,
    claims: PinClaimScanner<D>,
    blacklist: Blacklist,
    rpc_retry: RetryPolicy,
    tx_retry_limit: u32,
    backup_epoch: u64,
    phase: RwLock<IndexPhase>,
}

impl<D> fmt::Debug for BlockIndexer<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockIndexer")
            .field("phase", &*self.phase.read())
            .field("tx_retry_limit", &self.tx_retry_limit)
            .field("backup_epoch", &self.backup_epoch)
            .finish_non_exhaustive()
    }
}

impl<D: SlpDatabase> BlockIndexer<D> {
    pub fn phase(&self) -> IndexPhase {
        *self.phase.read()
    }

    pub fn set_phase(&self, phase: IndexPhase) {
        let mut current = self.phase.write();
        if *current != phase {
            info!(from = ?*current, to = ?phase, "index phase changed");
            *current = phase;
        }
    }

    pub fn validator(&self) -> &DagValidator {
        &self.dag
    }

    pub fn filter(&self) -> &BlockFilter<D> {
        &self.filter
    }

    /// Indexes the block at `block_height`, returning [`BLOCK_PROCESSED`].
    ///
    /// # Errors
    ///
    /// Lookup and sorting failures, and [`IndexerError::FatalRecoveryRequested`] once a token
    /// transaction exhausts its retries.
    pub async fn process_block(&self, block_height: u64) -> IndexerResult<u32> {
        let hash = retry_async(&self.rpc_retry, "get_block_hash", || {
            self.rpc.get_block_hash(block_height)
        })
        .await?;
        let block = retry_async(&self.rpc_retry, "get_block", || {
            self.rpc.get_block(&hash)
        })
        .await?;

        let sorted = self
            .filter
            .filter_and_sort_slp_txs2(&block.tx, block_height)
            .await?;
        let slp_count = sorted.combined.len();

        let mut queue: VecDeque<Txid> = sorted.combined.into_iter().collect();
        if !self.process_slp_txs(&mut queue, block_height).await? {
            warn!(
                block_height,
                skipped = queue.len() + 1,
                "abandoned token transactions of block"
            );
        }

        for txid in &sorted.non_slp_txs {
            if !self.filter.delete_burned_utxos(txid, block_height).await {
                warn!(%txid, block_height, "burn cleanup incomplete");
            }
            if let Err(err) = self.process_tx(txid, block_height).await {
                warn!(%txid, block_height, %err, "failed to process non-token transaction");
            }
        }

        info!(
            block_height,
            %hash,
            slp = slp_count,
            non_slp = sorted.non_slp_txs.len(),
            "processed block"
        );
        Ok(BLOCK_PROCESSED)
    }

    /// Processes `queue` front to back, requeueing failures.
    ///
    /// A txid is attempted at most `tx_retry_limit + 1` times: the limit counts retries after the
    /// first attempt, so the `tx_retry_limit + 1`-th failure requests recovery.
    ///
    /// Returns `Ok(false)` if the rest of the queue was abandoned while following the tip; the
    /// failing txid is not put back.
    ///
    /// # Errors
    ///
    /// [`IndexerError::FatalRecoveryRequested`] once a txid fails more than the retry limit.
    pub async fn process_slp_txs(
        &self,
        queue: &mut VecDeque<Txid>,
        block_height: u64,
    ) -> IndexerResult<bool> {
        let mut failures: HashMap<Txid, u32> = HashMap::new();

        while let Some(txid) = queue.pop_front() {
            let err = match self.process_tx(&txid, block_height).await {
                Ok(outcome) => {
                    trace!(%txid, ?outcome, "processed token transaction");
                    continue;
                }
                Err(err) => err,
            };

            if self.phase() == IndexPhase::TipFollowing {
                warn!(%txid, block_height, %err, "skipping failed transaction at tip");
                return Ok(false);
            }

            let count = failures.entry(txid).or_default();
            *count += 1;
            if *count > self.tx_retry_limit {
                return Err(self.handle_process_failure(block_height, txid, &err).await);
            }

            warn!(%txid, block_height, %err, attempt = *count, "transaction failed, requeued");
            queue.push_back(txid);
        }

        Ok(true)
    }

    /// Requests a rollback to the largest epoch boundary strictly below `block_height - 1` and
    /// builds the error the host acts on.
    async fn handle_process_failure(
        &self,
        block_height: u64,
        txid: Txid,
        cause: &IndexerError,
    ) -> IndexerError {
        let rollback_height = rollback_height(block_height, self.backup_epoch);

        if let Err(err) = self.db.backup_db().rollback_db(rollback_height).await {
            error!(rollback_height, %err, "rollback request failed");
        }
        error!(
            %txid,
            block_height,
            rollback_height,
            %cause,
            "transaction exhausted its retries, recovery requested"
        );

        IndexerError::FatalRecoveryRequested {
            block_height,
            rollback_height,
            txid,
        }
    }

    /// Indexes a single transaction once.
    pub async fn process_tx(&self, txid: &Txid, block_height: u64) -> IndexerResult<TxOutcome> {
        let ptx_db = self.db.processed_tx_db();
        if let Some(height) = ptx_db.get_processed(txid).await? {
            debug!(%txid, height, "already processed");
            return Ok(TxOutcome::AlreadyProcessed);
        }

        let outcome = match self.tokens.decode_op_return(txid).await {
            Ok(op) if op.token_id.is_null() => self.process_not_token(txid).await?,
            Ok(op) if self.blacklist.contains(&op.token_id) => {
                let mut record = self.txs.get_tx(txid).await?;
                record.is_valid_slp = SlpValidity::Ignored;
                self.store_record(&record).await?;
                info!(%txid, token_id = %op.token_id, "ignored blacklisted token transaction");
                TxOutcome::Blacklisted(record)
            }
            Ok(op) => TxOutcome::Indexed(self.process_data(txid, op, block_height).await?),
            Err(IndexerError::NotSlpTransaction { reason, .. }) => {
                debug!(%txid, %reason, "not a token transaction");
                self.process_not_token(txid).await?
            }
            Err(err) => return Err(err),
        };

        ptx_db.put_processed(txid, block_height).await?;
        Ok(outcome)
    }

    async fn process_not_token(&self, txid: &Txid) -> IndexerResult<TxOutcome> {
        Ok(TxOutcome::NotToken(self.claims.process_claim(txid).await?))
    }

    /// Validates a token transaction, applies it and stores its record with the verdict.
    async fn process_data(
        &self,
        txid: &Txid,
        op: TokenOperation,
        block_height: u64,
    ) -> IndexerResult<TransactionRecord> {
        let mut record = self.txs.get_tx(txid).await?;

        let validity = if !op.token_type.is_supported() {
            debug!(%txid, token_type = %op.token_type, "unsupported token type");
            SlpValidity::Ignored
        } else if self.validate(&record, &op).await? {
            self.apply(&record, op, block_height).await?
        } else {
            SlpValidity::Invalid
        };

        if validity == SlpValidity::Invalid
            && !self.filter.delete_burned_utxos(txid, block_height).await
        {
            warn!(%txid, block_height, "burn cleanup of invalid transaction incomplete");
        }

        record.is_valid_slp = validity;
        self.store_record(&record).await?;
        debug!(%txid, tx_type = %record.tx_type, ?validity, "stored token transaction");
        Ok(record)
    }

    async fn validate(
        &self,
        record: &TransactionRecord,
        op: &TokenOperation,
    ) -> IndexerResult<bool> {
        match op.tx_type {
            TxType::Mint | TxType::Send => Ok(self
                .dag
                .crawl_dag(&record.txid, &op.token_id, None)
                .await?
                .is_valid),
            TxType::NftGenesis => self.spends_group_token(record).await,
            TxType::Genesis => Ok(true),
            TxType::Unknown => Ok(false),
        }
    }

    /// NFT children must spend a group token at input 0.
    async fn spends_group_token(&self, record: &TransactionRecord) -> IndexerResult<bool> {
        let Some(first) = record.vin.first().filter(|i| i.carries_token()) else {
            return Ok(false);
        };
        let parent = self.txs.get_tx(&first.txid).await?;
        Ok(parent.token_type == Some(TokenType::NftGroup))
    }

    async fn apply(
        &self,
        record: &TransactionRecord,
        op: TokenOperation,
        block_height: u64,
    ) -> IndexerResult<SlpValidity> {
        let Some(processor) = self.processors.for_tx_type(op.tx_type) else {
            return Ok(SlpValidity::Invalid);
        };
        let data = TokenTxData {
            op,
            block_height,
            record: record.clone(),
        };
        Ok(match processor.process_tx(&data).await? {
            SlpValidity::Unknown => SlpValidity::Valid,
            verdict => verdict,
        })
    }

    async fn store_record(&self, record: &TransactionRecord) -> IndexerResult<()> {
        self.db.tx_db().put_tx(record).await?;
        self.txs.refresh(record.clone());
        Ok(())
    }
}

/// Largest multiple of `epoch` strictly below `block_height - 1`.
fn rollback_height(block_height: u64, epoch: u64) -> u64 {
    let epoch = epoch.max(1);
    block_height.saturating_sub(2) / epoch * epoch
}
