//! Splits a block into token and non-token transactions and orders the token ones so that every
//! in-block parent is processed before its children.

use std::{
    collections::HashSet,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use bitcoin::Txid;
use slp_common::{retry_async, RetryPolicy};
use slp_db_types::SlpDatabase;
use tracing::*;

use crate::{
    blacklist::Blacklist,
    cache::TxSource,
    decoder::TokenInfoSource,
    errors::IndexerResult,
    processors::Ledger,
};

/// Block transactions split by whether they get indexed as token transactions.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SlpTxSplit {
    pub slp_txs: Vec<Txid>,

    /// Plain transactions and those of blacklisted tokens.
    pub non_slp_txs: Vec<Txid>,
}

/// In-block parent chain of a candidate.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParentLookup {
    pub has_parent: bool,

    /// Starts with the candidate, followed by each in-block parent found.
    pub dag: Vec<Txid>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ForwardDag {
    /// Whether at least one candidate was appended.
    pub success: bool,
    pub chained: Vec<Txid>,
    pub unsorted: Vec<Txid>,
}

/// A block ready for processing.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SortedBlock {
    /// Independent token transactions first, then each in-block chain oldest first.
    pub combined: Vec<Txid>,
    pub non_slp_txs: Vec<Txid>,
}

pub struct BlockFilter<D> {
    txs: Arc<dyn TxSource>,
    tokens: Arc<dyn TokenInfoSource>,
    ledger: Ledger<D>,
    blacklist: Blacklist,
    retry: RetryPolicy,
    dropped: AtomicU64,
}

impl<D> fmt::Debug for BlockFilter<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockFilter")
            .field("blacklist", &self.blacklist)
            .field("retry", &self.retry)
            .field("dropped", &self.dropped)
            .finish_non_exhaustive()
    }
}

impl<D: SlpDatabase> BlockFilter<D> {
    pub fn new(
        db: Arc<D>,
        txs: Arc<dyn TxSource>,
        tokens: Arc<dyn TokenInfoSource>,
        blacklist: Blacklist,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            txs,
            tokens,
            ledger: Ledger::new(db),
            blacklist,
            retry,
            dropped: AtomicU64::new(0),
        }
    }

    /// Candidates left out of a sorted block since startup.
    pub fn dropped_candidates(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Routes each txid by its decoded token operation, keeping block order.
    pub async fn filter_slp_txs(&self, txids: &[Txid]) -> IndexerResult<SlpTxSplit> {
        let mut split = SlpTxSplit::default();
        for txid in txids {
            let info = retry_async(&self.retry, "get_token_info", || {
                self.tokens.get_token_info(txid)
            })
            .await?;

            match info {
                Some(op) if self.blacklist.contains(&op.token_id) => {
                    debug!(%txid, token_id = %op.token_id, "blacklisted token");
                    split.non_slp_txs.push(*txid);
                }
                Some(_) => split.slp_txs.push(*txid),
                None => split.non_slp_txs.push(*txid),
            }
        }
        Ok(split)
    }

    /// Follows the first token input of each transaction whose parent was mined at
    /// `block_height`, stopping at the first txid seen twice.
    pub async fn check_for_parent2(
        &self,
        txid: &Txid,
        block_height: u64,
    ) -> IndexerResult<ParentLookup> {
        let mut lookup = ParentLookup {
            has_parent: false,
            dag: vec![*txid],
        };

        let mut current = *txid;
        'walk: loop {
            let record = self.txs.get_tx(&current).await?;
            for (_, input) in record.token_inputs() {
                let parent = self.txs.get_tx(&input.txid).await?;
                if parent.block_height != block_height {
                    continue;
                }

                lookup.has_parent = true;
                if lookup.dag.contains(&input.txid) {
                    break 'walk;
                }
                lookup.dag.push(input.txid);
                current = input.txid;
                continue 'walk;
            }
            break;
        }

        Ok(lookup)
    }

    /// Appends unsorted candidates spending the tail of `chained` until none attaches.
    pub async fn forward_dag(
        &self,
        mut chained: Vec<Txid>,
        mut unsorted: Vec<Txid>,
    ) -> IndexerResult<ForwardDag> {
        let mut success = false;

        while let Some(tail) = chained.last().copied() {
            let mut next = None;
            for (i, candidate) in unsorted.iter().enumerate() {
                let record = self.txs.get_tx(candidate).await?;
                if record.token_inputs().any(|(_, input)| input.txid == tail) {
                    next = Some(i);
                    break;
                }
            }

            let Some(i) = next else {
                break;
            };
            chained.push(unsorted.remove(i));
            success = true;
        }

        Ok(ForwardDag {
            success,
            chained,
            unsorted,
        })
    }

    /// Filters the block and orders its token transactions.
    ///
    /// Candidates that neither stand alone nor attach to a chain are dropped and counted.
    pub async fn filter_and_sort_slp_txs2(
        &self,
        txids: &[Txid],
        block_height: u64,
    ) -> IndexerResult<SortedBlock> {
        let SlpTxSplit {
            slp_txs,
            non_slp_txs,
        } = self.filter_slp_txs(txids).await?;

        let mut lookups = Vec::with_capacity(slp_txs.len());
        for txid in &slp_txs {
            lookups.push(self.check_for_parent2(txid, block_height).await?);
        }

        let in_chain: HashSet<Txid> = lookups
            .iter()
            .filter(|p| p.has_parent)
            .flat_map(|p| p.dag.iter().copied())
            .collect();

        let mut combined = Vec::with_capacity(slp_txs.len());
        let mut unsorted = Vec::new();
        for (txid, lookup) in slp_txs.iter().zip(&lookups) {
            if !lookup.has_parent && !in_chain.contains(txid) {
                combined.push(*txid);
            } else {
                unsorted.push(*txid);
            }
        }

        for lookup in lookups.iter().filter(|p| p.has_parent) {
            let Some(head) = lookup.dag.last() else {
                continue;
            };
            let Some(pos) = unsorted.iter().position(|t| t == head) else {
                continue;
            };
            let head = unsorted.remove(pos);

            let forward = self.forward_dag(vec![head], unsorted).await?;
            unsorted = forward.unsorted;
            combined.extend(forward.chained);
        }

        for txid in &unsorted {
            warn!(%txid, block_height, "token transaction never attached to a chain, dropping");
        }
        self.dropped.fetch_add(unsorted.len() as u64, Ordering::Relaxed);

        debug!(
            block_height,
            slp = combined.len(),
            non_slp = non_slp_txs.len(),
            dropped = unsorted.len(),
            "sorted block"
        );
        Ok(SortedBlock {
            combined,
            non_slp_txs,
        })
    }

    /// Burns every tracked token UTXO spent by `txid`.
    ///
    /// Returns `false` if anything failed; the failure is logged.
    pub async fn delete_burned_utxos(&self, txid: &Txid, block_height: u64) -> bool {
        let outpoints = match self.txs.spent_outpoints(txid).await {
            Ok(outpoints) => outpoints,
            Err(err) => {
                warn!(%txid, %err, "could not list spent outpoints");
                return false;
            }
        };

        for outpoint in outpoints {
            if let Err(err) = self
                .ledger
                .burn(&outpoint.txid, outpoint.vout, txid, block_height)
                .await
            {
                warn!(%txid, %outpoint, %err, "burn cleanup failed");
                return false;
            }
        }
        true
    }
}
