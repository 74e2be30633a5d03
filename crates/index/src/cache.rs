//! Hydrated transaction records, memoized in memory in front of the store and the node.

use std::{collections::HashMap, fmt, hash::Hash, sync::Arc};

use async_trait::async_trait;
use bitcoin::{hashes::Hash as _, OutPoint, Txid};
use parking_lot::Mutex;
use slp_btcio::{NodeRpc, RawTransaction};
use slp_db_types::{SlpDatabase, TxDatabase};
use slp_primitives::{TokenOperation, TransactionRecord, TxInput, TxOutput};
use tracing::*;

use crate::{
    decoder::TokenDecoder,
    errors::{IndexerError, IndexerResult},
};

/// Map that is emptied entirely once the number of insertions exceeds `max_entries`.
///
/// Only the insertion counter drives the reset, so a key inserted repeatedly still counts once
/// per insertion.
pub struct BoundedCache<K, V> {
    inner: Mutex<CacheInner<K, V>>,
    max_entries: usize,
}

struct CacheInner<K, V> {
    map: HashMap<K, V>,
    inserts: usize,
}

impl<K, V> fmt::Debug for BoundedCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("BoundedCache")
            .field("len", &inner.map.len())
            .field("inserts", &inner.inserts)
            .field("max_entries", &self.max_entries)
            .finish()
    }
}

impl<K: Eq + Hash, V: Clone> BoundedCache<K, V> {
    pub fn new(max_entries: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                map: HashMap::new(),
                inserts: 0,
            }),
            max_entries,
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.lock().map.get(key).cloned()
    }

    pub fn insert(&self, key: K, value: V) {
        let mut inner = self.inner.lock();
        inner.map.insert(key, value);
        inner.inserts += 1;
        if inner.inserts > self.max_entries {
            inner.map.clear();
            inner.inserts = 0;
        }
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.inner.lock().map.remove(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Source of hydrated transaction records.
#[async_trait]
pub trait TxSource: Send + Sync {
    async fn get_tx(&self, txid: &Txid) -> IndexerResult<TransactionRecord>;

    /// Outpoints spent by `txid`, without hydrating the parents.
    async fn spent_outpoints(&self, txid: &Txid) -> IndexerResult<Vec<OutPoint>>;

    /// Replaces the memoized record, e.g. once a verdict has been stored.
    fn refresh(&self, record: TransactionRecord);
}

/// Looks transactions up in memory, then in the store, then hydrates them from the node.
pub struct TxCache<D> {
    rpc: Arc<dyn NodeRpc>,
    db: Arc<D>,
    decoder: Arc<TokenDecoder>,
    records: BoundedCache<Txid, TransactionRecord>,
}

impl<D> fmt::Debug for TxCache<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxCache")
            .field("records", &self.records)
            .finish_non_exhaustive()
    }
}

impl<D: SlpDatabase> TxCache<D> {
    pub fn new(
        rpc: Arc<dyn NodeRpc>,
        db: Arc<D>,
        decoder: Arc<TokenDecoder>,
        max_entries: usize,
    ) -> Self {
        Self {
            rpc,
            db,
            decoder,
            records: BoundedCache::new(max_entries),
        }
    }

    pub async fn get(&self, txid: &Txid) -> IndexerResult<TransactionRecord> {
        if let Some(record) = self.records.get(txid) {
            return Ok(record);
        }

        let record = match self.db.tx_db().get_tx(txid).await? {
            Some(record) => record,
            None => self.hydrate(txid).await?,
        };
        self.records.insert(*txid, record.clone());
        Ok(record)
    }

    pub fn put(&self, txid: Txid, record: TransactionRecord) -> IndexerResult<()> {
        if txid == Txid::all_zeros() {
            return Err(IndexerError::InvalidArgument(
                "cache key must be a non-null txid".to_owned(),
            ));
        }
        self.records.insert(txid, record);
        Ok(())
    }

    pub fn delete(&self, txid: &Txid) {
        self.records.remove(txid);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Builds a record from the node: own token operation on the outputs, the parents' token
    /// operations on the inputs.
    async fn hydrate(&self, txid: &Txid) -> IndexerResult<TransactionRecord> {
        trace!(%txid, "hydrating transaction");
        let raw = self.rpc.get_raw_transaction(txid).await?;

        let block_height = match raw.blockhash {
            Some(hash) => self.rpc.get_block_header(&hash).await?.height,
            None => self.rpc.get_block_count().await?,
        };

        let mut record = TransactionRecord::new(raw.txid, block_height);
        record.block_hash = raw.blockhash;

        for outpoint in raw.spent_outpoints() {
            record.vin.push(self.hydrate_input(outpoint).await?);
        }

        let own_op = self.decoder.decode_raw(&raw).ok();
        record.vout = annotate_outputs(&raw, own_op.as_ref());

        if let Some(op) = own_op {
            record.token_type = Some(op.token_type);
            record.tx_type = op.tx_type;
            record.token_id = Some(op.token_id);
            record.decimals = op.decimals();
        }

        Ok(record)
    }

    async fn hydrate_input(&self, outpoint: OutPoint) -> IndexerResult<TxInput> {
        let mut input = TxInput::new(outpoint.txid, outpoint.vout);
        let parent = self.rpc.get_raw_transaction(&outpoint.txid).await?;

        if let Some(out) = parent.output(outpoint.vout) {
            input.address = out.address().map(str::to_owned);
            input.value = Some(out.value.to_sat());
        }

        if let Ok(op) = self.decoder.decode_raw(&parent) {
            input.token_id = Some(op.token_id);
            input.token_qty = op.output_qty(outpoint.vout).unwrap_or(0);
            input.is_mint_baton = op.is_mint_baton_output(outpoint.vout);
        }

        Ok(input)
    }
}

fn annotate_outputs(raw: &RawTransaction, op: Option<&TokenOperation>) -> Vec<TxOutput> {
    raw.vout
        .iter()
        .map(|o| {
            let mut out = TxOutput::new(o.n, o.value.to_sat(), o.address().map(str::to_owned));
            if let Some(op) = op {
                out.token_qty = op.output_qty(o.n);
                out.is_mint_baton = op.is_mint_baton_output(o.n);
                if out.token_qty.is_some() || out.is_mint_baton {
                    out.token_id = Some(op.token_id);
                }
            }
            out
        })
        .collect()
}

#[async_trait]
impl<D: SlpDatabase> TxSource for TxCache<D> {
    async fn get_tx(&self, txid: &Txid) -> IndexerResult<TransactionRecord> {
        self.get(txid).await
    }

    async fn spent_outpoints(&self, txid: &Txid) -> IndexerResult<Vec<OutPoint>> {
        let raw = self.rpc.get_raw_transaction(txid).await?;
        Ok(raw.spent_outpoints().collect())
    }

    fn refresh(&self, record: TransactionRecord) {
        if let Err(err) = self.put(record.txid, record) {
            debug!(%err, "skipping cache refresh");
        }
    }
}
