use std::{fmt, sync::Arc};

use async_trait::async_trait;
use bitcoin::Txid;
use slp_btcio::{NodeRpc, RawTransaction};
use slp_primitives::TokenOperation;
use slp_tx::parse_slp_script;

use crate::{
    cache::BoundedCache,
    errors::{IndexerError, IndexerResult},
};

/// Token operations of transactions, by txid.
#[async_trait]
pub trait TokenInfoSource: Send + Sync {
    /// Decodes the SLP payload of `txid`.
    ///
    /// Fails with [`IndexerError::NotSlpTransaction`] when there is none.
    async fn decode_op_return(&self, txid: &Txid) -> IndexerResult<TokenOperation>;

    /// Like [`decode_op_return`](Self::decode_op_return), but returns `None` for non-SLP
    /// transactions and for operations carrying the all-zero token id.
    async fn get_token_info(&self, txid: &Txid) -> IndexerResult<Option<TokenOperation>> {
        match self.decode_op_return(txid).await {
            Ok(op) if op.token_id.is_null() => Ok(None),
            Ok(op) => Ok(Some(op)),
            Err(IndexerError::NotSlpTransaction { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

/// Decodes SLP payloads fetched from the node and memoizes successful decodes.
pub struct TokenDecoder {
    rpc: Arc<dyn NodeRpc>,
    ops: BoundedCache<Txid, TokenOperation>,
}

impl fmt::Debug for TokenDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenDecoder")
            .field("ops", &self.ops)
            .finish_non_exhaustive()
    }
}

impl TokenDecoder {
    pub fn new(rpc: Arc<dyn NodeRpc>, max_entries: usize) -> Self {
        Self {
            rpc,
            ops: BoundedCache::new(max_entries),
        }
    }

    /// Decodes an already fetched transaction.
    pub fn decode_raw(&self, raw: &RawTransaction) -> IndexerResult<TokenOperation> {
        if let Some(op) = self.ops.get(&raw.txid) {
            return Ok(op);
        }

        let script = raw
            .first_output_script()
            .ok_or_else(|| IndexerError::not_slp(raw.txid, "no outputs"))?;
        let op = parse_slp_script(script, &raw.txid)
            .map_err(|err| IndexerError::not_slp(raw.txid, err))?;

        self.ops.insert(raw.txid, op.clone());
        Ok(op)
    }
}

#[async_trait]
impl TokenInfoSource for TokenDecoder {
    async fn decode_op_return(&self, txid: &Txid) -> IndexerResult<TokenOperation> {
        if let Some(op) = self.ops.get(txid) {
            return Ok(op);
        }
        let raw = self.rpc.get_raw_transaction(txid).await?;
        self.decode_raw(&raw)
    }
}
