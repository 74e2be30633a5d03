use std::{fmt, sync::Arc};

use bitcoin::Txid;
use slp_db_types::{AddrDatabase, SlpDatabase, TokenDatabase, UtxoDatabase};
use slp_primitives::{
    ledger::utxo_key, TokenId, TokenOperation, TokenRecord, TransactionRecord, UtxoEntry,
    UtxoKind,
};
use tracing::*;

use crate::errors::{IndexerError, IndexerResult};

/// UTXO, address and token bookkeeping shared by the processors and burn cleanup.
pub(crate) struct Ledger<D> {
    db: Arc<D>,
}

impl<D> fmt::Debug for Ledger<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ledger").finish_non_exhaustive()
    }
}

impl<D: SlpDatabase> Ledger<D> {
    pub(crate) fn new(db: Arc<D>) -> Self {
        Self { db }
    }

    /// Builds the UTXO for output `n` of `record`, if the output has an address.
    pub(crate) fn output_utxo(
        record: &TransactionRecord,
        op: &TokenOperation,
        n: u32,
        kind: UtxoKind,
        qty: u64,
        block_height: u64,
    ) -> Option<UtxoEntry> {
        let address = record.output_address(n)?;
        Some(UtxoEntry {
            txid: record.txid,
            vout: n,
            kind,
            token_id: op.token_id,
            token_type: op.token_type,
            qty,
            address: address.to_owned(),
            block_height,
        })
    }

    /// Stores a new UTXO and credits its holder.
    pub(crate) async fn credit(&self, utxo: UtxoEntry) -> IndexerResult<()> {
        self.db.utxo_db().put_utxo(&utxo).await?;

        let addr_db = self.db.addr_db();
        let mut holder = addr_db.get_addr(&utxo.address).await?.unwrap_or_default();
        if !utxo.is_mint_baton() {
            holder.credit(utxo.token_id, utxo.qty);
        }
        holder.record_tx(utxo.txid, utxo.block_height);
        let address = utxo.address.clone();
        holder.add_utxo(utxo);
        addr_db.put_addr(&address, &holder).await?;
        Ok(())
    }

    /// Removes a spent UTXO from the store and from its holder.
    ///
    /// Returns `None` when the outpoint is not a tracked token UTXO.
    pub(crate) async fn spend(
        &self,
        txid: &Txid,
        vout: u32,
        spender: &Txid,
        block_height: u64,
    ) -> IndexerResult<Option<UtxoEntry>> {
        let key = utxo_key(txid, vout);
        let utxo_db = self.db.utxo_db();
        let Some(utxo) = utxo_db.get_utxo(&key).await? else {
            return Ok(None);
        };

        let addr_db = self.db.addr_db();
        if let Some(mut holder) = addr_db.get_addr(&utxo.address).await? {
            holder.remove_utxo(txid, vout);
            if !utxo.is_mint_baton() {
                holder.debit(&utxo.token_id, utxo.qty);
            }
            holder.record_tx(*spender, block_height);
            addr_db.put_addr(&utxo.address, &holder).await?;
        } else {
            warn!(%key, address = %utxo.address, "utxo holder missing");
        }

        utxo_db.delete_utxo(&key).await?;
        Ok(Some(utxo))
    }

    /// Spends a UTXO whose value is not forwarded and books it as burned on its token.
    pub(crate) async fn burn(
        &self,
        txid: &Txid,
        vout: u32,
        spender: &Txid,
        block_height: u64,
    ) -> IndexerResult<Option<UtxoEntry>> {
        let Some(utxo) = self.spend(txid, vout, spender, block_height).await? else {
            return Ok(None);
        };

        if let Some(mut token) = self.token(&utxo.token_id).await? {
            token.total_burned = token.total_burned.saturating_add(utxo.qty);
            if utxo.is_mint_baton() {
                token.mint_baton_is_active = false;
            }
            self.put_token(&token).await?;
        }
        debug!(key = %utxo.key(), qty = utxo.qty, "burned token utxo");
        Ok(Some(utxo))
    }

    pub(crate) async fn token(&self, token_id: &TokenId) -> IndexerResult<Option<TokenRecord>> {
        Ok(self.db.token_db().get_token(token_id).await?)
    }

    pub(crate) async fn require_token(&self, token_id: &TokenId) -> IndexerResult<TokenRecord> {
        self.token(token_id)
            .await?
            .ok_or_else(|| IndexerError::MissingEntry(format!("token {token_id}")))
    }

    pub(crate) async fn put_token(&self, token: &TokenRecord) -> IndexerResult<()> {
        Ok(self.db.token_db().put_token(token).await?)
    }

    pub(crate) async fn utxo(&self, txid: &Txid, vout: u32) -> IndexerResult<Option<UtxoEntry>> {
        Ok(self.db.utxo_db().get_utxo(&utxo_key(txid, vout)).await?)
    }
}
