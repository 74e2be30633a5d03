use std::{fmt, sync::Arc};

use async_trait::async_trait;
use slp_db_types::SlpDatabase;
use slp_primitives::{SlpValidity, TokenRecord, TokenType, TransactionRecord, UtxoKind};
use tracing::*;

use super::{Ledger, TokenTxData, TxTypeProcessor};
use crate::errors::IndexerResult;

/// Creates the token record and credits the initial supply and baton.
pub struct GenesisProcessor<D> {
    ledger: Ledger<D>,
}

impl<D> fmt::Debug for GenesisProcessor<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenesisProcessor").finish_non_exhaustive()
    }
}

impl<D: SlpDatabase> GenesisProcessor<D> {
    pub fn new(db: Arc<D>) -> Self {
        Self {
            ledger: Ledger::new(db),
        }
    }
}

/// Baton output that can actually be spent later: present, past the receiver and existing.
pub(super) fn live_baton_vout(record: &TransactionRecord, baton_vout: Option<u32>) -> Option<u32> {
    baton_vout.filter(|vout| *vout > 1 && record.output(*vout).is_some())
}

#[async_trait]
impl<D: SlpDatabase> TxTypeProcessor for GenesisProcessor<D> {
    async fn process_tx(&self, data: &TokenTxData) -> IndexerResult<SlpValidity> {
        let TokenTxData {
            op,
            block_height,
            record,
        } = data;
        let Some(genesis) = &op.genesis else {
            return Ok(SlpValidity::Invalid);
        };

        let qty = op.output_qty(1).unwrap_or(0);
        let baton_vout = live_baton_vout(record, op.mint_baton_vout);

        let token = TokenRecord {
            token_id: op.token_id,
            token_type: op.token_type,
            ticker: genesis.ticker.clone(),
            name: genesis.name.clone(),
            document_uri: genesis.document_uri.clone(),
            document_hash: genesis.document_hash.clone(),
            decimals: genesis.decimals,
            block_created: *block_height,
            total_minted: qty,
            total_burned: 0,
            txs_total: 1,
            mint_baton_is_active: baton_vout.is_some(),
            parent_group_id: None,
            nfts: (op.token_type == TokenType::NftGroup).then(Vec::new),
        };
        self.ledger.put_token(&token).await?;

        match Ledger::<D>::output_utxo(record, op, 1, UtxoKind::Token, qty, *block_height) {
            Some(utxo) => self.ledger.credit(utxo).await?,
            None => debug!(txid = %record.txid, "genesis receiver has no address"),
        }

        let baton = baton_vout.and_then(|vout| {
            Ledger::<D>::output_utxo(record, op, vout, UtxoKind::MintingBaton, 0, *block_height)
        });
        if let Some(baton) = baton {
            self.ledger.credit(baton).await?;
        }

        info!(token_id = %op.token_id, ticker = %token.ticker, qty, "indexed token genesis");
        Ok(SlpValidity::Valid)
    }
}
