use std::{fmt, sync::Arc};

use async_trait::async_trait;
use slp_db_types::SlpDatabase;
use slp_primitives::{SlpValidity, TokenRecord, TokenType, UtxoKind};
use tracing::*;

use super::{Ledger, TokenTxData, TxTypeProcessor};
use crate::errors::{IndexerError, IndexerResult};

/// Creates an NFT child, burning the group token spent at input 0.
pub struct NftGenesisProcessor<D> {
    ledger: Ledger<D>,
}

impl<D> fmt::Debug for NftGenesisProcessor<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NftGenesisProcessor").finish_non_exhaustive()
    }
}

impl<D: SlpDatabase> NftGenesisProcessor<D> {
    pub fn new(db: Arc<D>) -> Self {
        Self {
            ledger: Ledger::new(db),
        }
    }
}

#[async_trait]
impl<D: SlpDatabase> TxTypeProcessor for NftGenesisProcessor<D> {
    async fn process_tx(&self, data: &TokenTxData) -> IndexerResult<SlpValidity> {
        let TokenTxData {
            op,
            block_height,
            record,
        } = data;
        let Some(genesis) = &op.genesis else {
            return Ok(SlpValidity::Invalid);
        };
        let Some(group_in) = record.vin.first().filter(|i| i.carries_token()) else {
            warn!(txid = %record.txid, "nft genesis without group input");
            return Ok(SlpValidity::Invalid);
        };

        let Some(group_utxo) = self.ledger.utxo(&group_in.txid, group_in.vout).await? else {
            let outpoint = format!("{}:{}", group_in.txid, group_in.vout);
            return Err(IndexerError::MissingEntry(format!("group utxo {outpoint}")));
        };
        if group_utxo.token_type != TokenType::NftGroup {
            warn!(
                txid = %record.txid,
                token_type = %group_utxo.token_type,
                "nft genesis spends a non-group token"
            );
            return Ok(SlpValidity::Invalid);
        }

        self.ledger
            .spend(&group_in.txid, group_in.vout, &record.txid, *block_height)
            .await?;

        let mut group = self.ledger.require_token(&group_utxo.token_id).await?;
        group.total_burned = group.total_burned.saturating_add(group_utxo.qty);
        group.nfts.get_or_insert_with(Vec::new).push(op.token_id);
        group.txs_total += 1;
        self.ledger.put_token(&group).await?;

        let qty = op.output_qty(1).unwrap_or(1);
        let child = TokenRecord {
            token_id: op.token_id,
            token_type: TokenType::NftChild,
            ticker: genesis.ticker.clone(),
            name: genesis.name.clone(),
            document_uri: genesis.document_uri.clone(),
            document_hash: genesis.document_hash.clone(),
            decimals: genesis.decimals,
            block_created: *block_height,
            total_minted: qty,
            total_burned: 0,
            txs_total: 1,
            mint_baton_is_active: false,
            parent_group_id: Some(group_utxo.token_id),
            nfts: None,
        };
        self.ledger.put_token(&child).await?;

        if let Some(utxo) =
            Ledger::<D>::output_utxo(record, op, 1, UtxoKind::Token, qty, *block_height)
        {
            self.ledger.credit(utxo).await?;
        }

        info!(
            token_id = %op.token_id,
            group_id = %group_utxo.token_id,
            "indexed nft genesis"
        );
        Ok(SlpValidity::Valid)
    }
}
