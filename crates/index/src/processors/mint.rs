use std::{fmt, sync::Arc};

use async_trait::async_trait;
use slp_db_types::SlpDatabase;
use slp_primitives::{SlpValidity, UtxoKind};
use tracing::*;

use super::{genesis::live_baton_vout, Ledger, TokenTxData, TxTypeProcessor};
use crate::errors::{IndexerError, IndexerResult};

/// Moves the baton and credits newly issued supply.
pub struct MintProcessor<D> {
    ledger: Ledger<D>,
}

impl<D> fmt::Debug for MintProcessor<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MintProcessor").finish_non_exhaustive()
    }
}

impl<D: SlpDatabase> MintProcessor<D> {
    pub fn new(db: Arc<D>) -> Self {
        Self {
            ledger: Ledger::new(db),
        }
    }
}

#[async_trait]
impl<D: SlpDatabase> TxTypeProcessor for MintProcessor<D> {
    async fn process_tx(&self, data: &TokenTxData) -> IndexerResult<SlpValidity> {
        let TokenTxData {
            op,
            block_height,
            record,
        } = data;

        let Some(baton_in) = record
            .vin
            .iter()
            .find(|i| i.is_mint_baton && i.token_id == Some(op.token_id))
        else {
            warn!(txid = %record.txid, token_id = %op.token_id, "mint without baton input");
            return Ok(SlpValidity::Invalid);
        };

        self.ledger
            .spend(&baton_in.txid, baton_in.vout, &record.txid, *block_height)
            .await?
            .ok_or_else(|| {
                IndexerError::MissingEntry(format!("baton {}:{}", baton_in.txid, baton_in.vout))
            })?;

        let qty = op.output_qty(1).unwrap_or(0);
        if let Some(utxo) =
            Ledger::<D>::output_utxo(record, op, 1, UtxoKind::Token, qty, *block_height)
        {
            self.ledger.credit(utxo).await?;
        }

        let baton_vout = live_baton_vout(record, op.mint_baton_vout);
        let baton = baton_vout.and_then(|vout| {
            Ledger::<D>::output_utxo(record, op, vout, UtxoKind::MintingBaton, 0, *block_height)
        });
        if let Some(baton) = baton {
            self.ledger.credit(baton).await?;
        }

        let mut token = self.ledger.require_token(&op.token_id).await?;
        token.total_minted = token.total_minted.saturating_add(qty);
        token.mint_baton_is_active = baton_vout.is_some();
        token.txs_total += 1;
        self.ledger.put_token(&token).await?;

        info!(token_id = %op.token_id, qty, baton = ?baton_vout, "indexed token mint");
        Ok(SlpValidity::Valid)
    }
}

#[cfg(test)]
mod tests {
    use slp_db_store_memory::MemoryBackend;
    use slp_db_types::{AddrDatabase, TokenDatabase, UtxoDatabase};
    use slp_primitives::{ledger::utxo_key, TokenType};

    use super::*;
    use crate::{processors::GenesisProcessor, test_utils::*};

    async fn seed_genesis(db: &Arc<MemoryBackend>) -> slp_primitives::TokenId {
        let (record, op) = genesis_tx(txid(1), 100, TokenType::Fungible, 1_000, Some(2));
        let token_id = op.token_id;
        GenesisProcessor::new(db.clone())
            .process_tx(&TokenTxData {
                op,
                block_height: 100,
                record,
            })
            .await
            .unwrap();
        token_id
    }

    #[tokio::test]
    async fn test_mint_moves_baton() {
        let db = Arc::new(MemoryBackend::new());
        let token_id = seed_genesis(&db).await;
        let processor = MintProcessor::new(db.clone());

        let (record, op) = mint_tx(
            txid(2),
            101,
            token_id,
            vec![baton_input(txid(1), 2, token_id)],
            500,
            Some(2),
        );
        let verdict = processor
            .process_tx(&TokenTxData {
                op,
                block_height: 101,
                record,
            })
            .await
            .unwrap();
        assert_eq!(verdict, SlpValidity::Valid);

        let token = db.token_db().get_token(&token_id).await.unwrap().unwrap();
        assert_eq!(token.total_minted, 1_500);
        assert_eq!(token.txs_total, 2);
        assert!(token.mint_baton_is_active);

        let utxo_db = db.utxo_db();
        assert!(utxo_db.get_utxo(&utxo_key(&txid(1), 2)).await.unwrap().is_none());
        assert!(utxo_db
            .get_utxo(&utxo_key(&txid(2), 2))
            .await
            .unwrap()
            .is_some_and(|u| u.is_mint_baton()));

        let receiver = db.addr_db().get_addr(&address(1)).await.unwrap().unwrap();
        assert_eq!(receiver.balance_of(&token_id), 1_500);
    }

    #[tokio::test]
    async fn test_mint_ending_baton() {
        let db = Arc::new(MemoryBackend::new());
        let token_id = seed_genesis(&db).await;
        let processor = MintProcessor::new(db.clone());

        let (record, op) = mint_tx(
            txid(2),
            101,
            token_id,
            vec![baton_input(txid(1), 2, token_id)],
            1,
            None,
        );
        processor
            .process_tx(&TokenTxData {
                op,
                block_height: 101,
                record,
            })
            .await
            .unwrap();

        let token = db.token_db().get_token(&token_id).await.unwrap().unwrap();
        assert!(!token.mint_baton_is_active);
    }

    #[tokio::test]
    async fn test_mint_requires_baton() {
        let db = Arc::new(MemoryBackend::new());
        let token_id = seed_genesis(&db).await;
        let processor = MintProcessor::new(db.clone());

        let (record, op) = mint_tx(
            txid(2),
            101,
            token_id,
            vec![token_input(txid(1), 1, token_id, 1_000)],
            500,
            None,
        );
        let data = TokenTxData {
            op,
            block_height: 101,
            record,
        };
        assert_eq!(
            processor.process_tx(&data).await.unwrap(),
            SlpValidity::Invalid
        );

        // A baton input the store never saw.
        let (record, op) = mint_tx(
            txid(3),
            101,
            token_id,
            vec![baton_input(txid(9), 2, token_id)],
            500,
            None,
        );
        let err = processor
            .process_tx(&TokenTxData {
                op,
                block_height: 101,
                record,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, IndexerError::MissingEntry(_)));
    }
}
