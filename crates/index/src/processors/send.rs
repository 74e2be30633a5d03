use std::{fmt, sync::Arc};

use async_trait::async_trait;
use slp_db_types::SlpDatabase;
use slp_primitives::{SlpValidity, UtxoKind};
use tracing::*;

use super::{Ledger, TokenTxData, TxTypeProcessor};
use crate::errors::IndexerResult;

/// Spends the token inputs and credits each SEND output.
///
/// Inputs of other tokens, and any excess of the inputs over the outputs, are burned.
pub struct SendProcessor<D> {
    ledger: Ledger<D>,
}

impl<D> fmt::Debug for SendProcessor<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendProcessor").finish_non_exhaustive()
    }
}

impl<D: SlpDatabase> SendProcessor<D> {
    pub fn new(db: Arc<D>) -> Self {
        Self {
            ledger: Ledger::new(db),
        }
    }

    /// Sums the quantities of the sent token held by tracked input UTXOs.
    ///
    /// Inputs with no UTXO in the ledger contribute nothing, whatever the hydrated input says.
    async fn tracked_input_qty(&self, data: &TokenTxData) -> IndexerResult<u64> {
        let mut total = 0u64;
        for (_, input) in data.record.token_inputs() {
            if input.is_mint_baton || input.token_id != Some(data.op.token_id) {
                continue;
            }
            match self.ledger.utxo(&input.txid, input.vout).await? {
                Some(utxo) if utxo.token_id == data.op.token_id && !utxo.is_mint_baton() => {
                    total = total.saturating_add(utxo.qty);
                }
                _ => debug!(
                    txid = %data.record.txid,
                    input = %input.txid,
                    vout = input.vout,
                    "send input is not a tracked utxo"
                ),
            }
        }
        Ok(total)
    }
}

#[async_trait]
impl<D: SlpDatabase> TxTypeProcessor for SendProcessor<D> {
    async fn process_tx(&self, data: &TokenTxData) -> IndexerResult<SlpValidity> {
        let TokenTxData {
            op,
            block_height,
            record,
        } = data;

        let inputs_total = self.tracked_input_qty(data).await?;
        let outputs_total = op.total_qty();
        if outputs_total > inputs_total {
            warn!(
                txid = %record.txid,
                inputs_total,
                outputs_total,
                "send outputs exceed inputs"
            );
            return Ok(SlpValidity::Invalid);
        }

        let mut baton_spent = false;
        for (_, input) in record.token_inputs() {
            if input.token_id == Some(op.token_id) {
                self.ledger
                    .spend(&input.txid, input.vout, &record.txid, *block_height)
                    .await?;
                baton_spent |= input.is_mint_baton;
            } else {
                self.ledger
                    .burn(&input.txid, input.vout, &record.txid, *block_height)
                    .await?;
            }
        }

        for (i, qty) in op.amounts.iter().enumerate() {
            if *qty == 0 {
                continue;
            }
            let n = i as u32 + 1;
            match Ledger::<D>::output_utxo(record, op, n, UtxoKind::Token, *qty, *block_height) {
                Some(utxo) => self.ledger.credit(utxo).await?,
                None => debug!(txid = %record.txid, vout = n, "send output has no address"),
            }
        }

        let burned = inputs_total - outputs_total;
        let mut token = self.ledger.require_token(&op.token_id).await?;
        token.total_burned = token.total_burned.saturating_add(burned);
        if baton_spent {
            token.mint_baton_is_active = false;
        }
        token.txs_total += 1;
        self.ledger.put_token(&token).await?;

        debug!(
            txid = %record.txid,
            token_id = %op.token_id,
            outputs_total,
            burned,
            "indexed token send"
        );
        Ok(SlpValidity::Valid)
    }
}
