//! Derived ledger state maintained by the transaction processors.

use bitcoin::Txid;
use serde::{Deserialize, Serialize};

use crate::token::{TokenId, TokenType};

/// Key of a UTXO in the `utxo` table.
pub fn utxo_key(txid: &Txid, vout: u32) -> String {
    format!("{txid}:{vout}")
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UtxoKind {
    Token,
    MintingBaton,
}

/// A token-bearing output tracked by the indexer.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtxoEntry {
    pub txid: Txid,
    pub vout: u32,
    #[serde(rename = "type")]
    pub kind: UtxoKind,
    pub token_id: TokenId,
    pub token_type: TokenType,
    pub qty: u64,
    pub address: String,
    #[serde(rename = "blockheight")]
    pub block_height: u64,
}

impl UtxoEntry {
    pub fn key(&self) -> String {
        utxo_key(&self.txid, self.vout)
    }

    pub fn is_mint_baton(&self) -> bool {
        self.kind == UtxoKind::MintingBaton
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    pub token_id: TokenId,
    pub qty: u64,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct AddressTx {
    pub txid: Txid,
    pub height: u64,
}

/// Per-address token holdings.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct AddressRecord {
    pub utxos: Vec<UtxoEntry>,
    pub balances: Vec<TokenBalance>,
    pub txs: Vec<AddressTx>,
}

impl AddressRecord {
    pub fn add_utxo(&mut self, utxo: UtxoEntry) {
        if !self
            .utxos
            .iter()
            .any(|u| u.txid == utxo.txid && u.vout == utxo.vout)
        {
            self.utxos.push(utxo);
        }
    }

    pub fn remove_utxo(&mut self, txid: &Txid, vout: u32) -> Option<UtxoEntry> {
        let pos = self
            .utxos
            .iter()
            .position(|u| &u.txid == txid && u.vout == vout)?;
        Some(self.utxos.remove(pos))
    }

    pub fn balance_of(&self, token_id: &TokenId) -> u64 {
        self.balances
            .iter()
            .find(|b| &b.token_id == token_id)
            .map(|b| b.qty)
            .unwrap_or(0)
    }

    pub fn credit(&mut self, token_id: TokenId, qty: u64) {
        match self.balances.iter_mut().find(|b| b.token_id == token_id) {
            Some(b) => b.qty = b.qty.saturating_add(qty),
            None => self.balances.push(TokenBalance { token_id, qty }),
        }
    }

    /// Decrements a balance, dropping the entry once it reaches zero.
    pub fn debit(&mut self, token_id: &TokenId, qty: u64) {
        if let Some(pos) = self.balances.iter().position(|b| &b.token_id == token_id) {
            let bal = &mut self.balances[pos];
            bal.qty = bal.qty.saturating_sub(qty);
            if bal.qty == 0 {
                self.balances.remove(pos);
            }
        }
    }

    pub fn record_tx(&mut self, txid: Txid, height: u64) {
        if !self.txs.iter().any(|t| t.txid == txid) {
            self.txs.push(AddressTx { txid, height });
        }
    }
}

/// Token statistics, keyed by token id.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    pub token_id: TokenId,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub ticker: String,
    pub name: String,
    pub document_uri: String,
    pub document_hash: Option<String>,
    pub decimals: u8,
    pub block_created: u64,
    pub total_minted: u64,
    pub total_burned: u64,
    pub txs_total: u64,
    pub mint_baton_is_active: bool,

    /// Group this NFT was minted from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_group_id: Option<TokenId>,

    /// NFTs minted from this group; only present on group tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nfts: Option<Vec<TokenId>>,
}

/// Sync progress of the indexer, stored under the `status` key.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerStatus {
    pub start_block_height: u64,
    pub synced_block_height: u64,
    pub chain_tip_height: u64,
}
