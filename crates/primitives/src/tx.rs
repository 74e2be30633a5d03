use bitcoin::{BlockHash, Txid};
use serde::{Deserialize, Serialize};

use crate::token::{SlpValidity, TokenId, TokenType, TxType};

/// Hydrated view of one on-chain transaction as consumed by validation.
///
/// Non-token transactions carry `token_type == None` and all per-input/per-output token fields
/// are empty.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub txid: Txid,

    #[serde(rename = "blockheight")]
    pub block_height: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<BlockHash>,

    #[serde(default)]
    pub token_type: Option<TokenType>,

    #[serde(default)]
    pub tx_type: TxType,

    #[serde(default)]
    pub token_id: Option<TokenId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u8>,

    pub vin: Vec<TxInput>,
    pub vout: Vec<TxOutput>,

    #[serde(default, skip_serializing_if = "SlpValidity::is_unknown")]
    pub is_valid_slp: SlpValidity,
}

impl TransactionRecord {
    /// Creates a record with no token information attached.
    pub fn new(txid: Txid, block_height: u64) -> Self {
        Self {
            txid,
            block_height,
            block_hash: None,
            token_type: None,
            tx_type: TxType::Unknown,
            token_id: None,
            decimals: None,
            vin: Vec::new(),
            vout: Vec::new(),
            is_valid_slp: SlpValidity::Unknown,
        }
    }

    pub fn is_token_tx(&self) -> bool {
        self.token_type.is_some()
    }

    pub fn output(&self, n: u32) -> Option<&TxOutput> {
        self.vout.iter().find(|o| o.n == n)
    }

    /// Inputs that spend token value or a mint baton.
    pub fn token_inputs(&self) -> impl Iterator<Item = (usize, &TxInput)> {
        self.vin.iter().enumerate().filter(|(_, i)| i.carries_token())
    }

    /// Address of the given output, if the node resolved one.
    pub fn output_address(&self, n: u32) -> Option<&str> {
        self.output(n).and_then(|o| o.address.as_deref())
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxInput {
    pub txid: Txid,
    pub vout: u32,

    #[serde(default)]
    pub token_qty: u64,

    #[serde(default)]
    pub token_id: Option<TokenId>,

    #[serde(default)]
    pub is_mint_baton: bool,

    #[serde(default)]
    pub address: Option<String>,

    /// Value of the spent output in satoshis.
    #[serde(default)]
    pub value: Option<u64>,
}

impl TxInput {
    pub fn new(txid: Txid, vout: u32) -> Self {
        Self {
            txid,
            vout,
            token_qty: 0,
            token_id: None,
            is_mint_baton: false,
            address: None,
            value: None,
        }
    }

    pub fn carries_token(&self) -> bool {
        self.token_qty > 0 || self.is_mint_baton
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxOutput {
    pub n: u32,

    /// Satoshis.
    #[serde(default)]
    pub value: u64,

    #[serde(default)]
    pub address: Option<String>,

    #[serde(default)]
    pub token_qty: Option<u64>,

    #[serde(default)]
    pub token_id: Option<TokenId>,

    #[serde(default)]
    pub is_mint_baton: bool,
}

impl TxOutput {
    pub fn new(n: u32, value: u64, address: Option<String>) -> Self {
        Self {
            n,
            value,
            address,
            token_qty: None,
            token_id: None,
            is_mint_baton: false,
        }
    }

    pub fn token_qty(&self) -> u64 {
        self.token_qty.unwrap_or(0)
    }
}
