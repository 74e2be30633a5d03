use bitcoin::{Amount, BlockHash, OutPoint, Script, ScriptBuf, Txid};
use serde::{Deserialize, Serialize};

/// Subset of `getblock` (verbosity 1) the indexer uses.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub hash: BlockHash,
    pub height: u64,
    pub tx: Vec<Txid>,
}

/// Subset of `getblockheader`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct BlockHeaderInfo {
    pub hash: BlockHash,
    pub height: u64,
}

/// Verbose `getrawtransaction` result.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub txid: Txid,
    pub vin: Vec<RawInput>,
    pub vout: Vec<RawOutput>,

    /// Absent while the transaction sits in the mempool.
    #[serde(default)]
    pub blockhash: Option<BlockHash>,
}

impl RawTransaction {
    /// Script of the first output, where SLP and pin claim payloads live.
    pub fn first_output_script(&self) -> Option<&Script> {
        self.vout
            .iter()
            .find(|o| o.n == 0)
            .map(|o| o.script_pub_key.hex.as_script())
    }

    pub fn output(&self, n: u32) -> Option<&RawOutput> {
        self.vout.iter().find(|o| o.n == n)
    }

    /// Outpoints spent by this transaction, skipping the coinbase input.
    pub fn spent_outpoints(&self) -> impl Iterator<Item = OutPoint> + '_ {
        self.vin.iter().filter_map(RawInput::outpoint)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RawInput {
    #[serde(default)]
    pub coinbase: Option<String>,

    #[serde(default)]
    pub txid: Option<Txid>,

    #[serde(default)]
    pub vout: Option<u32>,
}

impl RawInput {
    pub fn outpoint(&self) -> Option<OutPoint> {
        if self.coinbase.is_some() {
            return None;
        }
        Some(OutPoint::new(self.txid?, self.vout?))
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RawOutput {
    #[serde(with = "bitcoin::amount::serde::as_btc")]
    pub value: Amount,

    pub n: u32,

    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: RawScriptPubKey,
}

impl RawOutput {
    pub fn address(&self) -> Option<&str> {
        self.script_pub_key.address()
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RawScriptPubKey {
    pub hex: ScriptBuf,

    /// Newer nodes report a single address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<String>,
}

impl RawScriptPubKey {
    pub fn address(&self) -> Option<&str> {
        self.address
            .as_deref()
            .or_else(|| self.addresses.first().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW_TX_JSON: &str = r#"{
        "txid": "d9aa162704578945543f5856400546310392a3e68a7922fbc3490e2f21cc7501",
        "blockhash": "0000000000000000002a5ab7ba8e1f25bbbc34b4e4e0bcdba4f2c0c25bda8d61",
        "vin": [
            { "coinbase": "03f84c08" },
            { "txid": "4e52e0ec1ebc1d3a1b7f2ae2dbfd7d8bdb8c5a7cb8ac62085d1e0a6d6b2209ee", "vout": 1 }
        ],
        "vout": [
            {
                "value": 0.0,
                "n": 0,
                "scriptPubKey": { "hex": "6a04534c5000", "type": "nulldata" }
            },
            {
                "value": 0.00000546,
                "n": 1,
                "scriptPubKey": {
                    "hex": "76a914000000000000000000000000000000000000000088ac",
                    "addresses": ["bitcoincash:qqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqq"]
                }
            }
        ]
    }"#;

    #[test]
    fn test_parse_raw_transaction() {
        let tx: RawTransaction = serde_json::from_str(RAW_TX_JSON).unwrap();

        assert!(tx.blockhash.is_some());
        assert_eq!(tx.spent_outpoints().count(), 1);
        assert_eq!(tx.vout[1].value, Amount::from_sat(546));
        assert_eq!(
            tx.output(1).and_then(RawOutput::address),
            Some("bitcoincash:qqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqq")
        );
        assert_eq!(
            tx.first_output_script().map(|s| s.to_bytes()),
            Some(vec![0x6a, 0x04, 0x53, 0x4c, 0x50, 0x00])
        );
    }
}
