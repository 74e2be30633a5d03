use bitcoin::Txid;
use serde::{Deserialize, Serialize};

/// A pin claim: a request to pin content on IPFS, backed by a proof-of-burn transaction.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinClaim {
    pub proof_of_burn_txid: String,
    pub cid: String,
    pub filename: String,
    pub claim_txid: Txid,
    /// Address that funded the claim, taken from the first input.
    pub address: Option<String>,
}
