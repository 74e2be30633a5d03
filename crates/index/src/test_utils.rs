use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use bitcoin::{hashes::Hash, Amount, BlockHash, OutPoint, ScriptBuf, Txid};
use parking_lot::Mutex;
use slp_btcio::{
    BlockHeaderInfo, ClientError, MockNodeRpc, RawInput, RawOutput, RawScriptPubKey,
    RawTransaction,
};
use slp_primitives::{
    GenesisInfo, TokenId, TokenOperation, TokenType, TransactionRecord, TxInput, TxOutput, TxType,
};
use slp_tx::constants::PIN_CLAIM_PREFIX;

use crate::{
    cache::TxSource,
    decoder::TokenInfoSource,
    errors::{IndexerError, IndexerResult},
};

pub(crate) fn txid(id: u8) -> Txid {
    Txid::from_byte_array([id; 32])
}

pub(crate) fn block_hash(id: u8) -> BlockHash {
    BlockHash::from_byte_array([id; 32])
}

pub(crate) fn address(n: u32) -> String {
    format!("bitcoincash:qtest{n}")
}

fn missing_tx() -> ClientError {
    ClientError::Rpc {
        code: -5,
        message: "No such mempool or blockchain transaction".to_owned(),
    }
}

/// Chain of hydrated records and decoded operations, counting record fetches.
#[derive(Debug, Default)]
pub(crate) struct FakeChain {
    txs: Mutex<HashMap<Txid, TransactionRecord>>,
    ops: Mutex<HashMap<Txid, TokenOperation>>,
    fetches: AtomicUsize,
}

impl FakeChain {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_token_tx(&self, (record, op): (TransactionRecord, TokenOperation)) {
        self.ops.lock().insert(record.txid, op);
        self.txs.lock().insert(record.txid, record);
    }

    pub(crate) fn add_plain_tx(&self, record: TransactionRecord) {
        self.txs.lock().insert(record.txid, record);
    }

    pub(crate) fn record(&self, txid: &Txid) -> Option<TransactionRecord> {
        self.txs.lock().get(txid).cloned()
    }

    pub(crate) fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TxSource for FakeChain {
    async fn get_tx(&self, txid: &Txid) -> IndexerResult<TransactionRecord> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.record(txid).ok_or_else(|| IndexerError::Rpc(missing_tx()))
    }

    async fn spent_outpoints(&self, txid: &Txid) -> IndexerResult<Vec<OutPoint>> {
        let record = self
            .record(txid)
            .ok_or_else(|| IndexerError::Rpc(missing_tx()))?;
        Ok(record
            .vin
            .iter()
            .map(|i| OutPoint::new(i.txid, i.vout))
            .collect())
    }

    fn refresh(&self, record: TransactionRecord) {
        self.txs.lock().insert(record.txid, record);
    }
}

#[async_trait]
impl TokenInfoSource for FakeChain {
    async fn decode_op_return(&self, txid: &Txid) -> IndexerResult<TokenOperation> {
        self.ops
            .lock()
            .get(txid)
            .cloned()
            .ok_or_else(|| IndexerError::not_slp(*txid, "no slp payload"))
    }
}

fn genesis_info() -> GenesisInfo {
    GenesisInfo {
        ticker: "TST".to_owned(),
        name: "Test Token".to_owned(),
        document_uri: "https://example.org".to_owned(),
        document_hash: None,
        decimals: 0,
    }
}

/// Record with outputs annotated from `op`; output `n > 0` pays [`address`]`(n)`.
pub(crate) fn token_record(
    txid: Txid,
    height: u64,
    op: &TokenOperation,
    vin: Vec<TxInput>,
) -> TransactionRecord {
    let mut record = TransactionRecord::new(txid, height);
    record.token_type = Some(op.token_type);
    record.tx_type = op.tx_type;
    record.token_id = Some(op.token_id);
    record.decimals = op.decimals();
    record.vin = vin;

    let last = match op.tx_type {
        TxType::Send => op.amounts.len() as u32,
        _ => op.mint_baton_vout.unwrap_or(0).max(1),
    };
    record.vout = (0..=last)
        .map(|n| {
            let mut out = TxOutput::new(n, if n == 0 { 0 } else { 546 }, None);
            if n > 0 {
                out.address = Some(address(n));
            }
            out.token_qty = op.output_qty(n);
            out.is_mint_baton = op.is_mint_baton_output(n);
            if out.token_qty.is_some() || out.is_mint_baton {
                out.token_id = Some(op.token_id);
            }
            out
        })
        .collect();
    record
}

pub(crate) fn genesis_tx(
    txid: Txid,
    height: u64,
    token_type: TokenType,
    qty: u64,
    baton: Option<u32>,
) -> (TransactionRecord, TokenOperation) {
    let op = TokenOperation {
        token_type,
        tx_type: if token_type == TokenType::NftChild {
            TxType::NftGenesis
        } else {
            TxType::Genesis
        },
        token_id: TokenId::from(txid),
        amounts: vec![qty],
        mint_baton_vout: baton,
        genesis: Some(genesis_info()),
    };
    (token_record(txid, height, &op, Vec::new()), op)
}

/// NFT child genesis spending `group_input` at vin 0.
pub(crate) fn nft_genesis_tx(
    txid: Txid,
    height: u64,
    group_input: TxInput,
) -> (TransactionRecord, TokenOperation) {
    let (mut record, op) = genesis_tx(txid, height, TokenType::NftChild, 1, None);
    record.vin = vec![group_input];
    (record, op)
}

pub(crate) fn send_tx(
    txid: Txid,
    height: u64,
    token_type: TokenType,
    token_id: TokenId,
    vin: Vec<TxInput>,
    amounts: &[u64],
) -> (TransactionRecord, TokenOperation) {
    let op = TokenOperation {
        token_type,
        tx_type: TxType::Send,
        token_id,
        amounts: amounts.to_vec(),
        mint_baton_vout: None,
        genesis: None,
    };
    (token_record(txid, height, &op, vin), op)
}

pub(crate) fn mint_tx(
    txid: Txid,
    height: u64,
    token_id: TokenId,
    vin: Vec<TxInput>,
    qty: u64,
    baton: Option<u32>,
) -> (TransactionRecord, TokenOperation) {
    let op = TokenOperation {
        token_type: TokenType::Fungible,
        tx_type: TxType::Mint,
        token_id,
        amounts: vec![qty],
        mint_baton_vout: baton,
        genesis: None,
    };
    (token_record(txid, height, &op, vin), op)
}

/// Non-token transaction paying one output.
pub(crate) fn plain_tx(txid: Txid, height: u64, vin: Vec<TxInput>) -> TransactionRecord {
    let mut record = TransactionRecord::new(txid, height);
    record.vin = vin;
    record.vout = vec![TxOutput::new(0, 10_000, Some(address(0)))];
    record
}

pub(crate) fn token_input(parent: Txid, vout: u32, token_id: TokenId, qty: u64) -> TxInput {
    let mut input = TxInput::new(parent, vout);
    input.token_id = Some(token_id);
    input.token_qty = qty;
    input.address = Some(address(vout));
    input.value = Some(546);
    input
}

pub(crate) fn baton_input(parent: Txid, vout: u32, token_id: TokenId) -> TxInput {
    let mut input = token_input(parent, vout, token_id, 0);
    input.is_mint_baton = true;
    input
}

/// OP_RETURN script with the given pushes; empty pushes use OP_PUSHDATA1.
pub(crate) fn op_return(pushes: &[&[u8]]) -> ScriptBuf {
    let mut bytes = vec![0x6a];
    for push in pushes {
        match push.len() {
            0 => bytes.extend_from_slice(&[0x4c, 0x00]),
            len @ 1..=75 => bytes.push(len as u8),
            len => bytes.extend_from_slice(&[0x4c, len as u8]),
        }
        bytes.extend_from_slice(push);
    }
    ScriptBuf::from_bytes(bytes)
}

pub(crate) fn slp_genesis_script(token_type: u8, qty: u64, baton: Option<u8>) -> ScriptBuf {
    let baton: Vec<u8> = baton.into_iter().collect();
    op_return(&[
        b"SLP\0",
        &[token_type],
        b"GENESIS",
        b"TST",
        b"Test Token",
        b"",
        b"",
        &[0],
        &baton,
        &qty.to_be_bytes(),
    ])
}

pub(crate) fn slp_send_script(token_type: u8, token_id: &TokenId, amounts: &[u64]) -> ScriptBuf {
    let token_type = [token_type];
    let amounts: Vec<[u8; 8]> = amounts.iter().map(|a| a.to_be_bytes()).collect();
    let mut pushes: Vec<&[u8]> = Vec::new();
    pushes.push(b"SLP\0");
    pushes.push(&token_type);
    pushes.push(b"SEND");
    pushes.push(token_id.as_bytes());
    pushes.extend(amounts.iter().map(|a| a.as_slice()));
    op_return(&pushes)
}

pub(crate) fn pin_claim_script(proof_of_burn: [u8; 32], cid: &str, filename: &str) -> ScriptBuf {
    op_return(&[
        PIN_CLAIM_PREFIX,
        &proof_of_burn,
        cid.as_bytes(),
        filename.as_bytes(),
    ])
}

pub(crate) fn p2pkh_script() -> ScriptBuf {
    let mut bytes = vec![0x76, 0xa9, 0x14];
    bytes.extend_from_slice(&[0u8; 20]);
    bytes.extend_from_slice(&[0x88, 0xac]);
    ScriptBuf::from_bytes(bytes)
}

/// Raw transaction with outputs numbered in order.
pub(crate) fn raw_tx(
    txid: Txid,
    blockhash: Option<BlockHash>,
    vin: Vec<(Txid, u32)>,
    vout: Vec<(ScriptBuf, u64, Option<String>)>,
) -> RawTransaction {
    RawTransaction {
        txid,
        vin: vin
            .into_iter()
            .map(|(txid, vout)| RawInput {
                coinbase: None,
                txid: Some(txid),
                vout: Some(vout),
            })
            .collect(),
        vout: vout
            .into_iter()
            .enumerate()
            .map(|(n, (hex, sats, address))| RawOutput {
                value: Amount::from_sat(sats),
                n: n as u32,
                script_pub_key: RawScriptPubKey {
                    hex,
                    address,
                    addresses: Vec::new(),
                },
            })
            .collect(),
        blockhash,
    }
}

pub(crate) fn header(hash: BlockHash, height: u64) -> BlockHeaderInfo {
    BlockHeaderInfo { hash, height }
}

/// Serves `getrawtransaction` from `txs`, failing like the node for unknown txids.
pub(crate) fn mock_raw_txs(rpc: &mut MockNodeRpc, txs: Vec<RawTransaction>) {
    let txs: HashMap<Txid, RawTransaction> = txs.into_iter().map(|tx| (tx.txid, tx)).collect();
    rpc.expect_get_raw_transaction()
        .returning(move |txid| txs.get(txid).cloned().ok_or_else(missing_tx));
}
