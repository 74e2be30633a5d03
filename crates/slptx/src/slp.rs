use bitcoin::{
    opcodes::all::OP_RETURN,
    script::{Instruction, Script},
    Txid,
};
use slp_primitives::{GenesisInfo, TokenId, TokenOperation, TokenType, TxType};

use crate::{
    constants::{MAX_DECIMALS, MAX_SEND_OUTPUTS, MIN_BATON_VOUT, SLP_LOKAD_ID},
    errors::SlpParseError,
};

/// Parses an OP_RETURN script into an SLP [`TokenOperation`].
///
/// `txid` is the id of the transaction carrying the script and becomes the token id of a
/// GENESIS. Token types other than 1, 65 and 129 are still parsed with the common field layout
/// and reported as [`TokenType::Unsupported`].
///
/// # Errors
///
/// Returns [`SlpParseError`] when the script is not an OP_RETURN, lacks the SLP lokad id or any
/// field violates the payload rules.
pub fn parse_slp_script(script: &Script, txid: &Txid) -> Result<TokenOperation, SlpParseError> {
    let pushes = extract_op_return_pushes(script)?;

    let [lokad, token_type, tx_type, fields @ ..] = pushes.as_slice() else {
        return Err(SlpParseError::MissingLokadId);
    };
    if lokad.as_slice() != SLP_LOKAD_ID {
        return Err(SlpParseError::MissingLokadId);
    }

    let token_type = parse_token_type(token_type)?;

    match tx_type.as_slice() {
        b"GENESIS" => parse_genesis(token_type, fields, txid),
        b"MINT" => parse_mint(token_type, fields),
        b"SEND" => parse_send(token_type, fields),
        other => Err(SlpParseError::UnknownTxType(
            String::from_utf8_lossy(other).into_owned(),
        )),
    }
}

/// Returns the data pushes following a leading OP_RETURN.
pub(crate) fn extract_op_return_pushes(script: &Script) -> Result<Vec<Vec<u8>>, SlpParseError> {
    let mut instructions = script.instructions();

    match instructions.next() {
        Some(Ok(Instruction::Op(op))) if op == OP_RETURN => {}
        Some(Err(e)) => return Err(SlpParseError::MalformedScript(e.to_string())),
        _ => return Err(SlpParseError::NotOpReturn),
    }

    let mut pushes = Vec::new();
    for ins in instructions {
        match ins {
            Ok(Instruction::PushBytes(bytes)) => pushes.push(bytes.as_bytes().to_vec()),
            Ok(Instruction::Op(_)) => return Err(SlpParseError::NonPushOpcode),
            Err(e) => return Err(SlpParseError::MalformedScript(e.to_string())),
        }
    }

    Ok(pushes)
}

fn parse_token_type(bytes: &[u8]) -> Result<TokenType, SlpParseError> {
    let value = match bytes {
        [b] => u16::from(*b),
        [hi, lo] => u16::from_be_bytes([*hi, *lo]),
        _ => return Err(SlpParseError::TokenTypeLength(bytes.len())),
    };
    Ok(TokenType::from(value))
}

fn parse_genesis(
    token_type: TokenType,
    fields: &[Vec<u8>],
    txid: &Txid,
) -> Result<TokenOperation, SlpParseError> {
    let [ticker, name, uri, hash, decimals, baton, qty] = fields else {
        return Err(SlpParseError::FieldCount {
            tx_type: "GENESIS",
            expected: "7",
            actual: fields.len(),
        });
    };

    let document_hash = match hash.len() {
        0 => None,
        32 => Some(hex::encode(hash)),
        len => {
            return Err(SlpParseError::FieldLength {
                field: "document hash",
                len,
            })
        }
    };

    let decimals = match decimals.as_slice() {
        [d] if *d <= MAX_DECIMALS => *d,
        [d] => return Err(SlpParseError::Decimals(*d)),
        other => {
            return Err(SlpParseError::FieldLength {
                field: "decimals",
                len: other.len(),
            })
        }
    };

    let mint_baton_vout = parse_baton_vout(baton)?;
    let qty = parse_amount(qty, "initial quantity")?;

    let tx_type = if token_type == TokenType::NftChild {
        if decimals != 0 {
            return Err(SlpParseError::NftChild("decimals must be 0"));
        }
        if mint_baton_vout.is_some() {
            return Err(SlpParseError::NftChild("mint baton not allowed"));
        }
        if qty != 1 {
            return Err(SlpParseError::NftChild("quantity must be 1"));
        }
        TxType::NftGenesis
    } else {
        TxType::Genesis
    };

    Ok(TokenOperation {
        token_type,
        tx_type,
        token_id: TokenId::from(*txid),
        amounts: vec![qty],
        mint_baton_vout,
        genesis: Some(GenesisInfo {
            ticker: String::from_utf8_lossy(ticker).into_owned(),
            name: String::from_utf8_lossy(name).into_owned(),
            document_uri: String::from_utf8_lossy(uri).into_owned(),
            document_hash,
            decimals,
        }),
    })
}

fn parse_mint(token_type: TokenType, fields: &[Vec<u8>]) -> Result<TokenOperation, SlpParseError> {
    if token_type == TokenType::NftChild {
        return Err(SlpParseError::NftChild("MINT not allowed"));
    }

    let [token_id, baton, qty] = fields else {
        return Err(SlpParseError::FieldCount {
            tx_type: "MINT",
            expected: "3",
            actual: fields.len(),
        });
    };

    Ok(TokenOperation {
        token_type,
        tx_type: TxType::Mint,
        token_id: parse_token_id(token_id)?,
        amounts: vec![parse_amount(qty, "additional quantity")?],
        mint_baton_vout: parse_baton_vout(baton)?,
        genesis: None,
    })
}

fn parse_send(token_type: TokenType, fields: &[Vec<u8>]) -> Result<TokenOperation, SlpParseError> {
    let Some((token_id, amounts)) = fields.split_first() else {
        return Err(SlpParseError::FieldCount {
            tx_type: "SEND",
            expected: "2..=20",
            actual: 0,
        });
    };
    if amounts.is_empty() || amounts.len() > MAX_SEND_OUTPUTS {
        return Err(SlpParseError::FieldCount {
            tx_type: "SEND",
            expected: "2..=20",
            actual: fields.len(),
        });
    }

    let amounts = amounts
        .iter()
        .map(|a| parse_amount(a, "output quantity"))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TokenOperation {
        token_type,
        tx_type: TxType::Send,
        token_id: parse_token_id(token_id)?,
        amounts,
        mint_baton_vout: None,
        genesis: None,
    })
}

fn parse_token_id(bytes: &[u8]) -> Result<TokenId, SlpParseError> {
    TokenId::from_slice(bytes).map_err(|_| SlpParseError::FieldLength {
        field: "token id",
        len: bytes.len(),
    })
}

fn parse_baton_vout(bytes: &[u8]) -> Result<Option<u32>, SlpParseError> {
    match bytes {
        [] => Ok(None),
        [v] if *v >= MIN_BATON_VOUT => Ok(Some(u32::from(*v))),
        [v] => Err(SlpParseError::BatonVout(*v)),
        other => Err(SlpParseError::FieldLength {
            field: "mint baton vout",
            len: other.len(),
        }),
    }
}

fn parse_amount(bytes: &[u8], field: &'static str) -> Result<u64, SlpParseError> {
    let arr: [u8; 8] = bytes.try_into().map_err(|_| SlpParseError::FieldLength {
        field,
        len: bytes.len(),
    })?;
    Ok(u64::from_be_bytes(arr))
}
