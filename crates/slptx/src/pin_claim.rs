use bitcoin::script::Script;

use crate::{constants::PIN_CLAIM_PREFIX, slp::extract_op_return_pushes};

/// Fields carried in a pin claim OP_RETURN.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PinClaimPayload {
    /// Hex of the 32 byte proof-of-burn txid, as pushed.
    pub proof_of_burn_txid: String,
    pub cid: String,
    pub filename: String,
}

/// Recognizes `OP_RETURN <00510000> <proof-of-burn txid> <cid> <filename>`.
///
/// Returns `None` for anything else, including claims with non-utf8 text fields.
pub fn parse_pin_claim_script(script: &Script) -> Option<PinClaimPayload> {
    let pushes = extract_op_return_pushes(script).ok()?;

    let [prefix, pob, cid, filename] = pushes.as_slice() else {
        return None;
    };
    if prefix.as_slice() != PIN_CLAIM_PREFIX || pob.len() != 32 {
        return None;
    }

    Some(PinClaimPayload {
        proof_of_burn_txid: hex::encode(pob),
        cid: String::from_utf8(cid.clone()).ok()?,
        filename: String::from_utf8(filename.clone()).ok()?,
    })
}

#[cfg(test)]
mod tests {
    use bitcoin::ScriptBuf;

    use super::*;

    fn claim_script(prefix: &[u8], pob: &[u8]) -> ScriptBuf {
        let cid = b"bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi";
        let name = b"cat.jpg";
        let mut bytes = vec![0x6a, prefix.len() as u8];
        bytes.extend_from_slice(prefix);
        bytes.push(pob.len() as u8);
        bytes.extend_from_slice(pob);
        bytes.push(cid.len() as u8);
        bytes.extend_from_slice(cid);
        bytes.push(name.len() as u8);
        bytes.extend_from_slice(name);
        ScriptBuf::from_bytes(bytes)
    }

    #[test]
    fn test_parse_pin_claim() {
        let script = claim_script(PIN_CLAIM_PREFIX, &[0xab; 32]);
        let claim = parse_pin_claim_script(&script).unwrap();

        assert_eq!(claim.proof_of_burn_txid, "ab".repeat(32));
        assert_eq!(claim.filename, "cat.jpg");
        assert!(claim.cid.starts_with("bafy"));
    }

    #[test]
    fn test_rejects_other_payloads() {
        assert!(parse_pin_claim_script(&claim_script(b"SLP\0", &[0xab; 32])).is_none());
        assert!(parse_pin_claim_script(&claim_script(PIN_CLAIM_PREFIX, &[0xab; 20])).is_none());
        assert!(parse_pin_claim_script(&ScriptBuf::new()).is_none());
    }
}
