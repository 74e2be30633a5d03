//! Parsers for the OP_RETURN payloads the indexer understands: SLP token operations and pin
//! claims.

pub mod constants;
pub mod errors;
pub mod pin_claim;
pub mod slp;

pub use errors::SlpParseError;
pub use pin_claim::{parse_pin_claim_script, PinClaimPayload};
pub use slp::parse_slp_script;
