/// Lokad id that prefixes every SLP payload.
pub const SLP_LOKAD_ID: &[u8; 4] = b"SLP\0";

/// Prefix of a pin claim payload.
pub const PIN_CLAIM_PREFIX: &[u8; 4] = &[0x00, 0x51, 0x00, 0x00];

pub const MAX_DECIMALS: u8 = 9;

/// SEND may assign at most this many outputs.
pub const MAX_SEND_OUTPUTS: usize = 19;

/// Lowest output index a mint baton may be assigned to.
pub const MIN_BATON_VOUT: u8 = 2;
