use std::{fmt, str::FromStr};

use bitcoin::{hashes::Hash, Txid};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Identifier of an SLP token.
///
/// Stored in display order, i.e. the byte order used inside the OP_RETURN payload and in the
/// hex string shown by explorers. For a GENESIS this equals the txid of the genesis transaction.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct TokenId([u8; 32]);

#[derive(Debug, Error)]
pub enum TokenIdParseError {
    #[error("invalid token id hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("token id must be 32 bytes, got {0}")]
    Length(usize),
}

impl TokenId {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// All-zero ids are used as a placeholder for burned or invalid tokens.
    pub fn is_null(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Parses a token id from the raw bytes of a script push.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TokenIdParseError> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| TokenIdParseError::Length(bytes.len()))?;
        Ok(Self(arr))
    }

    /// Txid of the GENESIS transaction that created this token.
    pub fn genesis_txid(&self) -> Txid {
        let mut bytes = self.0;
        bytes.reverse();
        Txid::from_byte_array(bytes)
    }
}

impl From<Txid> for TokenId {
    fn from(txid: Txid) -> Self {
        let mut bytes = txid.to_byte_array();
        bytes.reverse();
        Self(bytes)
    }
}

impl FromStr for TokenId {
    type Err = TokenIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenId({self})")
    }
}

impl Serialize for TokenId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// SLP token type, carried as a number in the OP_RETURN payload.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(from = "u16", into = "u16")]
pub enum TokenType {
    /// Type 1 fungible token.
    Fungible,

    /// Type 65, an NFT minted from a group token.
    NftChild,

    /// Type 129, a group token that mints NFT children.
    NftGroup,

    /// Any other version number; parsed but never indexed.
    Unsupported(u16),
}

impl TokenType {
    pub fn is_supported(&self) -> bool {
        !matches!(self, TokenType::Unsupported(_))
    }
}

impl From<u16> for TokenType {
    fn from(value: u16) -> Self {
        match value {
            1 => TokenType::Fungible,
            65 => TokenType::NftChild,
            129 => TokenType::NftGroup,
            other => TokenType::Unsupported(other),
        }
    }
}

impl From<TokenType> for u16 {
    fn from(value: TokenType) -> Self {
        match value {
            TokenType::Fungible => 1,
            TokenType::NftChild => 65,
            TokenType::NftGroup => 129,
            TokenType::Unsupported(other) => other,
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u16::from(*self))
    }
}

/// Kind of SLP operation a transaction performs.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxType {
    Genesis,
    Mint,
    Send,
    /// A GENESIS of an NFT child (type 65).
    NftGenesis,
    #[default]
    #[serde(other)]
    Unknown,
}

impl TxType {
    /// Both fungible and NFT geneses terminate an ancestry walk.
    pub fn is_genesis(&self) -> bool {
        matches!(self, TxType::Genesis | TxType::NftGenesis)
    }
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TxType::Genesis => "GENESIS",
            TxType::Mint => "MINT",
            TxType::Send => "SEND",
            TxType::NftGenesis => "NFT_GENESIS",
            TxType::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Validation verdict stored alongside a transaction record.
///
/// On the wire this is the `isValidSlp` field: absent while unknown, `true`/`false` once
/// validated and `null` for transactions the indexer deliberately ignores.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub enum SlpValidity {
    #[default]
    Unknown,
    Valid,
    Invalid,
    Ignored,
}

impl SlpValidity {
    pub fn is_unknown(&self) -> bool {
        matches!(self, SlpValidity::Unknown)
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, SlpValidity::Valid)
    }
}

impl From<bool> for SlpValidity {
    fn from(value: bool) -> Self {
        if value {
            SlpValidity::Valid
        } else {
            SlpValidity::Invalid
        }
    }
}

impl Serialize for SlpValidity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SlpValidity::Valid => serializer.serialize_some(&true),
            SlpValidity::Invalid => serializer.serialize_some(&false),
            SlpValidity::Unknown | SlpValidity::Ignored => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for SlpValidity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<bool>::deserialize(deserializer)? {
            Some(v) => SlpValidity::from(v),
            None => SlpValidity::Ignored,
        })
    }
}

/// Metadata only present on GENESIS operations.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenesisInfo {
    pub ticker: String,
    pub name: String,
    pub document_uri: String,
    /// Hex encoded, when the 32 byte hash was supplied.
    pub document_hash: Option<String>,
    pub decimals: u8,
}

/// Decoded SLP OP_RETURN payload.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenOperation {
    pub token_type: TokenType,
    pub tx_type: TxType,
    pub token_id: TokenId,

    /// SEND: one amount per output starting at vout 1. GENESIS/MINT: the single issued amount.
    pub amounts: Vec<u64>,

    pub mint_baton_vout: Option<u32>,
    pub genesis: Option<GenesisInfo>,
}

impl TokenOperation {
    /// Token quantity this operation assigns to output `n`.
    pub fn output_qty(&self, n: u32) -> Option<u64> {
        if n == 0 {
            return None;
        }
        match self.tx_type {
            TxType::Send => self.amounts.get(n as usize - 1).copied(),
            TxType::Genesis | TxType::NftGenesis | TxType::Mint if n == 1 => {
                self.amounts.first().copied()
            }
            _ => None,
        }
    }

    /// Sum of all amounts, saturating.
    pub fn total_qty(&self) -> u64 {
        self.amounts.iter().fold(0u64, |acc, q| acc.saturating_add(*q))
    }

    pub fn is_mint_baton_output(&self, n: u32) -> bool {
        self.mint_baton_vout == Some(n)
    }

    pub fn decimals(&self) -> Option<u8> {
        self.genesis.as_ref().map(|g| g.decimals)
    }
}
