//! Per-type ledger updates applied once a token transaction has passed validation.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use slp_db_types::SlpDatabase;
use slp_primitives::{SlpValidity, TokenOperation, TransactionRecord, TxType};

use crate::errors::IndexerResult;

mod genesis;
mod ledger;
mod mint;
mod nft_genesis;
mod send;

pub use genesis::GenesisProcessor;
pub(crate) use ledger::Ledger;
pub use mint::MintProcessor;
pub use nft_genesis::NftGenesisProcessor;
pub use send::SendProcessor;

/// Input handed to a [`TxTypeProcessor`].
#[derive(Clone, Debug)]
pub struct TokenTxData {
    pub op: TokenOperation,
    pub block_height: u64,
    pub record: TransactionRecord,
}

/// Applies one kind of token operation to the ledger.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TxTypeProcessor: Send + Sync {
    /// Returns the processor's verdict. [`SlpValidity::Unknown`] means no opinion.
    async fn process_tx(&self, data: &TokenTxData) -> IndexerResult<SlpValidity>;
}

/// One processor per token operation kind.
#[derive(Clone)]
pub struct Processors {
    genesis: Arc<dyn TxTypeProcessor>,
    mint: Arc<dyn TxTypeProcessor>,
    send: Arc<dyn TxTypeProcessor>,
    nft_genesis: Arc<dyn TxTypeProcessor>,
}

impl fmt::Debug for Processors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Processors").finish_non_exhaustive()
    }
}

impl Processors {
    pub fn new(
        genesis: Arc<dyn TxTypeProcessor>,
        mint: Arc<dyn TxTypeProcessor>,
        send: Arc<dyn TxTypeProcessor>,
        nft_genesis: Arc<dyn TxTypeProcessor>,
    ) -> Self {
        Self {
            genesis,
            mint,
            send,
            nft_genesis,
        }
    }

    /// Processors writing to `db`.
    pub fn store_backed<D: SlpDatabase + 'static>(db: Arc<D>) -> Self {
        Self::new(
            Arc::new(GenesisProcessor::new(db.clone())),
            Arc::new(MintProcessor::new(db.clone())),
            Arc::new(SendProcessor::new(db.clone())),
            Arc::new(NftGenesisProcessor::new(db)),
        )
    }

    pub fn for_tx_type(&self, tx_type: TxType) -> Option<&Arc<dyn TxTypeProcessor>> {
        match tx_type {
            TxType::Genesis => Some(&self.genesis),
            TxType::Mint => Some(&self.mint),
            TxType::Send => Some(&self.send),
            TxType::NftGenesis => Some(&self.nft_genesis),
            TxType::Unknown => None,
        }
    }
}
