//! SLP token indexer core: transaction cache, token decoding, ancestry validation, block ordering
//! and block processing.

mod blacklist;
mod cache;
mod claims;
mod dag;
mod decoder;
mod errors;
mod filter;
mod index_blocks;
mod processors;
mod state;
#[cfg(test)]
pub(crate) mod test_utils;

pub use blacklist::Blacklist;
pub use cache::{BoundedCache, TxCache, TxSource};
pub use claims::{ClaimWebhook, HttpWebhook, PinClaimScanner};
pub use dag::{DagResult, DagValidator};
pub use decoder::{TokenDecoder, TokenInfoSource};
pub use errors::{IndexerError, IndexerResult};
pub use filter::{BlockFilter, ForwardDag, ParentLookup, SlpTxSplit, SortedBlock};
pub use index_blocks::{BlockIndexer, BlockIndexerBuilder, IndexPhase, TxOutcome, BLOCK_PROCESSED};
pub use processors::{
    GenesisProcessor, MintProcessor, NftGenesisProcessor, Processors, SendProcessor, TokenTxData,
    TxTypeProcessor,
};
pub use state::{get_status, update_chain_tip, update_indexed_block_height};
