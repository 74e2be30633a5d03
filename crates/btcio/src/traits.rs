use async_trait::async_trait;
use bitcoin::{BlockHash, Txid};

use crate::{
    error::ClientResult,
    types::{BlockHeaderInfo, BlockInfo, RawTransaction},
};

/// Read access to the full node.
///
/// Every call may fail transiently; callers wrap them in a retry policy.
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
#[async_trait]
pub trait NodeRpc: Send + Sync {
    /// Hash of the block at `height` on the active chain.
    async fn get_block_hash(&self, height: u64) -> ClientResult<BlockHash>;

    /// Block body with the ordered list of txids.
    async fn get_block(&self, hash: &BlockHash) -> ClientResult<BlockInfo>;

    async fn get_block_header(&self, hash: &BlockHash) -> ClientResult<BlockHeaderInfo>;

    /// Height of the node's chain tip.
    async fn get_block_count(&self) -> ClientResult<u64>;

    /// Verbose transaction lookup. Requires `txindex` on the node.
    async fn get_raw_transaction(&self, txid: &Txid) -> ClientResult<RawTransaction>;
}
