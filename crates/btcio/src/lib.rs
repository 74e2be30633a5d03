//! Access to the full node that backs the indexer.
//!
//! [`NodeRpc`] is the capability the indexer depends on; [`RpcClient`] implements it over the
//! node's JSON-RPC interface.

pub mod client;
pub mod error;
pub mod traits;
pub mod types;

pub use client::RpcClient;
pub use error::{ClientError, ClientResult};
#[cfg(any(test, feature = "test-utils"))]
pub use traits::MockNodeRpc;
pub use traits::NodeRpc;
pub use types::{BlockHeaderInfo, BlockInfo, RawInput, RawOutput, RawScriptPubKey, RawTransaction};
