//! Ambient pieces shared by the indexer crates: logging setup and retry policy.

pub mod logging;
pub mod retry;

pub use retry::{retry_async, retry_async_when, RetryPolicy};
