//! Storage interfaces for indexer state.
//!
//! One trait per logical table. Implementations live in `slp-db-store-http` (the production
//! key-value service) and `slp-db-store-memory` (tests).

pub mod errors;
pub mod traits;

pub use errors::{DbError, DbResult};
pub use traits::*;
