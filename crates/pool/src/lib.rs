//! Fee-ordered transaction pool and intrinsic-gas calculation.
//!
//! Admission beyond fee ordering — spam heuristics, peer scoring, pool
//! eviction policy — lives outside this crate.

mod errors;
pub use errors::{PoolError, PoolResult};

mod intrinsic;
pub use intrinsic::intrinsic_gas;

mod pool;
pub use pool::{PooledTransaction, TxPool};
