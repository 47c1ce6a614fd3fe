//! Block-chain management for the execution client.
//!
//! [Blockchain] owns the local block store and the canonical number-to-hash
//! mapping, layered over a [guillotine_store::Database]. An optional
//! [ForkProvider] serves read-through access to blocks living on a remote
//! chain; deferred fetches surface as [ChainError::RpcPending] and are retried
//! by the caller. Header validation is pure and merge-aware, driven by a
//! [HeaderValidationContext].

mod errors;
pub use errors::{ChainError, ChainResult, ValidationError};

mod block;
pub use block::{
    compute_receipts_root, compute_transactions_root, compute_withdrawals_root, Block, BlockBody,
    SealedBlock,
};

mod spec;
pub use spec::ChainSpec;

mod validation;
pub use validation::HeaderValidationContext;

mod chain;
pub use chain::{Blockchain, ForkProvider, NoopForkProvider, BLOCKHASH_WINDOW};
