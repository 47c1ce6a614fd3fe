//! Errors for the `guillotine-pool` crate.

use thiserror::Error;

/// A [Result] type alias where the error is [PoolError].
pub type PoolResult<T> = Result<T, PoolError>;

/// An error type for transaction-pool admission.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// The signature does not recover to a sender.
    #[error("invalid transaction signature")]
    InvalidSignature,
    /// The gas limit cannot cover the intrinsic gas.
    #[error("gas limit below intrinsic gas")]
    IntrinsicGasTooHigh,
    /// The max fee does not reach the current base fee.
    #[error("max fee per gas below base fee")]
    FeeTooLow,
    /// A replacement did not raise the tip by the required 10%.
    #[error("replacement transaction underpriced")]
    ReplacementUnderpriced,
    /// The transaction type is not supported by this pool.
    #[error("unsupported transaction type")]
    UnsupportedType,
}
