//! Errors for the `guillotine-chain` crate.

use guillotine_store::StoreError;
use thiserror::Error;

/// A [Result] type alias where the error is [ChainError].
pub type ChainResult<T> = Result<T, ChainError>;

/// An error type for header validation failures. A block failing validation is
/// rejected and reported to the consensus layer as `INVALID` with the first
/// failing reason.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// Post-merge difficulty must be zero.
    #[error("non-zero difficulty in post-merge header")]
    InvalidDifficulty,
    /// Post-merge nonce must be zero.
    #[error("non-zero nonce in post-merge header")]
    InvalidNonce,
    /// Post-merge ommers hash must commit to an empty list.
    #[error("ommers hash does not commit to an empty ommer list")]
    InvalidOmmersHash,
    /// The header does not link to its parent.
    #[error("header does not extend its parent")]
    InvalidParent,
    /// Gas used exceeds the limit, or the limit left the adjustment envelope.
    #[error("invalid gas limit or gas usage")]
    InvalidGasLimit,
    /// The base fee does not follow from the parent per EIP-1559.
    #[error("incorrect EIP-1559 base fee")]
    InvalidBaseFee,
    /// The timestamp does not advance past the parent.
    #[error("timestamp does not advance past the parent")]
    InvalidTimestamp,
    /// Blob-gas fields are missing, unexpected, or inconsistent (EIP-4844).
    #[error("invalid blob gas fields")]
    InvalidBlobGas,
    /// The parent beacon block root is missing or unexpected (EIP-4788).
    #[error("invalid parent beacon block root")]
    InvalidBeaconRoot,
    /// The withdrawals root is missing or unexpected (EIP-4895).
    #[error("invalid withdrawals root")]
    InvalidWithdrawalsRoot,
    /// The header belongs to a fork this client does not support.
    #[error("unsupported fork")]
    UnsupportedFork,
}

/// An error type for block-chain management operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// Header validation failed.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
    /// No canonical head has been set.
    #[error("missing canonical head")]
    MissingCanonicalHead,
    /// The first block of an ancestry walk is unknown locally.
    #[error("block `a` missing from the local store")]
    MissingBlockA,
    /// The second block of an ancestry walk is unknown locally.
    #[error("block `b` missing from the local store")]
    MissingBlockB,
    /// A fork-cache fetch has been scheduled but has not resolved yet. The
    /// caller retries; this is never a failure.
    #[error("remote fetch pending")]
    RpcPending,
    /// The referenced block is not in the local store.
    #[error("unknown block: {0}")]
    UnknownBlock(alloy_primitives::B256),
    /// The underlying store failed.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
    /// A stored block failed to decode.
    #[error("corrupt block encoding: {0}")]
    Corrupt(alloy_rlp::Error),
}

impl From<alloy_rlp::Error> for ChainError {
    fn from(err: alloy_rlp::Error) -> Self {
        Self::Corrupt(err)
    }
}
