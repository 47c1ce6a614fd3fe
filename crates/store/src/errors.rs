//! Errors for the `guillotine-store` crate.

use thiserror::Error;

/// A [Result] type alias where the error is [StoreError].
pub type StoreResult<T> = Result<T, StoreError>;

/// An error type for key-value store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store failed.
    #[error("storage backend failure: {0}")]
    Backend(String),
    /// A key that was explicitly required is absent.
    #[error("key not found")]
    KeyNotFound,
    /// The operation is not supported by this backend.
    #[error("operation not supported by backend `{0}`")]
    Unsupported(&'static str),
}
