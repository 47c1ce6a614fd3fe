//! Errors for the `guillotine-mpt` crate.

use alloc::string::String;

/// A [Result] type alias where the error is [TrieError].
pub type TrieResult<T> = Result<T, TrieError>;

/// An error type for [TrieNode] operations.
///
/// [TrieNode]: crate::TrieNode
#[derive(Debug, derive_more::Display, Clone, PartialEq, Eq)]
pub enum TrieError {
    /// A node encoding was structurally malformed.
    #[display("Invalid trie node: {_0}")]
    InvalidNode(alloy_rlp::Error),
    /// A path nibble was outside of the `[0x0, 0xF]` range.
    #[display("Invalid nibble encountered")]
    InvalidNibble,
    /// A blinded node could not be resolved by the provider.
    #[display("Trie provider error: {_0}")]
    Provider(String),
    /// A path prefix carried an unknown hex-prefix flag.
    #[display("Unexpected hex-prefix flag in path encoding")]
    InvalidPathFlag,
}

impl From<alloy_rlp::Error> for TrieError {
    fn from(err: alloy_rlp::Error) -> Self {
        Self::InvalidNode(err)
    }
}

impl core::error::Error for TrieError {}
