//! This module contains the [Account] record as represented in the state trie.

use alloy_primitives::{b256, B256, U256};
use alloy_rlp::{RlpDecodable, RlpEncodable};
use guillotine_mpt::EMPTY_ROOT_HASH;

/// Keccak-256 hash of the empty byte string.
pub const KECCAK_EMPTY: B256 =
    b256!("c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470");

/// An Ethereum account as represented in the trie.
#[derive(Clone, Copy, Debug, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct Account {
    /// Account nonce.
    pub nonce: u64,
    /// Account balance.
    pub balance: U256,
    /// Account's storage root.
    pub storage_root: B256,
    /// Hash of the account's bytecode.
    pub code_hash: B256,
}

impl Default for Account {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Account {
    /// The sentinel account returned for non-existent addresses. Never stored
    /// in the trie: missing and empty are indistinguishable on the read side,
    /// and storing the sentinel would break state-root determinism.
    pub const EMPTY: Self = Self {
        nonce: 0,
        balance: U256::ZERO,
        storage_root: EMPTY_ROOT_HASH,
        code_hash: KECCAK_EMPTY,
    };

    /// Returns `true` iff the account is empty per EIP-161: zero nonce, zero
    /// balance, and no code.
    pub fn is_empty(&self) -> bool {
        self.nonce == 0 && self.balance.is_zero() && self.code_hash == KECCAK_EMPTY
    }

    /// Returns `true` if the account carries contract code.
    pub fn has_code(&self) -> bool {
        self.code_hash != KECCAK_EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::keccak256;
    use alloy_rlp::{Decodable, Encodable};

    #[test]
    fn test_keccak_empty_constant() {
        assert_eq!(keccak256([]), KECCAK_EMPTY);
    }

    #[test]
    fn test_emptiness() {
        assert!(Account::EMPTY.is_empty());

        let mut account = Account::EMPTY;
        account.nonce = 1;
        assert!(!account.is_empty());

        let mut account = Account::EMPTY;
        account.balance = U256::from(1);
        assert!(!account.is_empty());

        let mut account = Account::EMPTY;
        account.code_hash = keccak256(b"code");
        assert!(!account.is_empty());
        assert!(account.has_code());

        // A non-empty storage root alone does not make an account non-empty.
        let mut account = Account::EMPTY;
        account.storage_root = keccak256(b"root");
        assert!(account.is_empty());
    }

    #[test]
    fn test_rlp_round_trip() {
        let account = Account {
            nonce: 7,
            balance: U256::from(1_000_000_000u64),
            storage_root: keccak256(b"storage"),
            code_hash: keccak256(b"code"),
        };

        let mut buf = Vec::with_capacity(account.length());
        account.encode(&mut buf);
        let decoded = Account::decode(&mut buf.as_slice()).unwrap();
        assert_eq!(decoded, account);
    }
}
