//! Intrinsic-gas calculation: the gas a transaction consumes before a single
//! EVM opcode runs.

use crate::{PoolError, PoolResult};
use alloy_consensus::TxEnvelope;
use alloy_eips::eip2930::AccessList;
use alloy_primitives::TxKind;

/// Base cost of any transaction.
const TX_GAS: u64 = 21_000;

/// Additional base cost of a contract-creating transaction.
const TX_CREATE_GAS: u64 = 32_000;

/// Cost per zero byte of calldata.
const TX_DATA_ZERO_GAS: u64 = 4;

/// Cost per non-zero byte of calldata.
const TX_DATA_NONZERO_GAS: u64 = 16;

/// Cost per access-list address (EIP-2930).
const ACCESS_LIST_ADDRESS_GAS: u64 = 2_400;

/// Cost per access-list storage key (EIP-2930).
const ACCESS_LIST_STORAGE_KEY_GAS: u64 = 1_900;

/// Cost per 32-byte word of initcode (EIP-3860).
const INITCODE_WORD_GAS: u64 = 2;

/// Cost per authorization tuple (EIP-7702).
const AUTHORIZATION_GAS: u64 = 25_000;

/// Computes the intrinsic gas of a transaction envelope.
pub fn intrinsic_gas(tx: &TxEnvelope) -> PoolResult<u64> {
    match tx {
        TxEnvelope::Legacy(signed) => {
            let tx = signed.tx();
            Ok(parts(tx.to, &tx.input, None, 0))
        }
        TxEnvelope::Eip2930(signed) => {
            let tx = signed.tx();
            Ok(parts(tx.to, &tx.input, Some(&tx.access_list), 0))
        }
        TxEnvelope::Eip1559(signed) => {
            let tx = signed.tx();
            Ok(parts(tx.to, &tx.input, Some(&tx.access_list), 0))
        }
        TxEnvelope::Eip4844(signed) => {
            let tx = signed.tx().tx();
            Ok(parts(TxKind::Call(tx.to), &tx.input, Some(&tx.access_list), 0))
        }
        TxEnvelope::Eip7702(signed) => {
            let tx = signed.tx();
            Ok(parts(
                TxKind::Call(tx.to),
                &tx.input,
                Some(&tx.access_list),
                tx.authorization_list.len() as u64,
            ))
        }
        _ => Err(PoolError::UnsupportedType),
    }
}

fn parts(to: TxKind, input: &[u8], access_list: Option<&AccessList>, authorizations: u64) -> u64 {
    let mut gas = TX_GAS;

    let zero_bytes = input.iter().filter(|byte| **byte == 0).count() as u64;
    let nonzero_bytes = input.len() as u64 - zero_bytes;
    gas += zero_bytes * TX_DATA_ZERO_GAS + nonzero_bytes * TX_DATA_NONZERO_GAS;

    if to.is_create() {
        gas += TX_CREATE_GAS;
        // EIP-3860: initcode is metered per 32-byte word.
        gas += input.len().div_ceil(32) as u64 * INITCODE_WORD_GAS;
    }

    if let Some(access_list) = access_list {
        for item in &access_list.0 {
            gas += ACCESS_LIST_ADDRESS_GAS;
            gas += item.storage_keys.len() as u64 * ACCESS_LIST_STORAGE_KEY_GAS;
        }
    }

    gas + authorizations * AUTHORIZATION_GAS
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, B256};

    #[test]
    fn test_plain_transfer_parts() {
        assert_eq!(parts(TxKind::Call(Address::ZERO), &[], None, 0), 21_000);
    }

    #[test]
    fn test_calldata_pricing() {
        // Two zero bytes, three non-zero bytes.
        let input = [0x00, 0x00, 0x01, 0x02, 0x03];
        assert_eq!(
            parts(TxKind::Call(Address::ZERO), &input, None, 0),
            21_000 + 2 * 4 + 3 * 16
        );
    }

    #[test]
    fn test_create_includes_initcode_words() {
        // 33 bytes of initcode round up to two words.
        let initcode = vec![0x01u8; 33];
        assert_eq!(
            parts(TxKind::Create, &initcode, None, 0),
            21_000 + 32_000 + 33 * 16 + 2 * 2
        );
    }

    #[test]
    fn test_access_list_pricing() {
        let access_list = AccessList(vec![alloy_eips::eip2930::AccessListItem {
            address: Address::ZERO,
            storage_keys: vec![B256::ZERO, B256::repeat_byte(1)],
        }]);
        assert_eq!(
            parts(TxKind::Call(Address::ZERO), &[], Some(&access_list), 0),
            21_000 + 2_400 + 2 * 1_900
        );
    }

    #[test]
    fn test_authorization_pricing() {
        assert_eq!(parts(TxKind::Call(Address::ZERO), &[], None, 2), 21_000 + 50_000);
    }
}
