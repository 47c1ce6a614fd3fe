//! Pure, merge-aware header validation.

use crate::{ChainSpec, ValidationError};
use alloy_consensus::{Header, Sealed, EMPTY_OMMER_ROOT_HASH};
use alloy_eips::{eip1559::calc_next_block_base_fee, eip4844};
use alloy_primitives::B64;

/// The minimum gas limit a header may carry.
const MIN_GAS_LIMIT: u64 = 5_000;

/// The divisor bounding per-block gas-limit adjustment.
const GAS_LIMIT_BOUND_DIVISOR: u64 = 1_024;

/// The context a header is validated against: the chain parameters and the
/// sealed parent header.
///
/// Validation is pure — nothing is read from or written to storage. Callers
/// persist the block only after validation succeeds.
#[derive(Debug, Clone, Copy)]
pub struct HeaderValidationContext<'a> {
    /// The chain parameters.
    pub spec: &'a ChainSpec,
    /// The sealed parent header.
    pub parent: &'a Sealed<Header>,
}

impl HeaderValidationContext<'_> {
    /// Validates the header against the parent, returning the first failing
    /// check.
    pub fn validate(&self, header: &Header) -> Result<(), ValidationError> {
        let parent = self.parent;

        if header.parent_hash != parent.seal() || header.number != parent.number + 1 {
            return Err(ValidationError::InvalidParent);
        }
        if header.timestamp <= parent.timestamp {
            return Err(ValidationError::InvalidTimestamp);
        }

        self.validate_gas(header)?;
        self.validate_pos_constants(header)?;
        self.validate_fork_fields(header)?;

        Ok(())
    }

    fn validate_gas(&self, header: &Header) -> Result<(), ValidationError> {
        if header.gas_used > header.gas_limit || header.gas_limit < MIN_GAS_LIMIT {
            return Err(ValidationError::InvalidGasLimit);
        }

        // Adjacent gas limits stay within the ±parent/1024 envelope.
        let bound = self.parent.gas_limit / GAS_LIMIT_BOUND_DIVISOR;
        if header.gas_limit.abs_diff(self.parent.gas_limit) >= bound {
            return Err(ValidationError::InvalidGasLimit);
        }

        let expected_base_fee = calc_next_block_base_fee(
            self.parent.gas_used,
            self.parent.gas_limit,
            self.parent.base_fee_per_gas.unwrap_or_default(),
            self.spec.base_fee_params,
        );
        if header.base_fee_per_gas != Some(expected_base_fee) {
            return Err(ValidationError::InvalidBaseFee);
        }

        Ok(())
    }

    fn validate_pos_constants(&self, header: &Header) -> Result<(), ValidationError> {
        if !header.difficulty.is_zero() {
            return Err(ValidationError::InvalidDifficulty);
        }
        if header.nonce != B64::ZERO {
            return Err(ValidationError::InvalidNonce);
        }
        if header.ommers_hash != EMPTY_OMMER_ROOT_HASH {
            return Err(ValidationError::InvalidOmmersHash);
        }
        Ok(())
    }

    fn validate_fork_fields(&self, header: &Header) -> Result<(), ValidationError> {
        if self.spec.is_shanghai_active(header.timestamp) {
            if header.withdrawals_root.is_none() {
                return Err(ValidationError::InvalidWithdrawalsRoot);
            }
        } else if header.withdrawals_root.is_some() {
            return Err(ValidationError::InvalidWithdrawalsRoot);
        }

        if self.spec.is_cancun_active(header.timestamp) {
            let blob_gas_used =
                header.blob_gas_used.ok_or(ValidationError::InvalidBlobGas)?;
            if blob_gas_used > eip4844::MAX_DATA_GAS_PER_BLOCK
                || blob_gas_used % eip4844::DATA_GAS_PER_BLOB != 0
            {
                return Err(ValidationError::InvalidBlobGas);
            }

            let expected_excess = eip4844::calc_excess_blob_gas(
                self.parent.excess_blob_gas.unwrap_or_default(),
                self.parent.blob_gas_used.unwrap_or_default(),
            );
            if header.excess_blob_gas != Some(expected_excess) {
                return Err(ValidationError::InvalidBlobGas);
            }

            if header.parent_beacon_block_root.is_none() {
                return Err(ValidationError::InvalidBeaconRoot);
            }
        } else if header.blob_gas_used.is_some()
            || header.excess_blob_gas.is_some()
            || header.parent_beacon_block_root.is_some()
        {
            return Err(ValidationError::InvalidBlobGas);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_consensus::Sealable;
    use alloy_primitives::{B256, U256};
    use guillotine_mpt::EMPTY_ROOT_HASH;

    fn parent() -> Sealed<Header> {
        Header {
            number: 100,
            timestamp: 1_750_000_000,
            gas_limit: 30_000_000,
            gas_used: 15_000_000,
            base_fee_per_gas: Some(1_000_000_000),
            withdrawals_root: Some(EMPTY_ROOT_HASH),
            blob_gas_used: Some(0),
            excess_blob_gas: Some(0),
            parent_beacon_block_root: Some(B256::ZERO),
            ..Default::default()
        }
        .seal_slow()
    }

    fn child_of(parent: &Sealed<Header>, spec: &ChainSpec) -> Header {
        Header {
            parent_hash: parent.seal(),
            number: parent.number + 1,
            timestamp: parent.timestamp + 12,
            gas_limit: parent.gas_limit,
            gas_used: 10_000_000,
            base_fee_per_gas: Some(calc_next_block_base_fee(
                parent.gas_used,
                parent.gas_limit,
                parent.base_fee_per_gas.unwrap_or_default(),
                spec.base_fee_params,
            )),
            withdrawals_root: Some(EMPTY_ROOT_HASH),
            blob_gas_used: Some(0),
            excess_blob_gas: Some(0),
            parent_beacon_block_root: Some(B256::ZERO),
            ..Default::default()
        }
    }

    fn ctx<'a>(spec: &'a ChainSpec, parent: &'a Sealed<Header>) -> HeaderValidationContext<'a> {
        HeaderValidationContext { spec, parent }
    }

    #[test]
    fn test_valid_header_passes() {
        let spec = ChainSpec::mainnet();
        let parent = parent();
        let header = child_of(&parent, &spec);
        ctx(&spec, &parent).validate(&header).unwrap();
    }

    #[test]
    fn test_parent_linkage() {
        let spec = ChainSpec::mainnet();
        let parent = parent();
        let mut header = child_of(&parent, &spec);
        header.parent_hash = B256::repeat_byte(0xEE);
        assert_eq!(
            ctx(&spec, &parent).validate(&header),
            Err(ValidationError::InvalidParent)
        );

        let mut header = child_of(&parent, &spec);
        header.number += 1;
        assert_eq!(
            ctx(&spec, &parent).validate(&header),
            Err(ValidationError::InvalidParent)
        );
    }

    #[test]
    fn test_timestamp_must_advance() {
        let spec = ChainSpec::mainnet();
        let parent = parent();
        let mut header = child_of(&parent, &spec);
        header.timestamp = parent.timestamp;
        assert_eq!(
            ctx(&spec, &parent).validate(&header),
            Err(ValidationError::InvalidTimestamp)
        );
    }

    #[test]
    fn test_gas_checks() {
        let spec = ChainSpec::mainnet();
        let parent = parent();

        let mut header = child_of(&parent, &spec);
        header.gas_used = header.gas_limit + 1;
        assert_eq!(
            ctx(&spec, &parent).validate(&header),
            Err(ValidationError::InvalidGasLimit)
        );

        // One past the adjustment envelope.
        let mut header = child_of(&parent, &spec);
        header.gas_limit = parent.gas_limit + parent.gas_limit / 1024;
        assert_eq!(
            ctx(&spec, &parent).validate(&header),
            Err(ValidationError::InvalidGasLimit)
        );

        // Just inside the envelope; the base fee still matches since it is
        // derived from the parent alone.
        let mut header = child_of(&parent, &spec);
        header.gas_limit = parent.gas_limit + parent.gas_limit / 1024 - 1;
        ctx(&spec, &parent).validate(&header).unwrap();
    }

    #[test]
    fn test_base_fee_must_follow_parent() {
        let spec = ChainSpec::mainnet();
        let parent = parent();
        let mut header = child_of(&parent, &spec);
        header.base_fee_per_gas = header.base_fee_per_gas.map(|fee| fee + 1);
        assert_eq!(
            ctx(&spec, &parent).validate(&header),
            Err(ValidationError::InvalidBaseFee)
        );
    }

    #[test]
    fn test_pos_constants() {
        let spec = ChainSpec::mainnet();
        let parent = parent();

        let mut header = child_of(&parent, &spec);
        header.difficulty = U256::from(1);
        assert_eq!(
            ctx(&spec, &parent).validate(&header),
            Err(ValidationError::InvalidDifficulty)
        );

        let mut header = child_of(&parent, &spec);
        header.nonce = B64::with_last_byte(1);
        assert_eq!(
            ctx(&spec, &parent).validate(&header),
            Err(ValidationError::InvalidNonce)
        );

        let mut header = child_of(&parent, &spec);
        header.ommers_hash = B256::repeat_byte(0x11);
        assert_eq!(
            ctx(&spec, &parent).validate(&header),
            Err(ValidationError::InvalidOmmersHash)
        );
    }

    #[test]
    fn test_cancun_fields_mandatory() {
        let spec = ChainSpec::mainnet();
        let parent = parent();

        let mut header = child_of(&parent, &spec);
        header.blob_gas_used = None;
        assert_eq!(
            ctx(&spec, &parent).validate(&header),
            Err(ValidationError::InvalidBlobGas)
        );

        let mut header = child_of(&parent, &spec);
        header.parent_beacon_block_root = None;
        assert_eq!(
            ctx(&spec, &parent).validate(&header),
            Err(ValidationError::InvalidBeaconRoot)
        );

        let mut header = child_of(&parent, &spec);
        header.excess_blob_gas = Some(eip4844::DATA_GAS_PER_BLOB);
        assert_eq!(
            ctx(&spec, &parent).validate(&header),
            Err(ValidationError::InvalidBlobGas)
        );
    }

    #[test]
    fn test_blob_gas_bounds() {
        let spec = ChainSpec::mainnet();
        let parent = parent();

        let mut header = child_of(&parent, &spec);
        header.blob_gas_used = Some(eip4844::MAX_DATA_GAS_PER_BLOCK + eip4844::DATA_GAS_PER_BLOB);
        assert_eq!(
            ctx(&spec, &parent).validate(&header),
            Err(ValidationError::InvalidBlobGas)
        );

        // Not a whole number of blobs.
        let mut header = child_of(&parent, &spec);
        header.blob_gas_used = Some(eip4844::DATA_GAS_PER_BLOB - 1);
        assert_eq!(
            ctx(&spec, &parent).validate(&header),
            Err(ValidationError::InvalidBlobGas)
        );
    }
}
