//! Chain parameters and the post-merge hardfork schedule.

use alloy_eips::eip1559::BaseFeeParams;

/// Chain parameters driving validation: chain id, the time-based hardfork
/// schedule, and the EIP-1559 base-fee adjustment parameters.
///
/// Only post-merge forks are scheduled here; this client never validates
/// proof-of-work headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainSpec {
    /// The chain id.
    pub chain_id: u64,
    /// Shanghai activation timestamp (withdrawals, EIP-4895).
    pub shanghai_time: Option<u64>,
    /// Cancun activation timestamp (blobs, EIP-4844; beacon root, EIP-4788).
    pub cancun_time: Option<u64>,
    /// Prague activation timestamp (EIP-7702 authorizations).
    pub prague_time: Option<u64>,
    /// EIP-1559 base-fee adjustment parameters.
    pub base_fee_params: BaseFeeParams,
}

impl ChainSpec {
    /// The Ethereum mainnet schedule.
    pub const fn mainnet() -> Self {
        Self {
            chain_id: 1,
            shanghai_time: Some(1_681_338_455),
            cancun_time: Some(1_710_338_135),
            prague_time: Some(1_746_612_311),
            base_fee_params: BaseFeeParams::ethereum(),
        }
    }

    /// A schedule with every supported fork active from genesis, for tests
    /// and development networks.
    pub const fn dev() -> Self {
        Self {
            chain_id: 1337,
            shanghai_time: Some(0),
            cancun_time: Some(0),
            prague_time: Some(0),
            base_fee_params: BaseFeeParams::ethereum(),
        }
    }

    /// Returns `true` if Shanghai is active at the given timestamp.
    pub fn is_shanghai_active(&self, timestamp: u64) -> bool {
        self.shanghai_time.is_some_and(|time| timestamp >= time)
    }

    /// Returns `true` if Cancun is active at the given timestamp.
    pub fn is_cancun_active(&self, timestamp: u64) -> bool {
        self.cancun_time.is_some_and(|time| timestamp >= time)
    }

    /// Returns `true` if Prague is active at the given timestamp.
    pub fn is_prague_active(&self, timestamp: u64) -> bool {
        self.prague_time.is_some_and(|time| timestamp >= time)
    }
}

impl Default for ChainSpec {
    fn default() -> Self {
        Self::mainnet()
    }
}
