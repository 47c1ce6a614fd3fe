//! The fee-ordered transaction pool.

use crate::{intrinsic_gas, PoolError, PoolResult};
use alloy_consensus::TxEnvelope;
use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::{Address, Bytes, B256};
use std::collections::{BinaryHeap, BTreeMap, HashMap};
use tracing::debug;

/// The minimum tip bump a replacement must offer, in percent.
const REPLACEMENT_BUMP_PERCENT: u128 = 10;

/// A transaction admitted to the pool, reduced to the fields fee ordering
/// needs plus its raw envelope bytes for block building.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PooledTransaction {
    /// The transaction hash.
    pub hash: B256,
    /// The recovered sender.
    pub sender: Address,
    /// The sender nonce.
    pub nonce: u64,
    /// The transaction gas limit.
    pub gas_limit: u64,
    /// The fee cap.
    pub max_fee_per_gas: u128,
    /// The priority-fee cap. [None] for pre-EIP-1559 transactions, whose tip
    /// is bounded by the gas price alone.
    pub max_priority_fee_per_gas: Option<u128>,
    /// Whether the transaction carries blobs (EIP-4844).
    pub is_blob: bool,
    /// The raw EIP-2718 envelope.
    pub encoded: Bytes,
}

impl PooledTransaction {
    /// Builds a pooled transaction from an envelope: recovers the sender and
    /// checks the gas limit against the intrinsic gas.
    pub fn from_envelope(envelope: &TxEnvelope) -> PoolResult<Self> {
        let (sender, nonce, gas_limit, max_fee_per_gas, max_priority_fee_per_gas, is_blob) =
            match envelope {
                TxEnvelope::Legacy(signed) => {
                    let sender =
                        signed.recover_signer().map_err(|_| PoolError::InvalidSignature)?;
                    let tx = signed.tx();
                    (sender, tx.nonce, tx.gas_limit, tx.gas_price, None, false)
                }
                TxEnvelope::Eip2930(signed) => {
                    let sender =
                        signed.recover_signer().map_err(|_| PoolError::InvalidSignature)?;
                    let tx = signed.tx();
                    (sender, tx.nonce, tx.gas_limit, tx.gas_price, None, false)
                }
                TxEnvelope::Eip1559(signed) => {
                    let sender =
                        signed.recover_signer().map_err(|_| PoolError::InvalidSignature)?;
                    let tx = signed.tx();
                    (
                        sender,
                        tx.nonce,
                        tx.gas_limit,
                        tx.max_fee_per_gas,
                        Some(tx.max_priority_fee_per_gas),
                        false,
                    )
                }
                TxEnvelope::Eip4844(signed) => {
                    let sender =
                        signed.recover_signer().map_err(|_| PoolError::InvalidSignature)?;
                    let tx = signed.tx().tx();
                    (
                        sender,
                        tx.nonce,
                        tx.gas_limit,
                        tx.max_fee_per_gas,
                        Some(tx.max_priority_fee_per_gas),
                        true,
                    )
                }
                TxEnvelope::Eip7702(signed) => {
                    let sender =
                        signed.recover_signer().map_err(|_| PoolError::InvalidSignature)?;
                    let tx = signed.tx();
                    (
                        sender,
                        tx.nonce,
                        tx.gas_limit,
                        tx.max_fee_per_gas,
                        Some(tx.max_priority_fee_per_gas),
                        false,
                    )
                }
                _ => return Err(PoolError::UnsupportedType),
            };

        if intrinsic_gas(envelope)? > gas_limit {
            return Err(PoolError::IntrinsicGasTooHigh);
        }

        Ok(Self {
            hash: *envelope.tx_hash(),
            sender,
            nonce,
            gas_limit,
            max_fee_per_gas,
            max_priority_fee_per_gas,
            is_blob,
            encoded: envelope.encoded_2718().into(),
        })
    }

    /// The tip per gas this transaction pays a block at the given base fee.
    /// [None] when the fee cap does not reach the base fee.
    pub fn effective_tip(&self, base_fee: u64) -> Option<u128> {
        let headroom = self.max_fee_per_gas.checked_sub(u128::from(base_fee))?;
        Some(self.max_priority_fee_per_gas.map_or(headroom, |cap| cap.min(headroom)))
    }
}

/// A fee-ordered transaction pool: admission by fee, ordering by effective
/// tip at the current base fee, per-sender nonce runs kept contiguous.
#[derive(Debug, Default)]
pub struct TxPool {
    base_fee: u64,
    by_sender: HashMap<Address, BTreeMap<u64, PooledTransaction>>,
}

impl TxPool {
    /// Creates an empty pool priced at the given base fee.
    pub fn new(base_fee: u64) -> Self {
        Self { base_fee, by_sender: HashMap::new() }
    }

    /// The base fee the pool currently prices against.
    pub const fn base_fee(&self) -> u64 {
        self.base_fee
    }

    /// Re-prices the pool against a new base fee. Underpriced transactions
    /// stay pooled; they simply stop being selected.
    pub fn set_base_fee(&mut self, base_fee: u64) {
        self.base_fee = base_fee;
    }

    /// The number of pooled transactions.
    pub fn len(&self) -> usize {
        self.by_sender.values().map(BTreeMap::len).sum()
    }

    /// Returns `true` if the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.by_sender.is_empty()
    }

    /// Admits a transaction. A transaction replacing the same `(sender,
    /// nonce)` slot must bump the effective tip by at least 10%.
    pub fn add(&mut self, tx: PooledTransaction) -> PoolResult<()> {
        let Some(tip) = tx.effective_tip(self.base_fee) else {
            return Err(PoolError::FeeTooLow);
        };

        let slots = self.by_sender.entry(tx.sender).or_default();
        if let Some(existing) = slots.get(&tx.nonce) {
            let existing_tip = existing.effective_tip(self.base_fee).unwrap_or_default();
            let required = existing_tip + existing_tip / REPLACEMENT_BUMP_PERCENT;
            if tip <= required {
                return Err(PoolError::ReplacementUnderpriced);
            }
            debug!(target: "pool", sender = %tx.sender, nonce = tx.nonce, "Replacing transaction");
        }
        slots.insert(tx.nonce, tx);
        Ok(())
    }

    /// Removes a transaction, e.g. once it is included in a block.
    pub fn remove(&mut self, sender: Address, nonce: u64) -> Option<PooledTransaction> {
        let slots = self.by_sender.get_mut(&sender)?;
        let removed = slots.remove(&nonce);
        if slots.is_empty() {
            self.by_sender.remove(&sender);
        }
        removed
    }

    /// The pooled blob transactions (EIP-4844), for sidecar persistence.
    pub fn blob_transactions(&self) -> impl Iterator<Item = &PooledTransaction> {
        self.by_sender.values().flat_map(BTreeMap::values).filter(|tx| tx.is_blob)
    }

    /// The executable transactions in selection order: highest effective tip
    /// first, with each sender's transactions kept in nonce order and cut at
    /// the first nonce gap. Underpriced transactions are skipped.
    pub fn best_transactions(&self) -> Vec<&PooledTransaction> {
        let mut heap = BinaryHeap::new();
        for slots in self.by_sender.values() {
            if let Some((_, tx)) = slots.iter().next() {
                if let Some(tip) = tx.effective_tip(self.base_fee) {
                    heap.push(Candidate { tip, tx });
                }
            }
        }

        let mut ordered = Vec::with_capacity(self.len());
        while let Some(Candidate { tx, .. }) = heap.pop() {
            ordered.push(tx);
            let slots = &self.by_sender[&tx.sender];
            if let Some(next) = slots.get(&(tx.nonce + 1)) {
                if let Some(tip) = next.effective_tip(self.base_fee) {
                    heap.push(Candidate { tip, tx: next });
                }
            }
        }
        ordered
    }
}

/// A heap entry ordered by effective tip, with the hash as a deterministic
/// tie-break.
struct Candidate<'a> {
    tip: u128,
    tx: &'a PooledTransaction,
}

impl PartialEq for Candidate<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.tip == other.tip && self.tx.hash == other.tx.hash
    }
}

impl Eq for Candidate<'_> {}

impl PartialOrd for Candidate<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate<'_> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.tip.cmp(&other.tip).then_with(|| self.tx.hash.cmp(&other.tx.hash))
    }
}
