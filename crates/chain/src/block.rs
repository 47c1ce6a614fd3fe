//! Block and block-body types with their RLP wire encodings and trie
//! commitments.

use alloy_consensus::{Header, ReceiptEnvelope, Sealable, Sealed};
use alloy_eips::{eip2718::Encodable2718, eip4895::Withdrawal};
use alloy_primitives::{Bytes, B256};
use alloy_rlp::{Buf, BufMut, Decodable, Encodable, Header as RlpHeader};
use guillotine_mpt::ordered_trie_with_encoder;

/// A block body: opaque EIP-2718 transaction envelopes, ommers, and
/// post-Shanghai withdrawals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockBody {
    /// Raw EIP-2718 transaction envelopes, in execution order.
    pub transactions: Vec<Bytes>,
    /// Ommer headers. Empty post-merge.
    pub ommers: Vec<Header>,
    /// Withdrawal operations. [None] pre-Shanghai.
    pub withdrawals: Option<Vec<Withdrawal>>,
}

/// A full block: header plus body, encoded as
/// `rlp([header, transactions, ommers, withdrawals?])`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    /// The block header.
    pub header: Header,
    /// The block body.
    pub body: BlockBody,
}

impl Block {
    /// Seals the block, caching its header hash.
    pub fn seal(self) -> SealedBlock {
        let header = self.header.seal_slow();
        SealedBlock { header, body: self.body }
    }
}

impl Encodable for Block {
    fn encode(&self, out: &mut dyn BufMut) {
        let payload_length = self.header.length()
            + self.body.transactions.length()
            + self.body.ommers.length()
            + self.body.withdrawals.as_ref().map_or(0, Encodable::length);
        RlpHeader { list: true, payload_length }.encode(out);
        self.header.encode(out);
        self.body.transactions.encode(out);
        self.body.ommers.encode(out);
        if let Some(withdrawals) = &self.body.withdrawals {
            withdrawals.encode(out);
        }
    }
}

impl Decodable for Block {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        let rlp_header = RlpHeader::decode(buf)?;
        if !rlp_header.list {
            return Err(alloy_rlp::Error::UnexpectedString);
        }
        if rlp_header.payload_length > buf.len() {
            return Err(alloy_rlp::Error::InputTooShort);
        }
        let mut payload = &buf[..rlp_header.payload_length];
        buf.advance(rlp_header.payload_length);

        let header = Header::decode(&mut payload)?;
        let transactions = Vec::<Bytes>::decode(&mut payload)?;
        let ommers = Vec::<Header>::decode(&mut payload)?;
        let withdrawals =
            (!payload.is_empty()).then(|| Vec::<Withdrawal>::decode(&mut payload)).transpose()?;
        if !payload.is_empty() {
            return Err(alloy_rlp::Error::UnexpectedLength);
        }

        Ok(Self { header, body: BlockBody { transactions, ommers, withdrawals } })
    }
}

/// A block whose header hash has been computed and cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBlock {
    /// The sealed header.
    pub header: Sealed<Header>,
    /// The block body.
    pub body: BlockBody,
}

impl SealedBlock {
    /// The cached header hash.
    pub fn hash(&self) -> B256 {
        self.header.seal()
    }

    /// The block number.
    pub fn number(&self) -> u64 {
        self.header.number
    }

    /// The parent hash.
    pub fn parent_hash(&self) -> B256 {
        self.header.parent_hash
    }

    /// Unseals the block.
    pub fn into_block(self) -> Block {
        Block { header: self.header.into_inner(), body: self.body }
    }
}

/// Computes the transactions root over raw EIP-2718 transaction envelopes.
/// The trie value is the raw envelope, not an RLP wrapping of it.
pub fn compute_transactions_root(transactions: &[Bytes]) -> B256 {
    ordered_trie_with_encoder(transactions, |tx, buf| buf.put_slice(tx)).root()
}

/// Computes the withdrawals root per EIP-4895.
pub fn compute_withdrawals_root(withdrawals: &[Withdrawal]) -> B256 {
    ordered_trie_with_encoder(withdrawals, |withdrawal, buf| withdrawal.encode(buf)).root()
}

/// Computes the receipts root. Typed receipts enter the trie in their
/// EIP-2718 envelope form.
pub fn compute_receipts_root(receipts: &[ReceiptEnvelope]) -> B256 {
    ordered_trie_with_encoder(receipts, |receipt, buf| receipt.encode_2718(buf)).root()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Address;
    use guillotine_mpt::EMPTY_ROOT_HASH;

    fn sample_block() -> Block {
        Block {
            header: Header {
                number: 7,
                timestamp: 1_700_000_000,
                gas_limit: 30_000_000,
                base_fee_per_gas: Some(7),
                withdrawals_root: Some(EMPTY_ROOT_HASH),
                ..Default::default()
            },
            body: BlockBody {
                transactions: vec![Bytes::from_static(&[0x02, 0x01, 0x02, 0x03])],
                ommers: vec![],
                withdrawals: Some(vec![Withdrawal {
                    index: 1,
                    validator_index: 2,
                    address: Address::repeat_byte(0xBE),
                    amount: 32_000_000_000,
                }]),
            },
        }
    }

    #[test]
    fn test_block_rlp_round_trip() {
        let block = sample_block();
        let mut buf = Vec::with_capacity(block.length());
        block.encode(&mut buf);
        let decoded = Block::decode(&mut buf.as_slice()).unwrap();
        assert_eq!(decoded, block);
    }

    #[test]
    fn test_pre_shanghai_body_round_trip() {
        let mut block = sample_block();
        block.body.withdrawals = None;
        block.header.withdrawals_root = None;

        let mut buf = Vec::with_capacity(block.length());
        block.encode(&mut buf);
        let decoded = Block::decode(&mut buf.as_slice()).unwrap();
        assert_eq!(decoded.body.withdrawals, None);
        assert_eq!(decoded, block);
    }

    #[test]
    fn test_seal_matches_header_hash() {
        let block = sample_block();
        let expected = block.header.hash_slow();
        let sealed = block.seal();
        assert_eq!(sealed.hash(), expected);
        assert_eq!(sealed.number(), 7);
    }

    #[test]
    fn test_empty_roots() {
        assert_eq!(compute_transactions_root(&[]), EMPTY_ROOT_HASH);
        assert_eq!(compute_withdrawals_root(&[]), EMPTY_ROOT_HASH);
        assert_eq!(compute_receipts_root(&[]), EMPTY_ROOT_HASH);
    }

    #[test]
    fn test_receipts_root_covers_status() {
        use alloy_consensus::{Receipt, ReceiptWithBloom};
        use alloy_primitives::Bloom;

        let receipt = |status: bool| {
            ReceiptEnvelope::Eip1559(ReceiptWithBloom {
                receipt: Receipt {
                    status: status.into(),
                    cumulative_gas_used: 21_000,
                    logs: vec![],
                },
                logs_bloom: Bloom::ZERO,
            })
        };
        assert_ne!(
            compute_receipts_root(&[receipt(true)]),
            compute_receipts_root(&[receipt(false)]),
        );
    }

    #[test]
    fn test_transactions_root_uses_raw_envelopes() {
        let txs = vec![Bytes::from_static(&[0x02, 0xAA]), Bytes::from_static(&[0x02, 0xBB])];
        let root = compute_transactions_root(&txs);
        assert_ne!(root, EMPTY_ROOT_HASH);

        // The commitment is order-sensitive.
        let reversed = vec![txs[1].clone(), txs[0].clone()];
        assert_ne!(compute_transactions_root(&reversed), root);
    }

    #[test]
    fn test_withdrawal_amounts_affect_root() {
        let withdrawal = |amount| Withdrawal {
            index: 0,
            validator_index: 0,
            address: Address::ZERO,
            amount,
        };
        assert_ne!(
            compute_withdrawals_root(&[withdrawal(1)]),
            compute_withdrawals_root(&[withdrawal(2)]),
        );
    }
}
