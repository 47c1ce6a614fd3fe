//! This module contains the [Blockchain] manager: the local block store, the
//! canonical mapping, and the reorg helpers layered above it.

use crate::{Block, BlockBody, ChainError, ChainResult, SealedBlock};
use alloy_consensus::{Header, ReceiptEnvelope, Sealable};
use alloy_eips::eip2718::{Decodable2718, Encodable2718};
use alloy_primitives::{Bytes, B256};
use alloy_rlp::{Decodable, Encodable};
use guillotine_store::{Column, Database};
use std::{
    collections::BTreeMap,
    sync::{Mutex, PoisonError},
};
use tracing::{debug, info};

/// The EVM BLOCKHASH lookback window.
pub const BLOCKHASH_WINDOW: usize = 256;

/// Metadata key for the persisted canonical head number.
const HEAD_NUMBER_KEY: &[u8] = b"head_number";

/// A read-through source for blocks that live on a remote chain.
///
/// A provider operating in deferred mode schedules the fetch and returns
/// [ChainError::RpcPending]; the caller retries once the result has been
/// cached. Providers never block the calling task on network I/O.
pub trait ForkProvider {
    /// Fetches a block by hash from the remote source.
    fn block_by_hash(&mut self, hash: B256) -> ChainResult<Option<Block>>;
}

/// A [ForkProvider] with no remote source behind it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopForkProvider;

impl ForkProvider for NoopForkProvider {
    fn block_by_hash(&mut self, _hash: B256) -> ChainResult<Option<Block>> {
        Ok(None)
    }
}

/// The canonical chain view: the number-to-hash mapping and the head
/// watermarks. Guarded by a single mutex; readers take a point-in-time copy
/// of whatever they need under the lock.
#[derive(Debug, Default)]
struct CanonicalState {
    mapping: BTreeMap<u64, B256>,
    head_number: Option<u64>,
    safe: Option<B256>,
    finalized: Option<B256>,
}

/// The block-chain manager.
///
/// Owns the local block store (headers, bodies, and receipts columns keyed by
/// hash) and the canonical mapping. The manager only rewrites the canonical
/// mapping during a reorg — unwinding state is the journal's job, driven by
/// the reorg-depth helpers exposed here.
#[derive(Debug)]
pub struct Blockchain<F = NoopForkProvider> {
    db: Database,
    fork_cache: Option<F>,
    canonical: Mutex<CanonicalState>,
}

impl Blockchain<NoopForkProvider> {
    /// Creates a manager over the given database with no fork cache.
    pub fn new(db: Database) -> Self {
        Self { db, fork_cache: None, canonical: Mutex::new(CanonicalState::default()) }
    }
}

impl<F: ForkProvider> Blockchain<F> {
    /// Creates a manager with a read-through fork cache.
    pub fn with_fork_cache(db: Database, fork_cache: F) -> Self {
        Self { db, fork_cache: Some(fork_cache), canonical: Mutex::new(CanonicalState::default()) }
    }

    /// Returns a shared reference to the underlying database.
    pub const fn db(&self) -> &Database {
        &self.db
    }

    // ---------------------------------------------------------------------
    // Local block store
    // ---------------------------------------------------------------------

    /// Inserts the block into the local store. The canonical mapping is not
    /// touched; promotion happens through [Self::set_canonical_head].
    pub fn put_block(&mut self, block: &SealedBlock) -> ChainResult<()> {
        let hash = block.hash();

        let mut header_buf = Vec::with_capacity(block.header.length());
        block.header.encode(&mut header_buf);
        self.db.column_mut(Column::Headers).put(hash.as_slice(), &header_buf)?;

        let body = body_to_rlp(&block.body);
        self.db.column_mut(Column::Bodies).put(hash.as_slice(), &body)?;

        debug!(target: "chain", number = block.number(), %hash, "Stored block");
        Ok(())
    }

    /// Stores the receipts of a block, keyed by the block hash.
    pub fn put_receipts(&mut self, hash: B256, receipts: &[ReceiptEnvelope]) -> ChainResult<()> {
        let encoded = receipts
            .iter()
            .map(|receipt| {
                let mut buf = Vec::with_capacity(receipt.encode_2718_len());
                receipt.encode_2718(&mut buf);
                Bytes::from(buf)
            })
            .collect::<Vec<_>>();
        let mut rlp_buf = Vec::with_capacity(encoded.length());
        encoded.encode(&mut rlp_buf);
        self.db.column_mut(Column::Receipts).put(hash.as_slice(), &rlp_buf)?;
        Ok(())
    }

    /// Fetches the receipts of a block from the local store.
    pub fn get_receipts(&self, hash: B256) -> ChainResult<Option<Vec<ReceiptEnvelope>>> {
        let Some(rlp_buf) = self.db.column(Column::Receipts).get(hash.as_slice())? else {
            return Ok(None);
        };
        let encoded = Vec::<Bytes>::decode(&mut rlp_buf.as_slice())?;
        encoded
            .iter()
            .map(|buf| {
                ReceiptEnvelope::decode_2718(&mut buf.as_ref())
                    .map_err(|_| ChainError::Corrupt(alloy_rlp::Error::Custom("receipt envelope")))
            })
            .collect::<ChainResult<Vec<_>>>()
            .map(Some)
    }

    /// Fetches a block from the local store only.
    pub fn get_block_local(&self, hash: B256) -> ChainResult<Option<SealedBlock>> {
        let Some(header_buf) = self.db.column(Column::Headers).get(hash.as_slice())? else {
            return Ok(None);
        };
        let header = Header::decode(&mut header_buf.as_slice())?;

        let body = match self.db.column(Column::Bodies).get(hash.as_slice())? {
            Some(body_buf) => body_from_rlp(&body_buf)?,
            None => BlockBody::default(),
        };

        Ok(Some(SealedBlock { header: header.seal_slow(), body }))
    }

    /// Fetches a block by hash: local store first, then the fork cache if one
    /// is configured. A fork-cache hit is written through to the local store.
    pub fn get_block_by_hash(&mut self, hash: B256) -> ChainResult<Option<SealedBlock>> {
        if let Some(block) = self.get_block_local(hash)? {
            return Ok(Some(block));
        }

        let Some(fork_cache) = self.fork_cache.as_mut() else {
            return Ok(None);
        };
        match fork_cache.block_by_hash(hash)? {
            Some(block) => {
                let sealed = block.seal();
                self.put_block(&sealed)?;
                Ok(Some(sealed))
            }
            None => Ok(None),
        }
    }

    /// Fetches a block by number through the canonical mapping.
    pub fn get_block_by_number(&mut self, number: u64) -> ChainResult<Option<SealedBlock>> {
        let hash = self.lock_canonical().mapping.get(&number).copied();
        match hash {
            Some(hash) => self.get_block_by_hash(hash),
            None => Ok(None),
        }
    }

    // ---------------------------------------------------------------------
    // Canonical mapping
    // ---------------------------------------------------------------------

    /// Promotes the block to canonical head: stores its hash under its number
    /// — overwriting any previous entry there, which is how a reorg lands —
    /// and advances the head watermark.
    pub fn set_canonical_head(&mut self, hash: B256) -> ChainResult<()> {
        let block = self.get_block_local(hash)?.ok_or(ChainError::UnknownBlock(hash))?;
        let number = block.number();

        {
            let mut canonical = self.lock_canonical();
            canonical.mapping.insert(number, hash);
            canonical.head_number = Some(number);
        }

        self.db
            .column_mut(Column::Canonical)
            .put(&number.to_be_bytes(), hash.as_slice())?;
        self.db
            .column_mut(Column::Metadata)
            .put(HEAD_NUMBER_KEY, &number.to_be_bytes())?;

        info!(target: "chain", number, %hash, "New canonical head");
        Ok(())
    }

    /// Sets the safe watermark.
    pub fn set_safe(&mut self, hash: B256) {
        self.lock_canonical().safe = Some(hash);
    }

    /// Sets the finalized watermark.
    pub fn set_finalized(&mut self, hash: B256) {
        self.lock_canonical().finalized = Some(hash);
    }

    /// The current head block number, if a head has been set.
    pub fn head_number(&self) -> Option<u64> {
        self.lock_canonical().head_number
    }

    /// The safe watermark.
    pub fn safe(&self) -> Option<B256> {
        self.lock_canonical().safe
    }

    /// The finalized watermark.
    pub fn finalized(&self) -> Option<B256> {
        self.lock_canonical().finalized
    }

    /// The hash of the current canonical head.
    pub fn head_hash(&self) -> ChainResult<B256> {
        let canonical = self.lock_canonical();
        let number = canonical.head_number.ok_or(ChainError::MissingCanonicalHead)?;
        canonical.mapping.get(&number).copied().ok_or(ChainError::MissingCanonicalHead)
    }

    /// The current canonical head block.
    pub fn head(&self) -> ChainResult<SealedBlock> {
        let hash = self.head_hash()?;
        self.get_block_local(hash)?.ok_or(ChainError::MissingCanonicalHead)
    }

    /// The canonical hash at the given number, if any.
    pub fn canonical_hash(&self, number: u64) -> Option<B256> {
        self.lock_canonical().mapping.get(&number).copied()
    }

    /// Returns `true` iff the block is known locally and is the canonical
    /// entry at its number.
    pub fn is_canonical(&self, hash: B256) -> ChainResult<bool> {
        let Some(block) = self.get_block_local(hash)? else {
            return Ok(false);
        };
        Ok(self.canonical_hash(block.number()) == Some(hash))
    }

    // ---------------------------------------------------------------------
    // Reorg helpers
    // ---------------------------------------------------------------------

    /// Walks both ancestries locally and returns the lowest common ancestor
    /// hash.
    pub fn common_ancestor_hash_local(&self, a: B256, b: B256) -> ChainResult<B256> {
        let mut a = self.local_link(a).ok_or(ChainError::MissingBlockA)?;
        let mut b = self.local_link(b).ok_or(ChainError::MissingBlockB)?;

        while a.hash != b.hash {
            // Step the higher branch down; step both when level.
            if a.number > b.number {
                a = self.local_link(a.parent).ok_or(ChainError::MissingBlockA)?;
            } else if b.number > a.number {
                b = self.local_link(b.parent).ok_or(ChainError::MissingBlockB)?;
            } else {
                a = self.local_link(a.parent).ok_or(ChainError::MissingBlockA)?;
                b = self.local_link(b.parent).ok_or(ChainError::MissingBlockB)?;
            }
        }
        Ok(a.hash)
    }

    /// The distance from the canonical head to its common ancestor with
    /// `candidate`. Zero means the candidate extends the canonical chain.
    pub fn canonical_reorg_depth_local(&self, candidate: B256) -> ChainResult<u64> {
        let head = self.head_hash()?;
        let ancestor = self.common_ancestor_hash_local(head, candidate)?;
        let head_number = self.local_link(head).ok_or(ChainError::MissingCanonicalHead)?.number;
        let ancestor_number = self.local_link(ancestor).ok_or(ChainError::MissingBlockA)?.number;
        Ok(head_number - ancestor_number)
    }

    /// The distance from `candidate` to its common ancestor with the
    /// canonical head. Together with [Self::canonical_reorg_depth_local] this
    /// sizes a reorg.
    pub fn candidate_reorg_depth_local(&self, candidate: B256) -> ChainResult<u64> {
        let head = self.head_hash()?;
        let ancestor = self.common_ancestor_hash_local(head, candidate)?;
        let candidate_number =
            self.local_link(candidate).ok_or(ChainError::MissingBlockB)?.number;
        let ancestor_number = self.local_link(ancestor).ok_or(ChainError::MissingBlockA)?.number;
        Ok(candidate_number - ancestor_number)
    }

    /// Returns `true` if promoting `candidate` would unwind at least one
    /// canonical block.
    pub fn has_canonical_divergence_local(&self, candidate: B256) -> ChainResult<bool> {
        Ok(self.canonical_reorg_depth_local(candidate)? > 0)
    }

    /// Up to `max` most-recent block hashes on the branch ending at
    /// `from_hash`, newest first, per EVM BLOCKHASH semantics. The window
    /// never exceeds [BLOCKHASH_WINDOW].
    pub fn last_256_block_hashes_local(
        &self,
        from_hash: B256,
        max: usize,
    ) -> ChainResult<Vec<B256>> {
        let mut hashes = Vec::with_capacity(max.min(BLOCKHASH_WINDOW));
        let mut link = self.local_link(from_hash).ok_or(ChainError::MissingBlockA)?;

        loop {
            if hashes.len() >= max.min(BLOCKHASH_WINDOW) {
                break;
            }
            hashes.push(link.hash);
            if link.number == 0 {
                break;
            }
            match self.local_link(link.parent) {
                Some(parent) => link = parent,
                None => break,
            }
        }
        Ok(hashes)
    }

    /// Reads the chain link (hash, number, parent) of a locally stored block.
    fn local_link(&self, hash: B256) -> Option<ChainLink> {
        let header_buf = self.db.column(Column::Headers).get(hash.as_slice()).ok().flatten()?;
        let header = Header::decode(&mut header_buf.as_slice()).ok()?;
        Some(ChainLink { hash, number: header.number, parent: header.parent_hash })
    }

    fn lock_canonical(&self) -> std::sync::MutexGuard<'_, CanonicalState> {
        self.canonical.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The ancestry-relevant fields of a stored header.
#[derive(Debug, Clone, Copy)]
struct ChainLink {
    hash: B256,
    number: u64,
    parent: B256,
}

/// Encodes a [BlockBody] as `rlp([transactions, ommers, withdrawals?])`.
fn body_to_rlp(body: &BlockBody) -> Vec<u8> {
    let payload_length = body.transactions.length()
        + body.ommers.length()
        + body.withdrawals.as_ref().map_or(0, Encodable::length);
    let mut out = Vec::with_capacity(payload_length + 3);
    alloy_rlp::Header { list: true, payload_length }.encode(&mut out);
    body.transactions.encode(&mut out);
    body.ommers.encode(&mut out);
    if let Some(withdrawals) = &body.withdrawals {
        withdrawals.encode(&mut out);
    }
    out
}

/// Decodes a [BlockBody] from its RLP encoding.
fn body_from_rlp(mut buf: &[u8]) -> ChainResult<BlockBody> {
    let rlp_header = alloy_rlp::Header::decode(&mut buf)?;
    if !rlp_header.list {
        return Err(alloy_rlp::Error::UnexpectedString.into());
    }
    let transactions = Vec::<Bytes>::decode(&mut buf)?;
    let ommers = Vec::<Header>::decode(&mut buf)?;
    let withdrawals = (!buf.is_empty())
        .then(|| Vec::<alloy_eips::eip4895::Withdrawal>::decode(&mut buf))
        .transpose()?;
    Ok(BlockBody { transactions, ommers, withdrawals })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Bloom;

    /// Builds a child block of `parent` with an optional distinguishing seed.
    fn child(parent: &SealedBlock, seed: u8) -> SealedBlock {
        Block {
            header: Header {
                parent_hash: parent.hash(),
                number: parent.number() + 1,
                timestamp: parent.header.timestamp + 12,
                extra_data: Bytes::copy_from_slice(&[seed]),
                ..Default::default()
            },
            body: BlockBody::default(),
        }
        .seal()
    }

    fn genesis() -> SealedBlock {
        Block {
            header: Header { number: 0, timestamp: 0, ..Default::default() },
            body: BlockBody::default(),
        }
        .seal()
    }

    /// Builds a linear chain of `len` blocks on top of `base`, returning all
    /// sealed blocks including `base`.
    fn extend(chain: &mut Blockchain, base: SealedBlock, len: usize, seed: u8) -> Vec<SealedBlock> {
        let mut blocks = vec![base];
        for _ in 0..len {
            let next = child(blocks.last().expect("non-empty"), seed);
            chain.put_block(&next).unwrap();
            blocks.push(next);
        }
        blocks
    }

    fn setup() -> (Blockchain, Vec<SealedBlock>) {
        let mut chain = Blockchain::new(Database::new_in_memory());
        let genesis = genesis();
        chain.put_block(&genesis).unwrap();
        let blocks = extend(&mut chain, genesis, 5, 0);
        for block in &blocks {
            chain.set_canonical_head(block.hash()).unwrap();
        }
        (chain, blocks)
    }

    #[test]
    fn test_put_then_get_round_trip() {
        let mut chain = Blockchain::new(Database::new_in_memory());
        let block = genesis();
        chain.put_block(&block).unwrap();

        let loaded = chain.get_block_local(block.hash()).unwrap().expect("stored");
        assert_eq!(loaded, block);
        assert_eq!(chain.get_block_local(B256::repeat_byte(1)).unwrap(), None);
    }

    #[test]
    fn test_put_block_does_not_touch_canonical() {
        let mut chain = Blockchain::new(Database::new_in_memory());
        chain.put_block(&genesis()).unwrap();
        assert_eq!(chain.head_number(), None);
        assert!(matches!(chain.head_hash(), Err(ChainError::MissingCanonicalHead)));
    }

    #[test]
    fn test_set_canonical_head_is_idempotent() {
        let (mut chain, blocks) = setup();
        let tip = blocks.last().expect("non-empty");

        let head_before = chain.head_number();
        chain.set_canonical_head(tip.hash()).unwrap();
        chain.set_canonical_head(tip.hash()).unwrap();

        assert_eq!(chain.head_number(), head_before);
        assert_eq!(chain.canonical_hash(tip.number()), Some(tip.hash()));
    }

    #[test]
    fn test_set_canonical_head_requires_local_block() {
        let (mut chain, _) = setup();
        let missing = B256::repeat_byte(0xEE);
        assert!(matches!(
            chain.set_canonical_head(missing),
            Err(ChainError::UnknownBlock(hash)) if hash == missing
        ));
    }

    #[test]
    fn test_canonical_lookup_by_number() {
        let (mut chain, blocks) = setup();
        let block = chain.get_block_by_number(3).unwrap().expect("canonical");
        assert_eq!(block.hash(), blocks[3].hash());
        assert_eq!(chain.get_block_by_number(99).unwrap(), None);
    }

    #[test]
    fn test_is_canonical_tracks_reorg() {
        let (mut chain, blocks) = setup();
        for block in &blocks {
            assert!(chain.is_canonical(block.hash()).unwrap());
        }

        // A competing block at height 5 displaces the old tip.
        let rival = child(&blocks[4], 0xFF);
        chain.put_block(&rival).unwrap();
        assert!(!chain.is_canonical(rival.hash()).unwrap());

        chain.set_canonical_head(rival.hash()).unwrap();
        assert!(chain.is_canonical(rival.hash()).unwrap());
        assert!(!chain.is_canonical(blocks[5].hash()).unwrap());
        assert_eq!(chain.canonical_reorg_depth_local(rival.hash()).unwrap(), 0);
    }

    #[test]
    fn test_common_ancestor_and_reorg_depths() {
        let (mut chain, blocks) = setup();

        // Fork off block 2 with a 4-block rival branch.
        let rival = extend(&mut chain, blocks[2].clone(), 4, 0xAA);
        let rival_tip = rival.last().expect("non-empty");

        let ancestor =
            chain.common_ancestor_hash_local(blocks[5].hash(), rival_tip.hash()).unwrap();
        assert_eq!(ancestor, blocks[2].hash());

        // Head is at 5, ancestor at 2: three canonical blocks unwind, four
        // rival blocks apply.
        assert_eq!(chain.canonical_reorg_depth_local(rival_tip.hash()).unwrap(), 3);
        assert_eq!(chain.candidate_reorg_depth_local(rival_tip.hash()).unwrap(), 4);
        assert!(chain.has_canonical_divergence_local(rival_tip.hash()).unwrap());

        // Extending the head has no divergence.
        let next = child(&blocks[5], 0);
        chain.put_block(&next).unwrap();
        assert!(!chain.has_canonical_divergence_local(next.hash()).unwrap());
        assert_eq!(chain.candidate_reorg_depth_local(next.hash()).unwrap(), 1);
    }

    #[test]
    fn test_common_ancestor_missing_blocks() {
        let (chain, blocks) = setup();
        let missing = B256::repeat_byte(0xEE);
        assert!(matches!(
            chain.common_ancestor_hash_local(missing, blocks[1].hash()),
            Err(ChainError::MissingBlockA)
        ));
        assert!(matches!(
            chain.common_ancestor_hash_local(blocks[1].hash(), missing),
            Err(ChainError::MissingBlockB)
        ));
    }

    #[test]
    fn test_last_block_hashes_newest_first() {
        let (chain, blocks) = setup();
        let hashes = chain.last_256_block_hashes_local(blocks[5].hash(), 3).unwrap();
        assert_eq!(hashes, vec![blocks[5].hash(), blocks[4].hash(), blocks[3].hash()]);

        // The walk stops at genesis.
        let all = chain.last_256_block_hashes_local(blocks[5].hash(), 500).unwrap();
        assert_eq!(all.len(), 6);
        assert_eq!(*all.last().expect("non-empty"), blocks[0].hash());
    }

    #[test]
    fn test_fork_cache_read_through_and_pending() {
        /// Yields `RpcPending` once, then the block.
        struct DeferredProvider {
            block: Block,
            ready: bool,
        }
        impl ForkProvider for DeferredProvider {
            fn block_by_hash(&mut self, hash: B256) -> ChainResult<Option<Block>> {
                if hash != self.block.header.hash_slow() {
                    return Ok(None);
                }
                if !self.ready {
                    self.ready = true;
                    return Err(ChainError::RpcPending);
                }
                Ok(Some(self.block.clone()))
            }
        }

        let remote = Block {
            header: Header { number: 42, ..Default::default() },
            body: BlockBody::default(),
        };
        let remote_hash = remote.header.hash_slow();

        let provider = DeferredProvider { block: remote, ready: false };
        let mut chain = Blockchain::with_fork_cache(Database::new_in_memory(), provider);

        // First probe defers; the retry resolves and writes through locally.
        assert!(matches!(chain.get_block_by_hash(remote_hash), Err(ChainError::RpcPending)));
        let fetched = chain.get_block_by_hash(remote_hash).unwrap().expect("resolved");
        assert_eq!(fetched.hash(), remote_hash);
        assert!(chain.get_block_local(remote_hash).unwrap().is_some());
    }

    #[test]
    fn test_receipts_round_trip() {
        use alloy_consensus::{Receipt, ReceiptWithBloom};

        let (mut chain, blocks) = setup();
        let receipt = ReceiptEnvelope::Eip1559(ReceiptWithBloom {
            receipt: Receipt {
                status: true.into(),
                cumulative_gas_used: 21_000,
                logs: vec![],
            },
            logs_bloom: Bloom::ZERO,
        });

        let hash = blocks[1].hash();
        chain.put_receipts(hash, &[receipt.clone()]).unwrap();
        let loaded = chain.get_receipts(hash).unwrap().expect("stored");
        assert_eq!(loaded, vec![receipt]);
        assert_eq!(chain.get_receipts(B256::repeat_byte(9)).unwrap(), None);
    }
}
