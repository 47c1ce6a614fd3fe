//! Index-keyed trie construction for transactions, receipts, and withdrawals
//! commitments.

use alloc::vec::Vec;
use alloy_primitives::B256;
use alloy_rlp::{BufMut, Encodable};
use alloy_trie::{HashBuilder, Nibbles};

/// Compute a trie root of the collection of items with a custom encoder.
///
/// Items are keyed by their RLP-encoded index, with the ordering adjusted so
/// that nibble paths arrive at the [HashBuilder] in ascending order.
pub fn ordered_trie_with_encoder<T, F>(items: &[T], mut encode: F) -> HashBuilder
where
    F: FnMut(&T, &mut dyn BufMut),
{
    let mut index_buffer = Vec::new();
    let mut value_buffer = Vec::new();
    let items_len = items.len();

    let mut hb = HashBuilder::default();
    for i in 0..items_len {
        let index = adjust_index_for_rlp(i, items_len);

        index_buffer.clear();
        index.encode(&mut index_buffer);

        value_buffer.clear();
        encode(&items[index], &mut value_buffer);

        hb.add_leaf(Nibbles::unpack(&index_buffer), &value_buffer);
    }

    hb
}

/// Compute the root of an index-keyed trie over RLP-encodable items.
pub fn ordered_trie_root<T: Encodable>(items: &[T]) -> B256 {
    ordered_trie_with_encoder(items, |item, buf| item.encode(buf)).root()
}

/// Adjust the index of an item for rlp encoding.
pub(crate) const fn adjust_index_for_rlp(i: usize, len: usize) -> usize {
    if i > 0x7f {
        i
    } else if i == 0x7f || i + 1 == len {
        0
    } else {
        i + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{trie_root, EMPTY_ROOT_HASH};
    use alloy_primitives::Bytes;

    #[test]
    fn test_empty_items_is_empty_trie_root() {
        assert_eq!(ordered_trie_root::<Bytes>(&[]), EMPTY_ROOT_HASH);
    }

    #[test]
    fn test_adjust_index_boundaries() {
        // Short lists rotate the final element into slot zero.
        assert_eq!(adjust_index_for_rlp(0, 3), 1);
        assert_eq!(adjust_index_for_rlp(1, 3), 2);
        assert_eq!(adjust_index_for_rlp(2, 3), 0);
        // 0x7f maps to zero, larger indices are untouched.
        assert_eq!(adjust_index_for_rlp(0x7f, 200), 0);
        assert_eq!(adjust_index_for_rlp(0x80, 200), 0x80);
    }

    #[test]
    fn test_matches_node_construction() {
        // The ordered builder and the incremental node must agree on the
        // commitment for the same index-keyed mapping.
        let items = (0..20u64)
            .map(|i| Bytes::from(alloc::format!("item number {i}").into_bytes()))
            .collect::<Vec<_>>();

        let ordered_root = ordered_trie_root(&items);

        let pairs = items.iter().enumerate().map(|(i, item)| {
            let mut key = Vec::new();
            i.encode(&mut key);
            let mut value = Vec::new();
            item.encode(&mut value);
            (key, Bytes::from(value))
        });
        let node_root = trie_root(pairs).unwrap();

        assert_eq!(ordered_root, node_root);
    }
}
