//! This module contains the [TrieWalker], which traverses a trie's leaves in
//! lexicographic path order.

use crate::{node::nibbles_from, TrieError, TrieNode, TrieProvider, TrieResult};
use alloc::{collections::VecDeque, string::ToString, vec::Vec};
use alloy_primitives::Bytes;
use alloy_trie::Nibbles;

/// A [TrieWalker] performs an in-order traversal of a trie, yielding every
/// `(path, value)` leaf pair in ascending lexicographic order over path
/// nibbles. For a secure trie this is lex order on keccak256 of the original
/// keys.
///
/// Blinded subtrees are resolved eagerly during [Self::try_new]; an
/// unresolvable node surfaces [TrieError::Provider] rather than being
/// silently skipped.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TrieWalker {
    inner: VecDeque<(Nibbles, Bytes)>,
}

impl TrieWalker {
    /// Hydrates a walker with the leaves of the given trie.
    pub fn try_new<P: TrieProvider>(root: &TrieNode, provider: &P) -> TrieResult<Self> {
        let mut inner = VecDeque::new();
        Self::collect(root, provider, &mut Vec::new(), &mut inner)?;
        Ok(Self { inner })
    }

    /// Returns the number of leaves remaining.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if no leaves remain.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn collect<P: TrieProvider>(
        node: &TrieNode,
        provider: &P,
        path: &mut Vec<u8>,
        out: &mut VecDeque<(Nibbles, Bytes)>,
    ) -> TrieResult<()> {
        match node {
            TrieNode::Empty => {}
            TrieNode::Blinded { commitment } => {
                let resolved = provider
                    .trie_node_by_hash(*commitment)
                    .map_err(|e| TrieError::Provider(e.to_string()))?;
                Self::collect(&resolved, provider, path, out)?;
            }
            TrieNode::Leaf { prefix, value } => {
                path.extend_from_slice(prefix.as_slice());
                out.push_back((nibbles_from(path), value.clone()));
                path.truncate(path.len() - prefix.len());
            }
            TrieNode::Extension { prefix, node } => {
                path.extend_from_slice(prefix.as_slice());
                Self::collect(node, provider, path, out)?;
                path.truncate(path.len() - prefix.len());
            }
            TrieNode::Branch { stack, value } => {
                // The branch value sits at the shortest path, before any child.
                if let Some(value) = value {
                    out.push_back((nibbles_from(path), value.clone()));
                }
                for (index, child) in stack.iter().enumerate() {
                    path.push(index as u8);
                    Self::collect(child, provider, path, out)?;
                    path.pop();
                }
            }
        }
        Ok(())
    }
}

impl Iterator for TrieWalker {
    type Item = (Nibbles, Bytes);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NoopTrieProvider;

    #[test]
    fn test_walk_empty() {
        let walker = TrieWalker::try_new(&TrieNode::Empty, &NoopTrieProvider).unwrap();
        assert!(walker.is_empty());
    }

    #[test]
    fn test_walk_in_lex_order() {
        let mut node = TrieNode::Empty;
        let entries: [(&[u8], &[u8]); 4] =
            [(b"horse", b"stallion"), (b"dog", b"puppy"), (b"doge", b"coin"), (b"do", b"verb")];
        for (key, value) in entries {
            node.insert(
                &Nibbles::unpack(key),
                Bytes::copy_from_slice(value),
                &NoopTrieProvider,
            )
            .unwrap();
        }

        let walked = TrieWalker::try_new(&node, &NoopTrieProvider)
            .unwrap()
            .collect::<Vec<_>>();
        let paths = walked.iter().map(|(path, _)| path.clone()).collect::<Vec<_>>();

        let mut sorted = paths.clone();
        sorted.sort();
        assert_eq!(paths, sorted);
        assert_eq!(walked.len(), 4);

        // "do" is the shortest path and must come first; "horse" sorts last.
        assert_eq!(walked[0].1, Bytes::copy_from_slice(b"verb"));
        assert_eq!(walked[3].1, Bytes::copy_from_slice(b"stallion"));
    }

    #[test]
    fn test_walk_fails_on_unresolvable_node() {
        let node = TrieNode::new_blinded(alloy_primitives::B256::repeat_byte(0xAB));
        let err = TrieWalker::try_new(&node, &NoopTrieProvider).unwrap_err();
        assert!(matches!(err, TrieError::Provider(_)));
    }
}
