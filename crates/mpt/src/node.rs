//! This module contains the [TrieNode] type, an in-memory Merkle Patricia Trie
//! with incremental updates and keccak256 commitment.

use crate::{TrieError, TrieProvider, TrieResult};
use alloc::{boxed::Box, string::ToString, vec, vec::Vec};
use alloy_primitives::{keccak256, Bytes, B256};
use alloy_rlp::{Buf, BufMut, Decodable, Encodable, Header, EMPTY_STRING_CODE};
use alloy_trie::{Nibbles, EMPTY_ROOT_HASH};

/// The number of children in a branch node.
const BRANCH_WIDTH: usize = 16;

/// The length of a leaf or extension node's RLP encoded list.
const LEAF_OR_EXTENSION_LIST_LENGTH: usize = 2;

/// The length of a branch node's RLP encoded list.
const BRANCH_LIST_LENGTH: usize = 17;

/// Prefix flag for even-nibbled extension node paths.
const PREFIX_EXTENSION_EVEN: u8 = 0;

/// Prefix flag for odd-nibbled extension node paths.
const PREFIX_EXTENSION_ODD: u8 = 1;

/// Prefix flag for even-nibbled leaf node paths.
const PREFIX_LEAF_EVEN: u8 = 2;

/// Prefix flag for odd-nibbled leaf node paths.
const PREFIX_LEAF_ODD: u8 = 3;

/// A node within a Merkle Patricia Trie.
///
/// Child references follow the canonical inlining rule: a child whose RLP
/// encoding is shorter than 32 bytes is embedded verbatim in its parent's
/// encoding; otherwise the reference is the keccak256 commitment of the
/// encoding, represented here as [TrieNode::Blinded]. The root commitment is
/// always a hash, regardless of the root encoding's length.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum TrieNode {
    /// An empty node.
    Empty,
    /// A reference to a node whose preimage has not been resolved.
    Blinded {
        /// The keccak256 commitment of the referenced node's RLP encoding.
        commitment: B256,
    },
    /// A 2-item node holding the remainder of a key path and its value,
    /// encoded as `rlp([encoded_path, value])`.
    Leaf {
        /// The path remainder, in nibbles.
        prefix: Nibbles,
        /// The value of the leaf.
        value: Bytes,
    },
    /// A 2-item pointer node, encoded as `rlp([encoded_path, child_ref])`.
    Extension {
        /// The shared path prefix, in nibbles.
        prefix: Nibbles,
        /// The child beneath the shared prefix.
        node: Box<TrieNode>,
    },
    /// A 16-way fan-out with an optional value for the exact-match key,
    /// encoded as `rlp([ref_0, ..., ref_15, value])`.
    Branch {
        /// The 16 children of the branch.
        stack: Vec<TrieNode>,
        /// The value stored at the branch itself, if any.
        value: Option<Bytes>,
    },
}

impl TrieNode {
    /// Creates a new [TrieNode::Blinded] node from a commitment.
    pub const fn new_blinded(commitment: B256) -> Self {
        Self::Blinded { commitment }
    }

    /// Creates an empty [TrieNode::Branch].
    fn empty_branch() -> Self {
        Self::Branch { stack: vec![Self::Empty; BRANCH_WIDTH], value: None }
    }

    /// Returns the commitment of the node if it has been blinded.
    pub const fn blinded_commitment(&self) -> Option<B256> {
        match self {
            Self::Blinded { commitment } => Some(*commitment),
            _ => None,
        }
    }

    /// Blinds the node, replacing it with the keccak256 commitment of its RLP
    /// encoding. An [TrieNode::Empty] node blinds to [EMPTY_ROOT_HASH]; a node
    /// that is already blinded is left untouched. This is the root hashing
    /// rule — inner references apply the <32-byte inlining rule instead,
    /// during encoding.
    pub fn blind(&mut self) {
        let commitment = match self {
            Self::Blinded { commitment } => *commitment,
            Self::Empty => EMPTY_ROOT_HASH,
            ref node => {
                let mut rlp_buf = Vec::with_capacity(node.length());
                node.encode(&mut rlp_buf);
                keccak256(&rlp_buf)
            }
        };
        *self = Self::Blinded { commitment };
    }

    /// Returns the root commitment of the node without mutating it.
    pub fn root_hash(&self) -> B256 {
        match self {
            Self::Empty => EMPTY_ROOT_HASH,
            Self::Blinded { commitment } => *commitment,
            node => {
                let mut rlp_buf = Vec::with_capacity(node.length());
                node.encode(&mut rlp_buf);
                keccak256(&rlp_buf)
            }
        }
    }

    /// Walks down the trie to the value at the given path, resolving blinded
    /// nodes through the `provider` along the way.
    ///
    /// Returns `Ok(None)` if the path is not present.
    pub fn open<P: TrieProvider>(
        &mut self,
        path: &Nibbles,
        provider: &P,
    ) -> TrieResult<Option<Bytes>> {
        match self {
            Self::Empty => Ok(None),
            Self::Blinded { .. } => {
                self.unblind(provider)?;
                self.open(path, provider)
            }
            Self::Leaf { prefix, value } => {
                Ok((prefix.as_slice() == path.as_slice()).then(|| value.clone()))
            }
            Self::Extension { prefix, node } => {
                if path.len() >= prefix.len() && &path[..prefix.len()] == prefix.as_slice() {
                    node.open(&nibbles_from(&path[prefix.len()..]), provider)
                } else {
                    Ok(None)
                }
            }
            Self::Branch { stack, value } => {
                if path.is_empty() {
                    return Ok(value.clone());
                }
                let index = path[0] as usize;
                if index >= BRANCH_WIDTH {
                    return Err(TrieError::InvalidNibble);
                }
                stack[index].open(&nibbles_from(&path[1..]), provider)
            }
        }
    }

    /// Inserts a value at the given path, splitting leaves and extensions as
    /// required. Blinded nodes along the path are resolved through the
    /// `provider`.
    pub fn insert<P: TrieProvider>(
        &mut self,
        path: &Nibbles,
        value: Bytes,
        provider: &P,
    ) -> TrieResult<()> {
        match self {
            Self::Empty => {
                *self = Self::Leaf { prefix: path.clone(), value };
                Ok(())
            }
            Self::Blinded { .. } => {
                self.unblind(provider)?;
                self.insert(path, value, provider)
            }
            Self::Leaf { prefix, value: leaf_value } => {
                if prefix.as_slice() == path.as_slice() {
                    *leaf_value = value;
                    return Ok(());
                }

                let shared = prefix.common_prefix_length(path.as_slice());
                let mut branch = Self::empty_branch();
                branch.place(&prefix.clone(), shared, leaf_value.clone())?;
                branch.place(path, shared, value)?;
                *self = wrap_in_extension(&path[..shared], branch);
                Ok(())
            }
            Self::Extension { prefix, node } => {
                let shared = prefix.common_prefix_length(path.as_slice());
                if shared == prefix.len() {
                    return node.insert(&nibbles_from(&path[shared..]), value, provider);
                }

                // The extension diverges from the path: split it at the shared
                // prefix and fan out into a branch.
                let mut branch = Self::empty_branch();
                let old_index = prefix[shared] as usize;
                let old_rest = nibbles_from(&prefix[shared + 1..]);
                let old_child = core::mem::replace(node.as_mut(), Self::Empty);
                branch.set_child(
                    old_index,
                    if old_rest.is_empty() {
                        old_child
                    } else {
                        Self::Extension { prefix: old_rest, node: Box::new(old_child) }
                    },
                )?;
                branch.place(path, shared, value)?;
                *self = wrap_in_extension(&path[..shared], branch);
                Ok(())
            }
            Self::Branch { stack, value: branch_value } => {
                if path.is_empty() {
                    *branch_value = Some(value);
                    return Ok(());
                }
                let index = path[0] as usize;
                if index >= BRANCH_WIDTH {
                    return Err(TrieError::InvalidNibble);
                }
                stack[index].insert(&nibbles_from(&path[1..]), value, provider)
            }
        }
    }

    /// Deletes the value at the given path, collapsing redundant nodes on the
    /// way back up. Returns `true` if a value was removed.
    pub fn delete<P: TrieProvider>(&mut self, path: &Nibbles, provider: &P) -> TrieResult<bool> {
        match self {
            Self::Empty => Ok(false),
            Self::Blinded { .. } => {
                self.unblind(provider)?;
                self.delete(path, provider)
            }
            Self::Leaf { prefix, .. } => {
                if prefix.as_slice() == path.as_slice() {
                    *self = Self::Empty;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Self::Extension { prefix, node } => {
                if path.len() < prefix.len() || &path[..prefix.len()] != prefix.as_slice() {
                    return Ok(false);
                }
                let removed = node.delete(&nibbles_from(&path[prefix.len()..]), provider)?;
                if removed {
                    self.collapse_extension(provider)?;
                }
                Ok(removed)
            }
            Self::Branch { stack, value } => {
                let removed = if path.is_empty() {
                    value.take().is_some()
                } else {
                    let index = path[0] as usize;
                    if index >= BRANCH_WIDTH {
                        return Err(TrieError::InvalidNibble);
                    }
                    stack[index].delete(&nibbles_from(&path[1..]), provider)?
                };
                if removed {
                    self.collapse_branch(provider)?;
                }
                Ok(removed)
            }
        }
    }

    /// Emits the preimage of every node in the subtrie whose reference is a
    /// commitment rather than an inline encoding, the root included. The sink
    /// receives `(keccak256(rlp), rlp)` pairs.
    pub fn write_preimages(&self, sink: &mut dyn FnMut(B256, Bytes)) {
        self.write_preimages_inner(sink, true);
    }

    fn write_preimages_inner(&self, sink: &mut dyn FnMut(B256, Bytes), is_root: bool) {
        match self {
            Self::Empty | Self::Blinded { .. } => {}
            Self::Leaf { .. } => self.emit_preimage(sink, is_root),
            Self::Extension { node, .. } => {
                node.write_preimages_inner(sink, false);
                self.emit_preimage(sink, is_root);
            }
            Self::Branch { stack, .. } => {
                for child in stack {
                    child.write_preimages_inner(sink, false);
                }
                self.emit_preimage(sink, is_root);
            }
        }
    }

    fn emit_preimage(&self, sink: &mut dyn FnMut(B256, Bytes), is_root: bool) {
        let mut rlp_buf = Vec::with_capacity(self.length());
        self.encode(&mut rlp_buf);
        if is_root || rlp_buf.len() >= B256::len_bytes() {
            sink(keccak256(&rlp_buf), rlp_buf.into());
        }
    }

    /// Resolves a [TrieNode::Blinded] node in place through the provider.
    fn unblind<P: TrieProvider>(&mut self, provider: &P) -> TrieResult<()> {
        if let Self::Blinded { commitment } = self {
            *self = provider
                .trie_node_by_hash(*commitment)
                .map_err(|e| TrieError::Provider(e.to_string()))?;
        }
        Ok(())
    }

    /// Places a residual `(path[shared..], value)` pair into a branch that
    /// fans out at `shared`: an exhausted path lands in the branch value, any
    /// other path becomes a leaf under its next nibble.
    fn place(&mut self, path: &Nibbles, shared: usize, value: Bytes) -> TrieResult<()> {
        let Self::Branch { stack, value: branch_value } = self else {
            return Err(TrieError::InvalidNibble);
        };
        if path.len() == shared {
            *branch_value = Some(value);
            return Ok(());
        }
        let index = path[shared] as usize;
        if index >= BRANCH_WIDTH {
            return Err(TrieError::InvalidNibble);
        }
        stack[index] = Self::Leaf { prefix: nibbles_from(&path[shared + 1..]), value };
        Ok(())
    }

    fn set_child(&mut self, index: usize, child: Self) -> TrieResult<()> {
        let Self::Branch { stack, .. } = self else {
            return Err(TrieError::InvalidNibble);
        };
        if index >= BRANCH_WIDTH {
            return Err(TrieError::InvalidNibble);
        }
        stack[index] = child;
        Ok(())
    }

    /// Merges an extension with its child after a deletion beneath it.
    fn collapse_extension<P: TrieProvider>(&mut self, provider: &P) -> TrieResult<()> {
        let Self::Extension { prefix, node } = self else {
            return Ok(());
        };
        if matches!(node.as_ref(), Self::Blinded { .. }) {
            node.unblind(provider)?;
        }
        match node.as_mut() {
            Self::Empty => *self = Self::Empty,
            Self::Leaf { prefix: leaf_prefix, value } => {
                let merged = concat_nibbles(prefix, leaf_prefix);
                let value = core::mem::take(value);
                *self = Self::Leaf { prefix: merged, value };
            }
            Self::Extension { prefix: child_prefix, node: grandchild } => {
                let merged = concat_nibbles(prefix, child_prefix);
                let grandchild = core::mem::replace(grandchild, Box::new(Self::Empty));
                *self = Self::Extension { prefix: merged, node: grandchild };
            }
            // A branch beneath the extension stays as-is.
            _ => {}
        }
        Ok(())
    }

    /// Normalizes a branch after a deletion: a branch left with a lone value
    /// becomes a leaf, a branch left with a single child folds into its
    /// child's path.
    fn collapse_branch<P: TrieProvider>(&mut self, provider: &P) -> TrieResult<()> {
        let Self::Branch { stack, value } = self else {
            return Ok(());
        };

        let occupied = stack
            .iter()
            .enumerate()
            .filter(|(_, child)| !matches!(child, Self::Empty))
            .map(|(i, _)| i)
            .collect::<Vec<_>>();

        match (occupied.len(), value.is_some()) {
            (0, true) => {
                let value = value.take().unwrap_or_default();
                *self = Self::Leaf { prefix: Nibbles::default(), value };
            }
            (0, false) => *self = Self::Empty,
            (1, false) => {
                let index = occupied[0];
                let mut child = core::mem::replace(&mut stack[index], Self::Empty);
                if matches!(child, Self::Blinded { .. }) {
                    child.unblind(provider)?;
                }
                let nibble = [index as u8];
                *self = match child {
                    Self::Leaf { prefix, value } => {
                        Self::Leaf { prefix: concat_slices(&nibble, &prefix), value }
                    }
                    Self::Extension { prefix, node } => {
                        Self::Extension { prefix: concat_slices(&nibble, &prefix), node }
                    }
                    branch @ Self::Branch { .. } => Self::Extension {
                        prefix: nibbles_from(&nibble),
                        node: Box::new(branch),
                    },
                    other => other,
                };
            }
            // A branch with a value and children, or several children, stands.
            _ => {}
        }
        Ok(())
    }

    /// Encodes the reference to this node into a parent's payload: inline when
    /// the encoding is shorter than 32 bytes, a keccak256 commitment
    /// otherwise.
    fn encode_ref(&self, out: &mut dyn BufMut) {
        match self {
            Self::Empty => out.put_u8(EMPTY_STRING_CODE),
            Self::Blinded { commitment } => commitment.encode(out),
            node => {
                let mut rlp_buf = Vec::with_capacity(node.length());
                node.encode(&mut rlp_buf);
                if rlp_buf.len() < B256::len_bytes() {
                    out.put_slice(&rlp_buf);
                } else {
                    keccak256(&rlp_buf).encode(out);
                }
            }
        }
    }

    /// The encoded length of the reference to this node within a parent.
    fn ref_length(&self) -> usize {
        match self {
            Self::Empty => 1,
            Self::Blinded { .. } => B256::len_bytes() + 1,
            node => {
                let encoded = node.length();
                if encoded < B256::len_bytes() {
                    encoded
                } else {
                    B256::len_bytes() + 1
                }
            }
        }
    }

    fn payload_length(&self) -> usize {
        match self {
            Self::Empty | Self::Blinded { .. } => 0,
            Self::Leaf { prefix, value } => {
                encoded_path_length(prefix) + value.length()
            }
            Self::Extension { prefix, node } => {
                encoded_path_length(prefix) + node.ref_length()
            }
            Self::Branch { stack, value } => {
                let children = stack.iter().map(Self::ref_length).sum::<usize>();
                let value_len = value.as_ref().map_or(1, Encodable::length);
                children + value_len
            }
        }
    }
}

impl Encodable for TrieNode {
    fn encode(&self, out: &mut dyn BufMut) {
        match self {
            Self::Empty => out.put_u8(EMPTY_STRING_CODE),
            Self::Blinded { commitment } => commitment.encode(out),
            Self::Leaf { prefix, value } => {
                Header { list: true, payload_length: self.payload_length() }.encode(out);
                encode_path(prefix, true, out);
                value.encode(out);
            }
            Self::Extension { prefix, node } => {
                Header { list: true, payload_length: self.payload_length() }.encode(out);
                encode_path(prefix, false, out);
                node.encode_ref(out);
            }
            Self::Branch { stack, value } => {
                Header { list: true, payload_length: self.payload_length() }.encode(out);
                for child in stack {
                    child.encode_ref(out);
                }
                match value {
                    Some(value) => value.encode(out),
                    None => out.put_u8(EMPTY_STRING_CODE),
                }
            }
        }
    }

    fn length(&self) -> usize {
        match self {
            Self::Empty => 1,
            Self::Blinded { .. } => B256::len_bytes() + 1,
            node => {
                let payload_length = node.payload_length();
                Header { list: true, payload_length }.length() + payload_length
            }
        }
    }
}

impl Decodable for TrieNode {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        let header = Header::decode(buf)?;
        if !header.list {
            return Err(alloy_rlp::Error::UnexpectedString);
        }
        if header.payload_length > buf.len() {
            return Err(alloy_rlp::Error::InputTooShort);
        }
        let mut payload = &buf[..header.payload_length];
        buf.advance(header.payload_length);

        let mut elements = Vec::new();
        while !payload.is_empty() {
            elements.push(RawElement::decode(&mut payload)?);
        }

        match elements.len() {
            LEAF_OR_EXTENSION_LIST_LENGTH => {
                let mut iter = elements.into_iter();
                let RawElement::String(path) = iter.next().expect("two elements") else {
                    return Err(alloy_rlp::Error::UnexpectedList);
                };
                let (prefix, is_leaf) =
                    decode_path(&path).map_err(|_| alloy_rlp::Error::Custom("invalid path"))?;
                let second = iter.next().expect("two elements");
                if is_leaf {
                    let RawElement::String(value) = second else {
                        return Err(alloy_rlp::Error::UnexpectedList);
                    };
                    Ok(Self::Leaf { prefix, value })
                } else {
                    Ok(Self::Extension { prefix, node: Box::new(second.into_child_ref()?) })
                }
            }
            BRANCH_LIST_LENGTH => {
                let mut stack = Vec::with_capacity(BRANCH_WIDTH);
                let mut iter = elements.into_iter();
                for _ in 0..BRANCH_WIDTH {
                    stack.push(iter.next().expect("seventeen elements").into_child_ref()?);
                }
                let RawElement::String(value) = iter.next().expect("seventeen elements") else {
                    return Err(alloy_rlp::Error::UnexpectedList);
                };
                let value = (!value.is_empty()).then_some(value);
                Ok(Self::Branch { stack, value })
            }
            _ => Err(alloy_rlp::Error::UnexpectedLength),
        }
    }
}

/// A raw element of a node's RLP list: either a string or the verbatim bytes
/// of a nested (inlined) node.
enum RawElement {
    String(Bytes),
    Inline(TrieNode),
}

impl RawElement {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        if buf.is_empty() {
            return Err(alloy_rlp::Error::InputTooShort);
        }
        if buf[0] >= alloy_rlp::EMPTY_LIST_CODE {
            // A nested list is an inlined child node.
            TrieNode::decode(buf).map(Self::Inline)
        } else {
            Bytes::decode(buf).map(Self::String)
        }
    }

    /// Interprets the element as a child reference.
    fn into_child_ref(self) -> alloy_rlp::Result<TrieNode> {
        match self {
            Self::Inline(node) => Ok(node),
            Self::String(bytes) if bytes.is_empty() => Ok(TrieNode::Empty),
            Self::String(bytes) if bytes.len() == B256::len_bytes() => {
                Ok(TrieNode::new_blinded(B256::from_slice(&bytes)))
            }
            Self::String(_) => Err(alloy_rlp::Error::UnexpectedLength),
        }
    }
}

/// Builds a [Nibbles] from a raw nibble slice.
pub(crate) fn nibbles_from(nibbles: &[u8]) -> Nibbles {
    Nibbles::from_vec_unchecked(nibbles.to_vec())
}

fn concat_nibbles(a: &Nibbles, b: &Nibbles) -> Nibbles {
    concat_slices(a.as_slice(), b.as_slice())
}

fn concat_slices(a: &[u8], b: &[u8]) -> Nibbles {
    let mut joined = Vec::with_capacity(a.len() + b.len());
    joined.extend_from_slice(a);
    joined.extend_from_slice(b);
    Nibbles::from_vec_unchecked(joined)
}

fn wrap_in_extension(shared: &[u8], branch: TrieNode) -> TrieNode {
    if shared.is_empty() {
        branch
    } else {
        TrieNode::Extension { prefix: nibbles_from(shared), node: Box::new(branch) }
    }
}

/// Hex-prefix encodes a path per the two-bit flag scheme: bit 1 marks a leaf,
/// bit 0 marks odd parity. An odd path's first nibble rides in the low nibble
/// of the flag byte; an even path pads with a zero nibble.
fn encode_path(path: &Nibbles, is_leaf: bool, out: &mut dyn BufMut) {
    let packed = pack_path(path, is_leaf);
    packed.as_slice().encode(out);
}

fn encoded_path_length(path: &Nibbles) -> usize {
    pack_path(path, false).as_slice().length()
}

fn pack_path(path: &Nibbles, is_leaf: bool) -> Vec<u8> {
    let odd = path.len() % 2 == 1;
    let flag = (is_leaf as u8) << 1 | odd as u8;
    let mut packed = Vec::with_capacity(path.len() / 2 + 1);
    let mut nibbles = path.as_slice();
    if odd {
        packed.push(flag << 4 | nibbles[0]);
        nibbles = &nibbles[1..];
    } else {
        packed.push(flag << 4);
    }
    for pair in nibbles.chunks_exact(2) {
        packed.push(pair[0] << 4 | pair[1]);
    }
    packed
}

/// Decodes a hex-prefixed path into its nibbles and leaf flag.
fn decode_path(encoded: &[u8]) -> TrieResult<(Nibbles, bool)> {
    let first = *encoded.first().ok_or(TrieError::InvalidPathFlag)?;
    let (is_leaf, odd) = match first >> 4 {
        PREFIX_EXTENSION_EVEN => (false, false),
        PREFIX_EXTENSION_ODD => (false, true),
        PREFIX_LEAF_EVEN => (true, false),
        PREFIX_LEAF_ODD => (true, true),
        _ => return Err(TrieError::InvalidPathFlag),
    };

    let rest = Nibbles::unpack(&encoded[1..]);
    let nibbles = if odd {
        concat_slices(&[first & 0x0F], rest.as_slice())
    } else {
        if first & 0x0F != 0 {
            return Err(TrieError::InvalidPathFlag);
        }
        rest
    };
    Ok((nibbles, is_leaf))
}
