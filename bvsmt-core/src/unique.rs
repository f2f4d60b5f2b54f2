//! Hash-cons index storage.
//!
//! The unique table is an open-chained hash table whose collision chains are
//! threaded through the nodes themselves (`NodeData::next_unique`), so an
//! entry costs no extra allocation. The search loops live in the context,
//! which owns the arena the chains run through; this module keeps the bucket
//! array, the growth policy and the structural fingerprints.
//!
//! Variables, uninterpreted functions and parameters are never entered:
//! every fresh declaration is a distinct node.

use crate::node::{Node, NodeRef};
use bvsmt_entity::packed_option::PackedOption;

/// The table stops doubling once its size reaches 2^30 buckets.
const UNIQUE_TABLE_LIMIT: u32 = 30;

/// Mixing primes for the structural fingerprints, one per child position.
pub(crate) const HASH_PRIMES: [u32; 3] = [333_444_569, 76_891_121, 456_790_003];

/// Fingerprint of a slice node.
pub(crate) fn hash_slice(e0: NodeRef, upper: u32, lower: u32) -> u32 {
    debug_assert!(upper >= lower);
    HASH_PRIMES[0]
        .wrapping_mul(e0.node().as_u32())
        .wrapping_add(HASH_PRIMES[1].wrapping_mul(upper))
        .wrapping_add(HASH_PRIMES[2].wrapping_mul(lower))
}

/// Fingerprint of a binary or ternary node over already normalised children.
pub(crate) fn hash_children(children: &[NodeRef]) -> u32 {
    debug_assert!(children.len() <= HASH_PRIMES.len());
    let mut hash = 0u32;
    for (i, child) in children.iter().enumerate() {
        hash = hash.wrapping_add(HASH_PRIMES[i].wrapping_mul(child.node().as_u32()));
    }
    hash
}

/// Bucket array of the unique table.
pub(crate) struct UniqueTable {
    chains: Vec<PackedOption<Node>>,
    len: usize,
}

impl UniqueTable {
    pub fn new() -> Self {
        Self {
            chains: vec![PackedOption::default()],
            len: 0,
        }
    }

    /// Number of hash-consed nodes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Number of buckets; always a power of two.
    pub fn size(&self) -> usize {
        self.chains.len()
    }

    /// Mask reducing a fingerprint to a bucket index.
    pub fn mask(&self) -> u32 {
        (self.chains.len() - 1) as u32
    }

    /// Should the table double before the next insertion?
    pub fn is_full(&self) -> bool {
        self.len >= self.chains.len()
            && (self.chains.len() as u64).trailing_zeros() < UNIQUE_TABLE_LIMIT
    }

    /// Head of the bucket for `hash`.
    pub fn head(&self, hash: u32) -> Option<Node> {
        self.chains[(hash & self.mask()) as usize].expand()
    }

    /// Push `node` at the head of its bucket, returning the previous head
    /// for the caller to store in the node's chain link.
    pub fn push_front(&mut self, hash: u32, node: Node) -> Option<Node> {
        let idx = (hash & self.mask()) as usize;
        let slot = &mut self.chains[idx];
        let prev = slot.expand();
        *slot = node.into();
        self.len += 1;
        prev
    }

    /// Re-link an already counted node at the head of its new bucket during
    /// a rehash.
    pub fn relink_front(&mut self, hash: u32, node: Node) -> Option<Node> {
        let idx = (hash & self.mask()) as usize;
        let slot = &mut self.chains[idx];
        let prev = slot.expand();
        *slot = node.into();
        prev
    }

    /// Replace the head of the bucket for `hash`.
    pub fn set_head(&mut self, hash: u32, node: Option<Node>) {
        let idx = (hash & self.mask()) as usize;
        self.chains[idx] = node.into();
    }

    /// Account for one unlinked node.
    pub fn decrement_len(&mut self) {
        debug_assert!(self.len > 0);
        self.len -= 1;
    }

    /// Take the bucket array out for rehashing into `new_size` buckets.
    pub fn take_chains_for_growth(&mut self) -> Vec<PackedOption<Node>> {
        let new_size = self.chains.len() * 2;
        core::mem::replace(&mut self.chains, vec![PackedOption::default(); new_size])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bvsmt_entity::EntityRef;

    #[test]
    fn growth_policy() {
        let mut t = UniqueTable::new();
        assert_eq!(t.size(), 1);
        assert!(!t.is_full());
        t.push_front(0, Node::new(1));
        assert!(t.is_full());

        let old = t.take_chains_for_growth();
        assert_eq!(old.len(), 1);
        assert_eq!(t.size(), 2);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn buckets() {
        let mut t = UniqueTable::new();
        let a = Node::new(1);
        let b = Node::new(2);
        assert_eq!(t.push_front(7, a), None);
        assert_eq!(t.push_front(7, b), Some(a));
        assert_eq!(t.head(7), Some(b));
        assert_eq!(t.len(), 2);

        t.set_head(7, Some(a));
        t.decrement_len();
        assert_eq!(t.head(7), Some(a));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn fingerprints_are_stable() {
        let e = NodeRef::from(Node::new(12));
        assert_eq!(hash_slice(e, 7, 3), hash_slice(e.not(), 7, 3));
        assert_ne!(hash_slice(e, 7, 3), hash_slice(e, 7, 2));

        let a = NodeRef::from(Node::new(3));
        let b = NodeRef::from(Node::new(4));
        assert_eq!(hash_children(&[a, b]), hash_children(&[a.not(), b]));
        assert_ne!(hash_children(&[a, b]), hash_children(&[b, a]));
    }
}
