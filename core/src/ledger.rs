//! Integrity ledger of issued seals.
//!
//! An AVL tree keyed by seal digest, stored in an arena and linked by
//! [`NodeId`] handles instead of owning pointers. Every node carries a
//! checksum over its entry so [`SealLedger::verify_integrity`] can detect
//! in-memory or persisted tampering as well as broken balance invariants.

use std::cmp::Ordering;

use thiserror::Error;

use crate::{Fingerprint, SealRecord, VectorRole, domain_hash};

const NODE_DOMAIN: &[u8] = b"aura-seal:ledger-node:v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub digest: [u8; 32],
    pub fingerprint_alpha: Fingerprint,
    pub fingerprint_beta: Fingerprint,
    pub timestamp_millis: i64,
    pub occurrences: u32,
}

impl LedgerEntry {
    fn from_record(record: &SealRecord) -> Self {
        Self {
            digest: *record.digest(),
            fingerprint_alpha: *record.fingerprint(VectorRole::Alpha),
            fingerprint_beta: *record.fingerprint(VectorRole::Beta),
            timestamp_millis: record.timestamp().timestamp_millis(),
            occurrences: 1,
        }
    }

    fn checksum(&self) -> [u8; 8] {
        let digest = domain_hash(
            NODE_DOMAIN,
            &[
                &self.digest,
                self.fingerprint_alpha.as_bytes(),
                self.fingerprint_beta.as_bytes(),
                &self.timestamp_millis.to_be_bytes(),
                &self.occurrences.to_be_bytes(),
            ],
        );
        let mut out = [0u8; 8];
        out.copy_from_slice(&digest[..8]);
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LedgerViolation {
    #[error("node {0:?} checksum does not match its entry")]
    ChecksumMismatch(NodeId),
    #[error("node {0:?} records a stale height")]
    HeightMismatch(NodeId),
    #[error("node {0:?} is out of AVL balance")]
    Unbalanced(NodeId),
    #[error("node {0:?} violates key ordering")]
    OutOfOrder(NodeId),
    #[error("node {0:?} is referenced but missing from the arena")]
    Dangling(NodeId),
}

#[derive(Debug, Clone)]
struct Node {
    entry: LedgerEntry,
    checksum: [u8; 8],
    height: u32,
    left: Option<NodeId>,
    right: Option<NodeId>,
}

#[derive(Debug, Clone, Default)]
pub struct SealLedger {
    nodes: Vec<Node>,
    root: Option<NodeId>,
}

impl SealLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Record a seal. Re-sealing the same payload bumps its occurrence count.
    pub fn record(&mut self, record: &SealRecord) -> NodeId {
        let entry = LedgerEntry::from_record(record);
        let (root, id) = self.insert_at(self.root, entry);
        self.root = Some(root);
        id
    }

    #[must_use]
    pub fn get(&self, digest: &[u8; 32]) -> Option<&LedgerEntry> {
        let mut cursor = self.root;
        while let Some(id) = cursor {
            let node = self.node(id)?;
            cursor = match digest.cmp(&node.entry.digest) {
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
                Ordering::Equal => return Some(&node.entry),
            };
        }
        None
    }

    #[must_use]
    pub fn contains(&self, record: &SealRecord) -> bool {
        self.get(record.digest()).is_some()
    }

    /// Entries in digest order.
    #[must_use]
    pub fn entries(&self) -> Vec<&LedgerEntry> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = Vec::new();
        let mut cursor = self.root;
        loop {
            while let Some(id) = cursor {
                stack.push(id);
                cursor = self.node(id).and_then(|n| n.left);
            }
            let Some(id) = stack.pop() else { break };
            if let Some(node) = self.node(id) {
                out.push(&node.entry);
                cursor = node.right;
            }
        }
        out
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height_of(self.root)
    }

    /// Recompute every checksum, height and balance factor, and check key
    /// ordering across the whole tree.
    pub fn verify_integrity(&self) -> Result<(), LedgerViolation> {
        self.check_subtree(self.root, None, None).map(|_| ())
    }

    fn check_subtree(
        &self,
        id: Option<NodeId>,
        lower: Option<&[u8; 32]>,
        upper: Option<&[u8; 32]>,
    ) -> Result<u32, LedgerViolation> {
        let Some(id) = id else { return Ok(0) };
        let node = self.node(id).ok_or(LedgerViolation::Dangling(id))?;

        if node.entry.checksum() != node.checksum {
            return Err(LedgerViolation::ChecksumMismatch(id));
        }
        let key = &node.entry.digest;
        if lower.is_some_and(|l| key <= l) || upper.is_some_and(|u| key >= u) {
            return Err(LedgerViolation::OutOfOrder(id));
        }

        let left = self.check_subtree(node.left, lower, Some(key))?;
        let right = self.check_subtree(node.right, Some(key), upper)?;
        if left.abs_diff(right) > 1 {
            return Err(LedgerViolation::Unbalanced(id));
        }
        let height = 1 + left.max(right);
        if height != node.height {
            return Err(LedgerViolation::HeightMismatch(id));
        }
        Ok(height)
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0 as usize)
    }

    fn height_of(&self, id: Option<NodeId>) -> u32 {
        id.and_then(|id| self.node(id)).map_or(0, |n| n.height)
    }

    fn balance(&self, id: NodeId) -> i64 {
        self.node(id).map_or(0, |n| {
            i64::from(self.height_of(n.left)) - i64::from(self.height_of(n.right))
        })
    }

    fn refresh_height(&mut self, id: NodeId) {
        let Some((left, right)) = self.node(id).map(|n| (n.left, n.right)) else {
            return;
        };
        let height = 1 + self.height_of(left).max(self.height_of(right));
        if let Some(node) = self.node_mut(id) {
            node.height = height;
        }
    }

    fn alloc(&mut self, entry: LedgerEntry) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        let checksum = entry.checksum();
        self.nodes.push(Node {
            entry,
            checksum,
            height: 1,
            left: None,
            right: None,
        });
        id
    }

    /// Returns the new subtree root and the id holding `entry`.
    fn insert_at(&mut self, at: Option<NodeId>, entry: LedgerEntry) -> (NodeId, NodeId) {
        let Some(id) = at else {
            let id = self.alloc(entry);
            return (id, id);
        };
        let Some((ordering, left, right)) = self
            .node(id)
            .map(|n| (entry.digest.cmp(&n.entry.digest), n.left, n.right))
        else {
            let id = self.alloc(entry);
            return (id, id);
        };

        let inserted = match ordering {
            Ordering::Equal => {
                if let Some(node) = self.node_mut(id) {
                    node.entry.occurrences = node.entry.occurrences.saturating_add(1);
                    node.checksum = node.entry.checksum();
                }
                return (id, id);
            }
            Ordering::Less => {
                let (child, inserted) = self.insert_at(left, entry);
                if let Some(node) = self.node_mut(id) {
                    node.left = Some(child);
                }
                inserted
            }
            Ordering::Greater => {
                let (child, inserted) = self.insert_at(right, entry);
                if let Some(node) = self.node_mut(id) {
                    node.right = Some(child);
                }
                inserted
            }
        };

        self.refresh_height(id);
        (self.rebalance(id), inserted)
    }

    fn rebalance(&mut self, id: NodeId) -> NodeId {
        let balance = self.balance(id);
        let Some((left, right)) = self.node(id).map(|n| (n.left, n.right)) else {
            return id;
        };

        if balance > 1 {
            if let Some(left) = left
                && self.balance(left) < 0
            {
                let rotated = self.rotate_left(left);
                if let Some(node) = self.node_mut(id) {
                    node.left = Some(rotated);
                }
            }
            return self.rotate_right(id);
        }
        if balance < -1 {
            if let Some(right) = right
                && self.balance(right) > 0
            {
                let rotated = self.rotate_right(right);
                if let Some(node) = self.node_mut(id) {
                    node.right = Some(rotated);
                }
            }
            return self.rotate_left(id);
        }
        id
    }

    fn rotate_right(&mut self, id: NodeId) -> NodeId {
        let Some(pivot) = self.node(id).and_then(|n| n.left) else {
            return id;
        };
        let moved = self.node(pivot).and_then(|n| n.right);
        if let Some(node) = self.node_mut(id) {
            node.left = moved;
        }
        if let Some(node) = self.node_mut(pivot) {
            node.right = Some(id);
        }
        self.refresh_height(id);
        self.refresh_height(pivot);
        pivot
    }

    fn rotate_left(&mut self, id: NodeId) -> NodeId {
        let Some(pivot) = self.node(id).and_then(|n| n.right) else {
            return id;
        };
        let moved = self.node(pivot).and_then(|n| n.left);
        if let Some(node) = self.node_mut(id) {
            node.right = moved;
        }
        if let Some(node) = self.node_mut(pivot) {
            node.left = Some(id);
        }
        self.refresh_height(id);
        self.refresh_height(pivot);
        pivot
    }
}
