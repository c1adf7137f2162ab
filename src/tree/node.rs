//! Tree nodes and their implicit spans
//!
//! Span = bin interval [lo, hi] ⊆ [0, size)
//! Children computed via midpoint: m = ⌊(lo + hi) / 2⌋
//!   Left child: [lo, m]
//!   Right child: [m+1, hi]
//!
//! Spans are never stored in the arena; they are recomputed during descent.

use std::fmt;

use crate::fixed::WAD;

/// Arena handle. `NodeId::NONE` marks an unallocated child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Absent node (implicitly uniform subtree).
    pub const NONE: NodeId = NodeId(0);

    /// Whether this handle refers to an allocated node.
    #[inline]
    pub fn is_some(self) -> bool {
        self.0 != 0
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Materialized node state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Node {
    /// Aggregate weight over the span, including `pending`.
    pub sum: u128,
    /// Factor owed to the children (WAD, identity = `WAD`).
    pub pending: u128,
    /// Left child handle.
    pub left: NodeId,
    /// Right child handle.
    pub right: NodeId,
}

impl Node {
    /// Node carrying `sum` with no pending factor and no children.
    pub fn with_sum(sum: u128) -> Self {
        Self {
            sum,
            pending: WAD,
            left: NodeId::NONE,
            right: NodeId::NONE,
        }
    }

    /// Whether a non-identity factor is waiting to be pushed down.
    #[inline]
    pub fn has_pending(&self) -> bool {
        self.pending != WAD
    }

    /// Whether either child has been materialized.
    #[inline]
    pub fn has_children(&self) -> bool {
        self.left.is_some() || self.right.is_some()
    }
}

/// Inclusive bin interval covered by a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeSpan {
    /// First bin (inclusive).
    pub lo: u32,
    /// Last bin (inclusive).
    pub hi: u32,
}

impl NodeSpan {
    /// Root span for a tree of `size` bins.
    pub fn root(size: u32) -> Self {
        debug_assert!(size > 0);
        Self { lo: 0, hi: size - 1 }
    }

    /// Check if leaf (single bin)
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.lo == self.hi
    }

    /// Number of bins covered.
    #[inline]
    pub fn len(&self) -> u32 {
        self.hi - self.lo + 1
    }

    /// Midpoint split. `lo + hi` stays below 2^32 because size ≤ u32::MAX / 2.
    #[inline]
    pub fn midpoint(&self) -> u32 {
        (self.lo + self.hi) / 2
    }

    /// Get children via midpoint split
    pub fn children(&self) -> (NodeSpan, NodeSpan) {
        debug_assert!(!self.is_leaf(), "Leaf has no children");

        let mid = self.midpoint();
        (
            NodeSpan { lo: self.lo, hi: mid },
            NodeSpan {
                lo: mid + 1,
                hi: self.hi,
            },
        )
    }

    /// Whether `[lo, hi]` intersects this span.
    #[inline]
    pub fn overlaps(&self, lo: u32, hi: u32) -> bool {
        lo <= self.hi && hi >= self.lo
    }

    /// Whether this span lies entirely inside `[lo, hi]`.
    #[inline]
    pub fn is_covered_by(&self, lo: u32, hi: u32) -> bool {
        lo <= self.lo && self.hi <= hi
    }

    /// Number of bins shared with `[lo, hi]`.
    pub fn overlap_len(&self, lo: u32, hi: u32) -> u32 {
        if !self.overlaps(lo, hi) {
            return 0;
        }
        self.hi.min(hi) - self.lo.max(lo) + 1
    }

    /// Implicit uniform weight of this span (one WAD per bin).
    #[inline]
    pub fn uniform_weight(&self) -> u128 {
        self.len() as u128 * WAD
    }
}

impl fmt::Display for NodeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_leaf() {
            write!(f, "[{}]", self.lo)
        } else {
            write!(f, "[{}, {}]", self.lo, self.hi)
        }
    }
}
