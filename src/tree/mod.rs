//! Lazy multiplicative range tree
//!
//! Segment tree over bins `[0, size)` where each leaf holds a positive weight.
//! Supports O(log size) range-multiply and range-sum.
//!
//! Sparse representation: nodes live in an arena addressed by [`NodeId`];
//! an absent child stands for a subtree whose bins all carry the uniform
//! default weight (one WAD) times the pending factors above it. Nodes are
//! only materialized when a write has to descend past them.

mod journal;
mod lazy;
mod node;

pub use node::{Node, NodeId, NodeSpan};

use thiserror::Error;
use tracing::debug;

use crate::fixed::{wmul, wmul_nearest, MathError, WAD};
use journal::Journal;

/// Smallest factor a single `apply_range_factor` call accepts (0.01).
pub const MIN_FACTOR: u128 = WAD / 100;

/// Largest factor a single `apply_range_factor` call accepts (100).
pub const MAX_FACTOR: u128 = 100 * WAD;

/// Lower edge of the band a pending factor may occupy before it is pushed down.
///
/// The band strictly contains `[MIN_FACTOR, MAX_FACTOR]`, so once an
/// out-of-band combination is flushed the bare factor that replaces it is
/// always in band. The post-combine flush in covered-node scaling only fires
/// if the factor bounds are widened past the band.
pub const PENDING_FLUSH_LOW: u128 = WAD / 1_000;

/// Upper edge of the band a pending factor may occupy before it is pushed down.
///
/// See [`PENDING_FLUSH_LOW`].
pub const PENDING_FLUSH_HIGH: u128 = 1_000 * WAD;

/// Largest supported bin count; keeps `lo + hi` inside `u32`.
pub const MAX_TREE_SIZE: u32 = u32::MAX / 2;

/// Errors raised by tree operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// `init` called twice.
    #[error("tree already initialized")]
    AlreadyInitialized,

    /// Operation on a tree that was never initialized.
    #[error("tree not initialized")]
    Uninitialized,

    /// `init(0)`.
    #[error("tree size must be > 0")]
    ZeroSize,

    /// Requested size above [`MAX_TREE_SIZE`].
    #[error("tree size {size} exceeds maximum {max}")]
    SizeTooLarge {
        /// Requested size.
        size: u32,
        /// Largest accepted size.
        max: u32,
    },

    /// Seed array length differs from the tree size.
    #[error("expected {expected} seed weights, got {actual}")]
    WeightCountMismatch {
        /// Tree size.
        expected: usize,
        /// Supplied weights.
        actual: usize,
    },

    /// Seed weight of zero.
    #[error("seed weight at bin {index} must be positive")]
    NonPositiveWeight {
        /// Offending bin.
        index: usize,
    },

    /// Seeding attempted while a transaction is open.
    #[error("cannot reseed inside an open transaction")]
    TransactionActive,

    /// `lo > hi`.
    #[error("inverted range [{lo}, {hi}]")]
    InvertedRange {
        /// Requested lower bin.
        lo: u32,
        /// Requested upper bin.
        hi: u32,
    },

    /// `hi >= size`.
    #[error("bin {hi} out of bounds for size {size}")]
    OutOfBounds {
        /// Requested upper bin.
        hi: u32,
        /// Tree size.
        size: u32,
    },

    /// Factor outside `[MIN_FACTOR, MAX_FACTOR]`.
    #[error("factor {factor} outside [{min}, {max}]")]
    FactorOutOfBounds {
        /// Requested factor (WAD).
        factor: u128,
        /// [`MIN_FACTOR`].
        min: u128,
        /// [`MAX_FACTOR`].
        max: u128,
    },

    /// Node handles exhausted.
    #[error("node arena exhausted")]
    ArenaExhausted,

    /// Fixed-point failure (overflow of a sum or pending factor).
    #[error("arithmetic limit: {0}")]
    Math(#[from] MathError),
}

/// Dynamically materialized segment tree with lazy multiplicative propagation.
#[derive(Debug, Clone, Default)]
pub struct LazyMulTree {
    /// Number of bins; 0 until initialized.
    size: u32,

    /// Root handle (`NodeId::NONE` until initialized).
    root: NodeId,

    /// Node arena. Slot 0 is a sentinel so handle 0 can mean "absent";
    /// the arena length doubles as the allocation counter.
    nodes: Vec<Node>,

    /// Undo log for all-or-nothing mutations.
    journal: Journal,
}

impl LazyMulTree {
    /// Create an uninitialized tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and initialize a tree with `size` uniform bins.
    pub fn with_size(size: u32) -> Result<Self, TreeError> {
        let mut tree = Self::new();
        tree.init(size)?;
        Ok(tree)
    }

    /// Initialize with `size` bins of uniform weight. Only the root is allocated.
    pub fn init(&mut self, size: u32) -> Result<(), TreeError> {
        if self.is_initialized() {
            return Err(TreeError::AlreadyInitialized);
        }
        if size == 0 {
            return Err(TreeError::ZeroSize);
        }
        if size > MAX_TREE_SIZE {
            return Err(TreeError::SizeTooLarge {
                size,
                max: MAX_TREE_SIZE,
            });
        }

        self.nodes = vec![Node::with_sum(0), Node::with_sum(NodeSpan::root(size).uniform_weight())];
        self.root = NodeId(1);
        self.size = size;
        debug!(size, "initialized range tree");
        Ok(())
    }

    /// Whether `init` has succeeded.
    pub fn is_initialized(&self) -> bool {
        self.root.is_some()
    }

    /// Number of bins.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Number of materialized nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }

    /// Replace the implicit uniform prior with explicit per-bin weights.
    ///
    /// Builds every node bottom-up in one pass. The tree is left untouched on error.
    pub fn seed_with_factors(&mut self, weights: &[u128]) -> Result<(), TreeError> {
        self.ensure_initialized()?;
        if self.journal.is_active() {
            return Err(TreeError::TransactionActive);
        }
        if weights.len() != self.size as usize {
            return Err(TreeError::WeightCountMismatch {
                expected: self.size as usize,
                actual: weights.len(),
            });
        }
        if let Some(index) = weights.iter().position(|&w| w == 0) {
            return Err(TreeError::NonPositiveWeight { index });
        }

        let mut nodes = Vec::with_capacity(2 * weights.len());
        nodes.push(Node::with_sum(0));
        let root = build_seeded(&mut nodes, NodeSpan::root(self.size), weights)?;

        self.nodes = nodes;
        self.root = root;
        debug!(size = self.size, nodes = self.node_count(), "seeded range tree");
        Ok(())
    }

    /// Multiply every bin in `[lo, hi]` by `factor`.
    ///
    /// `factor` must lie in `[MIN_FACTOR, MAX_FACTOR]`; larger moves have to be
    /// split by the caller. All-or-nothing.
    pub fn apply_range_factor(&mut self, lo: u32, hi: u32, factor: u128) -> Result<(), TreeError> {
        self.check_range(lo, hi)?;
        if !(MIN_FACTOR..=MAX_FACTOR).contains(&factor) {
            return Err(TreeError::FactorOutOfBounds {
                factor,
                min: MIN_FACTOR,
                max: MAX_FACTOR,
            });
        }

        let (root, span) = (self.root, NodeSpan::root(self.size));
        self.atomically(|tree| tree.apply_at(root, span, lo, hi, factor))
    }

    /// Sum of bin weights over `[lo, hi]`. Does not mutate.
    pub fn range_sum(&self, lo: u32, hi: u32) -> Result<u128, TreeError> {
        self.check_range(lo, hi)?;
        Ok(self.sum_at(self.root, NodeSpan::root(self.size), lo, hi, WAD)?)
    }

    /// Partition function: sum over all bins.
    pub fn total_sum(&self) -> Result<u128, TreeError> {
        self.ensure_initialized()?;
        Ok(self.node(self.root).sum)
    }

    /// Current weight of a single bin.
    pub fn leaf_weight(&self, bin: u32) -> Result<u128, TreeError> {
        self.range_sum(bin, bin)
    }

    /// Weights of every bin, in order. O(size).
    pub fn leaf_weights(&self) -> Result<Vec<u128>, TreeError> {
        self.ensure_initialized()?;
        let mut out = Vec::with_capacity(self.size as usize);
        self.collect_weights(self.root, NodeSpan::root(self.size), WAD, &mut out)?;
        Ok(out)
    }

    /// Push every pending factor touching `[lo, hi]` down to the leaves it covers.
    ///
    /// Afterwards each flushed node's children sum exactly to the node. Work is
    /// proportional to the region that carries pending factors.
    pub fn propagate_lazy(&mut self, lo: u32, hi: u32) -> Result<(), TreeError> {
        self.check_range(lo, hi)?;
        let (root, span) = (self.root, NodeSpan::root(self.size));
        self.atomically(|tree| tree.flush_at(root, span, lo, hi))
    }

    /// BLAKE3 digest of the full tree state (arena order included).
    pub fn state_digest(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.size.to_le_bytes());
        hasher.update(&self.root.0.to_le_bytes());
        for node in &self.nodes {
            hasher.update(&node.sum.to_le_bytes());
            hasher.update(&node.pending.to_le_bytes());
            hasher.update(&node.left.0.to_le_bytes());
            hasher.update(&node.right.0.to_le_bytes());
        }
        hasher.finalize()
    }

    /// Visit every materialized node with its span, parents before children.
    pub fn for_each_node(&self, mut visit: impl FnMut(NodeSpan, &Node)) {
        if !self.is_initialized() {
            return;
        }
        let mut stack = vec![(self.root, NodeSpan::root(self.size))];
        while let Some((id, span)) = stack.pop() {
            let node = self.node(id);
            visit(span, &node);
            if span.is_leaf() {
                continue;
            }
            let (left_span, right_span) = span.children();
            if node.right.is_some() {
                stack.push((node.right, right_span));
            }
            if node.left.is_some() {
                stack.push((node.left, left_span));
            }
        }
    }

    fn ensure_initialized(&self) -> Result<(), TreeError> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(TreeError::Uninitialized)
        }
    }

    fn check_range(&self, lo: u32, hi: u32) -> Result<(), TreeError> {
        self.ensure_initialized()?;
        if lo > hi {
            return Err(TreeError::InvertedRange { lo, hi });
        }
        if hi >= self.size {
            return Err(TreeError::OutOfBounds {
                hi,
                size: self.size,
            });
        }
        Ok(())
    }

    fn apply_at(
        &mut self,
        id: NodeId,
        span: NodeSpan,
        lo: u32,
        hi: u32,
        factor: u128,
    ) -> Result<(), TreeError> {
        if !span.overlaps(lo, hi) {
            return Ok(());
        }
        if span.is_covered_by(lo, hi) {
            return self.scale_covered(id, span, factor);
        }

        self.push_down(id, span)?;
        let node = self.node(id);
        let (left_span, right_span) = span.children();
        self.apply_at(node.left, left_span, lo, hi, factor)?;
        self.apply_at(node.right, right_span, lo, hi, factor)?;
        self.refresh_sum(id)
    }

    fn sum_at(
        &self,
        id: NodeId,
        span: NodeSpan,
        lo: u32,
        hi: u32,
        inherited: u128,
    ) -> Result<u128, MathError> {
        if !span.overlaps(lo, hi) {
            return Ok(0);
        }
        if !id.is_some() {
            return wmul(span.overlap_len(lo, hi) as u128 * WAD, inherited);
        }

        let node = self.node(id);
        if span.is_covered_by(lo, hi) {
            return wmul(node.sum, inherited);
        }

        let carried = wmul_nearest(inherited, node.pending)?;
        let (left_span, right_span) = span.children();
        let left = self.sum_at(node.left, left_span, lo, hi, carried)?;
        let right = self.sum_at(node.right, right_span, lo, hi, carried)?;
        left.checked_add(right)
            .ok_or(MathError::Overflow("range_sum"))
    }

    fn collect_weights(
        &self,
        id: NodeId,
        span: NodeSpan,
        inherited: u128,
        out: &mut Vec<u128>,
    ) -> Result<(), MathError> {
        if !id.is_some() {
            let weight = wmul(WAD, inherited)?;
            out.extend(std::iter::repeat(weight).take(span.len() as usize));
            return Ok(());
        }

        let node = self.node(id);
        if span.is_leaf() {
            out.push(wmul(node.sum, inherited)?);
            return Ok(());
        }

        let carried = wmul_nearest(inherited, node.pending)?;
        let (left_span, right_span) = span.children();
        self.collect_weights(node.left, left_span, carried, out)?;
        self.collect_weights(node.right, right_span, carried, out)
    }

    fn flush_at(&mut self, id: NodeId, span: NodeSpan, lo: u32, hi: u32) -> Result<(), TreeError> {
        if !span.overlaps(lo, hi) || span.is_leaf() {
            return Ok(());
        }
        let node = self.node(id);
        if !node.has_pending() && !node.has_children() {
            return Ok(());
        }

        self.push_down(id, span)?;
        let node = self.node(id);
        let (left_span, right_span) = span.children();
        self.flush_at(node.left, left_span, lo, hi)?;
        self.flush_at(node.right, right_span, lo, hi)
    }
}

fn build_seeded(nodes: &mut Vec<Node>, span: NodeSpan, weights: &[u128]) -> Result<NodeId, TreeError> {
    let node = if span.is_leaf() {
        Node::with_sum(weights[span.lo as usize])
    } else {
        let (left_span, right_span) = span.children();
        let left = build_seeded(nodes, left_span, weights)?;
        let right = build_seeded(nodes, right_span, weights)?;
        let sum = nodes[left.index()]
            .sum
            .checked_add(nodes[right.index()].sum)
            .ok_or(MathError::Overflow("seed_with_factors"))?;
        Node {
            sum,
            pending: WAD,
            left,
            right,
        }
    };

    let id = u32::try_from(nodes.len()).map_err(|_| TreeError::ArenaExhausted)?;
    nodes.push(node);
    Ok(NodeId(id))
}
