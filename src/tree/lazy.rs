//! Lazy propagation: covered-node scaling, push-down, and rebalancing

use std::cmp::Ordering;

use tracing::trace;

use super::{LazyMulTree, Node, NodeId, NodeSpan, TreeError, PENDING_FLUSH_HIGH, PENDING_FLUSH_LOW};
use crate::fixed::{wmul, wmul_nearest, MathError, WAD};

#[inline]
fn within_flush_band(pending: u128) -> bool {
    (PENDING_FLUSH_LOW..=PENDING_FLUSH_HIGH).contains(&pending)
}

impl LazyMulTree {
    #[inline]
    pub(super) fn node(&self, id: NodeId) -> Node {
        self.nodes[id.index()]
    }

    /// Scale a node whose whole span lies inside the update range.
    ///
    /// The factor is folded into `pending` instead of recursing. A pending
    /// factor that would leave the flush band is pushed down first, and a
    /// freshly combined one that still leaves it is pushed down right after.
    /// With the current factor bounds the second flush never fires; see
    /// [`PENDING_FLUSH_LOW`].
    pub(super) fn scale_covered(
        &mut self,
        id: NodeId,
        span: NodeSpan,
        factor: u128,
    ) -> Result<(), TreeError> {
        if span.is_leaf() {
            let mut node = self.node(id);
            node.sum = wmul(node.sum, factor)?;
            self.write_node(id, node);
            return Ok(());
        }

        let existing = self.node(id);
        if existing.has_pending() {
            let combined = wmul_nearest(existing.pending, factor)?;
            if !within_flush_band(combined) {
                trace!(%span, pending = existing.pending, "flushing pending factor before combine");
                self.push_down(id, span)?;
            }
        }

        let mut node = self.node(id);
        node.sum = wmul(node.sum, factor)?;
        node.pending = wmul_nearest(node.pending, factor)?;
        self.write_node(id, node);

        if !within_flush_band(node.pending) {
            trace!(%span, pending = node.pending, "pending factor left flush band");
            self.push_down(id, span)?;
        }
        Ok(())
    }

    /// Deliver this node's pending factor to both children.
    ///
    /// Absent children are materialized at the uniform default first. The
    /// children are then rebalanced so they sum exactly to the parent.
    pub(super) fn push_down(&mut self, id: NodeId, span: NodeSpan) -> Result<(), TreeError> {
        debug_assert!(!span.is_leaf(), "leaves carry no pending factor");

        let mut node = self.node(id);
        let factor = node.pending;
        let (left_span, right_span) = span.children();
        node.left = self.deliver(node.left, left_span, factor)?;
        node.right = self.deliver(node.right, right_span, factor)?;
        node.pending = WAD;
        self.write_node(id, node);
        self.rebalance_children(id)?;

        for (child, child_span) in [(node.left, left_span), (node.right, right_span)] {
            if !child_span.is_leaf() && !within_flush_band(self.node(child).pending) {
                self.push_down(child, child_span)?;
            }
        }
        Ok(())
    }

    fn deliver(&mut self, child: NodeId, span: NodeSpan, factor: u128) -> Result<NodeId, TreeError> {
        let (id, mut node) = if child.is_some() {
            (child, self.node(child))
        } else {
            let node = Node::with_sum(span.uniform_weight());
            let id = self.alloc_node(node)?;
            trace!(%span, id = id.0, "materialized node");
            (id, node)
        };

        if factor != WAD {
            node.sum = wmul(node.sum, factor)?;
            if !span.is_leaf() {
                node.pending = wmul_nearest(node.pending, factor)?;
            }
            self.write_node(id, node);
        }
        Ok(id)
    }

    /// Make both children sum exactly to the parent.
    ///
    /// Independent per-child rounding leaves the children a few units off.
    /// A shortfall goes entirely to the right child. A surplus comes out of
    /// the right child first and spills into the left child only when the
    /// right child cannot absorb all of it.
    pub(super) fn rebalance_children(&mut self, id: NodeId) -> Result<(), TreeError> {
        let parent = self.node(id);
        let mut left = self.node(parent.left);
        let mut right = self.node(parent.right);
        let children_sum = left
            .sum
            .checked_add(right.sum)
            .ok_or(MathError::Overflow("rebalance_children"))?;

        match children_sum.cmp(&parent.sum) {
            Ordering::Equal => return Ok(()),
            Ordering::Less => {
                right.sum += parent.sum - children_sum;
            }
            Ordering::Greater => {
                let surplus = children_sum - parent.sum;
                let from_right = surplus.min(right.sum);
                right.sum -= from_right;
                left.sum -= surplus - from_right;
            }
        }

        self.write_node(parent.left, left);
        self.write_node(parent.right, right);
        Ok(())
    }

    /// Recompute an internal node's sum from its children.
    pub(super) fn refresh_sum(&mut self, id: NodeId) -> Result<(), TreeError> {
        let mut node = self.node(id);
        let left = self.node(node.left).sum;
        let right = self.node(node.right).sum;
        node.sum = left
            .checked_add(right)
            .ok_or(MathError::Overflow("refresh_sum"))?;
        self.write_node(id, node);
        Ok(())
    }
}
