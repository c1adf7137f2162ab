//! Undo journal for all-or-nothing tree mutations
//!
//! While a transaction is open every node overwrite records the previous
//! value. Rollback replays the log backwards and truncates nodes allocated
//! after the checkpoint. Nested transactions fold into the outermost one.

use super::{LazyMulTree, Node, NodeId, TreeError};

#[derive(Debug, Clone, Default)]
pub(super) struct Journal {
    depth: u32,
    undo: Vec<(NodeId, Node)>,
}

impl Journal {
    pub(super) fn is_active(&self) -> bool {
        self.depth > 0
    }
}

#[derive(Debug, Clone, Copy)]
struct Checkpoint {
    undo_len: usize,
    arena_len: usize,
}

impl LazyMulTree {
    /// Run `op` as a single transaction over the tree.
    ///
    /// If `op` returns `Err`, every node write and allocation it made is undone
    /// before the error is returned.
    pub fn atomically<T, E>(
        &mut self,
        op: impl FnOnce(&mut Self) -> Result<T, E>,
    ) -> Result<T, E> {
        let checkpoint = self.begin();
        match op(self) {
            Ok(value) => {
                self.commit();
                Ok(value)
            }
            Err(err) => {
                self.rollback(checkpoint);
                Err(err)
            }
        }
    }

    pub(super) fn write_node(&mut self, id: NodeId, node: Node) {
        if self.journal.is_active() {
            self.journal.undo.push((id, self.nodes[id.index()]));
        }
        self.nodes[id.index()] = node;
    }

    pub(super) fn alloc_node(&mut self, node: Node) -> Result<NodeId, TreeError> {
        let id = u32::try_from(self.nodes.len()).map_err(|_| TreeError::ArenaExhausted)?;
        self.nodes.push(node);
        Ok(NodeId(id))
    }

    fn begin(&mut self) -> Checkpoint {
        self.journal.depth += 1;
        Checkpoint {
            undo_len: self.journal.undo.len(),
            arena_len: self.nodes.len(),
        }
    }

    fn commit(&mut self) {
        self.journal.depth -= 1;
        if self.journal.depth == 0 {
            self.journal.undo.clear();
        }
    }

    fn rollback(&mut self, checkpoint: Checkpoint) {
        while self.journal.undo.len() > checkpoint.undo_len {
            if let Some((id, previous)) = self.journal.undo.pop() {
                self.nodes[id.index()] = previous;
            }
        }
        self.nodes.truncate(checkpoint.arena_len);
        self.journal.depth -= 1;
        if self.journal.depth == 0 {
            self.journal.undo.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::fixed::WAD;
    use crate::tree::{LazyMulTree, TreeError, MAX_FACTOR};

    #[test]
    fn test_failed_transaction_restores_state() {
        let mut tree = LazyMulTree::with_size(16).unwrap();
        tree.apply_range_factor(3, 9, 2 * WAD).unwrap();
        let before = tree.state_digest();
        let nodes_before = tree.node_count();

        let result: Result<(), TreeError> = tree.atomically(|t| {
            t.apply_range_factor(0, 5, 3 * WAD)?;
            t.apply_range_factor(11, 12, WAD / 2)?;
            t.apply_range_factor(0, 16, WAD)
        });

        assert_eq!(result, Err(TreeError::OutOfBounds { hi: 16, size: 16 }));
        assert_eq!(tree.state_digest(), before);
        assert_eq!(tree.node_count(), nodes_before);
    }

    #[test]
    fn test_committed_transaction_keeps_writes() {
        let mut tree = LazyMulTree::with_size(4).unwrap();
        tree.atomically(|t| {
            t.apply_range_factor(0, 1, 2 * WAD)?;
            t.apply_range_factor(2, 3, 3 * WAD)
        })
        .unwrap();
        assert_eq!(tree.total_sum().unwrap(), 10 * WAD);
        assert!(!tree.journal.is_active());
        assert!(tree.journal.undo.is_empty());
    }

    #[test]
    fn test_overflow_mid_update_rolls_back() {
        let mut tree = LazyMulTree::with_size(4).unwrap();
        // Drive bin 3 close to the u128 ceiling (1e20 units), then overflow it
        // inside a partial update that has already scaled bin 1.
        for _ in 0..10 {
            tree.apply_range_factor(3, 3, MAX_FACTOR).unwrap();
        }
        let before = tree.state_digest();
        let err = tree.apply_range_factor(1, 3, MAX_FACTOR).unwrap_err();
        assert!(matches!(err, TreeError::Math(_)));
        assert_eq!(tree.state_digest(), before);
    }
}
