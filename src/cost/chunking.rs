//! Chunk planning for large trades
//!
//! A trade of quantity `q` moves range weights by `e^(q/α)`. Each applied
//! step must stay inside the tree's factor bounds and the exponential's safe
//! domain, so trades are split into chunks of at most `α · MAX_CHUNK_EXPONENT`.
//! The chunk size depends on `α` alone, so the count is known up front.

use super::CostError;
use crate::fixed::{wmul, WAD};

/// Largest `quantity / α` priced in one step. e^4 ≈ 54.6 and e^-4 ≈ 0.018
/// both sit inside `[MIN_FACTOR, MAX_FACTOR]`.
pub const MAX_CHUNK_EXPONENT: u128 = 4 * WAD;

/// Upper bound on the number of steps a single trade may take.
pub const MAX_CHUNKS_PER_TRADE: u64 = 1_000;

/// Largest quantity that can be applied in one step for liquidity `alpha`.
pub fn max_chunk_quantity(alpha: u128) -> Result<u128, CostError> {
    if alpha == 0 {
        return Err(CostError::ZeroLiquidity);
    }
    Ok(wmul(alpha, MAX_CHUNK_EXPONENT)?)
}

/// Sequence of chunk quantities summing to the requested quantity.
///
/// Yields full chunks first and the remainder last.
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    remaining: u128,
    max_chunk: u128,
    chunks: u64,
}

impl ChunkPlan {
    /// Plan `quantity` for liquidity `alpha`.
    pub fn new(quantity: u128, alpha: u128) -> Result<Self, CostError> {
        let max_chunk = max_chunk_quantity(alpha)?;
        if quantity == 0 {
            return Err(CostError::ZeroQuantity);
        }

        let required = quantity.div_ceil(max_chunk);
        if required > MAX_CHUNKS_PER_TRADE as u128 {
            return Err(CostError::TooManyChunks {
                required,
                max: MAX_CHUNKS_PER_TRADE,
            });
        }

        Ok(Self {
            remaining: quantity,
            max_chunk,
            chunks: required as u64,
        })
    }

    /// Total number of chunks in the plan.
    pub fn chunk_count(&self) -> u64 {
        self.chunks
    }

    /// Quantity of every chunk except possibly the last.
    pub fn max_chunk(&self) -> u128 {
        self.max_chunk
    }
}

impl Iterator for ChunkPlan {
    type Item = u128;

    fn next(&mut self) -> Option<u128> {
        if self.remaining == 0 {
            return None;
        }
        let chunk = self.remaining.min(self.max_chunk);
        self.remaining -= chunk;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.remaining.div_ceil(self.max_chunk) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for ChunkPlan {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_trade_is_single_chunk() {
        let plan = ChunkPlan::new(3 * WAD, 100 * WAD).unwrap();
        assert_eq!(plan.chunk_count(), 1);
        assert_eq!(plan.collect::<Vec<_>>(), vec![3 * WAD]);
    }

    #[test]
    fn test_large_trade_splits_with_remainder() {
        // alpha = 10 -> max chunk 40
        let plan = ChunkPlan::new(100 * WAD, 10 * WAD).unwrap();
        assert_eq!(plan.max_chunk(), 40 * WAD);
        assert_eq!(plan.chunk_count(), 3);
        assert_eq!(plan.len(), 3);
        assert_eq!(
            plan.collect::<Vec<_>>(),
            vec![40 * WAD, 40 * WAD, 20 * WAD]
        );
    }

    #[test]
    fn test_exact_multiple_has_no_remainder() {
        let chunks: Vec<_> = ChunkPlan::new(80 * WAD, 10 * WAD).unwrap().collect();
        assert_eq!(chunks, vec![40 * WAD, 40 * WAD]);
    }

    #[test]
    fn test_plan_rejections() {
        assert!(matches!(
            ChunkPlan::new(WAD, 0),
            Err(CostError::ZeroLiquidity)
        ));
        assert!(matches!(
            ChunkPlan::new(0, WAD),
            Err(CostError::ZeroQuantity)
        ));
        // one raw unit of liquidity prices 4 raw units per chunk
        assert!(matches!(
            ChunkPlan::new(WAD, 1),
            Err(CostError::TooManyChunks { .. })
        ));
        assert!(matches!(
            ChunkPlan::new(4_001 * WAD, WAD),
            Err(CostError::TooManyChunks { required: 1_001, .. })
        ));
    }
}
