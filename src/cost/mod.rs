//! LMSR cost engine over the range tree
//!
//! The tree's total weight `Z = Σ exp(q_i / α)` is the partition function.
//! Buying `x` uniformly over a bin range multiplies every weight in the range
//! by `f = exp(x / α)`, and the fair cost is `α · ln(Z_after / Z_before)`.
//!
//! Quotes are pure reads; [`apply_trade`] is the only function that mutates,
//! and it does so inside a tree transaction so a failed chunk undoes the
//! whole trade.

mod chunking;

pub use chunking::{max_chunk_quantity, ChunkPlan, MAX_CHUNKS_PER_TRADE, MAX_CHUNK_EXPONENT};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use crate::fixed::{
    exp_wad, ln_wad, mul_div, wdiv, wdiv_up, wmul, wmul_up, MathError, Rounding, WAD,
};
use crate::tree::{LazyMulTree, TreeError};

/// Errors surfaced by the cost engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CostError {
    /// Liquidity parameter of zero.
    #[error("liquidity parameter must be > 0")]
    ZeroLiquidity,

    /// Trade or budget of zero.
    #[error("quantity must be > 0")]
    ZeroQuantity,

    /// Range carries no weight, so no factor can reach the target.
    #[error("range [{lo}, {hi}] carries no weight")]
    EmptyRangeWeight {
        /// First bin.
        lo: u32,
        /// Last bin.
        hi: u32,
    },

    /// Requested proceeds exceed what selling the whole range can return.
    #[error("proceeds {proceeds} cannot be realized from this range")]
    InfeasibleProceeds {
        /// Requested proceeds (WAD).
        proceeds: u128,
    },

    /// Trade would need more chunks than a single call may apply.
    #[error("trade needs {required} chunks, limit is {max}")]
    TooManyChunks {
        /// Chunks the trade would need.
        required: u128,
        /// [`MAX_CHUNKS_PER_TRADE`].
        max: u64,
    },

    /// A ratio of partition functions that must be at least one fell below it.
    #[error("ratio {ratio} is below one; tree sums are inconsistent")]
    RatioBelowOne {
        /// Offending ratio (WAD).
        ratio: u128,
    },

    /// Tree rejected the read or update.
    #[error("tree error: {0}")]
    Tree(#[from] TreeError),

    /// Fixed-point failure.
    #[error("math error: {0}")]
    Math(#[from] MathError),
}

/// Direction of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TradeSide {
    /// Open or increase a position; trader pays.
    Buy,
    /// Decrease or close a position; trader receives.
    Sell,
}

/// Outcome of [`apply_trade`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Fill {
    /// Trade direction.
    pub side: TradeSide,
    /// Quantity traded (WAD).
    pub quantity: u128,
    /// Cost paid for buys, proceeds received for sells (WAD).
    pub amount: u128,
    /// Number of range-multiply steps applied.
    pub chunks: u64,
}

/// Priced single step.
#[derive(Debug, Clone, Copy)]
struct ChunkStep {
    factor: u128,
    range_after: u128,
    total_after: u128,
    amount: u128,
}

/// Cost of buying `quantity` over bins `[lo, hi]` (open or increase).
pub fn cost_of_buy(
    tree: &LazyMulTree,
    lo: u32,
    hi: u32,
    quantity: u128,
    alpha: u128,
) -> Result<u128, CostError> {
    quote(tree, lo, hi, TradeSide::Buy, quantity, alpha)
}

/// Proceeds of selling `quantity` over bins `[lo, hi]` (decrease or close).
pub fn proceeds_of_sell(
    tree: &LazyMulTree,
    lo: u32,
    hi: u32,
    quantity: u128,
    alpha: u128,
) -> Result<u128, CostError> {
    quote(tree, lo, hi, TradeSide::Sell, quantity, alpha)
}

/// Quantity that `budget` buys over `[lo, hi]`, rounded down.
///
/// Solves `Z · e^(budget/α) = Z − S + S·f` for `f` and returns `α · ln f`.
pub fn quantity_from_cost(
    tree: &LazyMulTree,
    lo: u32,
    hi: u32,
    budget: u128,
    alpha: u128,
) -> Result<u128, CostError> {
    let (range, total) = target_inputs(tree, lo, hi, budget, alpha)?;

    let growth = exp_wad(wdiv(budget, alpha)?)?;
    let lift = mul_div(total, growth.saturating_sub(WAD), range, Rounding::Down)?;
    let factor = WAD
        .checked_add(lift)
        .ok_or(MathError::Overflow("quantity_from_cost"))?;

    Ok(wmul(alpha, log_ratio(factor)?)?)
}

/// Quantity that must be sold over `[lo, hi]` to receive `proceeds`, rounded up.
///
/// Solves `Z · e^(-proceeds/α) = Z − S + S·f` for `f ∈ (0, 1)` and returns
/// `α · ln(1/f)`.
pub fn quantity_from_proceeds(
    tree: &LazyMulTree,
    lo: u32,
    hi: u32,
    proceeds: u128,
    alpha: u128,
) -> Result<u128, CostError> {
    let (range, total) = target_inputs(tree, lo, hi, proceeds, alpha)?;

    let shrink = wdiv(WAD, exp_wad(wdiv(proceeds, alpha)?)?)?;
    let drop = mul_div(total, WAD.saturating_sub(shrink), range, Rounding::Up)?;
    if drop >= WAD {
        return Err(CostError::InfeasibleProceeds { proceeds });
    }

    let ln_factor = ln_wad(WAD - drop)?;
    Ok(wmul_up(alpha, ln_factor.unsigned_abs())?)
}

/// Execute a trade: price and apply each chunk against the live tree.
///
/// Every chunk re-reads the range and total sums, so costs accumulate against
/// the evolving partition function. On error no chunk survives.
pub fn apply_trade(
    tree: &mut LazyMulTree,
    lo: u32,
    hi: u32,
    side: TradeSide,
    quantity: u128,
    alpha: u128,
) -> Result<Fill, CostError> {
    let plan = ChunkPlan::new(quantity, alpha)?;
    let chunks = plan.chunk_count();
    debug!(lo, hi, ?side, quantity, chunks, "applying trade");

    let amount = tree.atomically(|tree| {
        let mut amount = 0u128;
        for chunk in plan {
            let range = tree.range_sum(lo, hi)?;
            let total = tree.total_sum()?;
            let step = price_chunk(range, total, side, chunk, alpha)?;
            tree.apply_range_factor(lo, hi, step.factor)?;
            amount = amount
                .checked_add(step.amount)
                .ok_or(MathError::Overflow("apply_trade"))?;
            trace!(chunk, factor = step.factor, step_amount = step.amount, "applied chunk");
        }
        Ok::<_, CostError>(amount)
    })?;

    Ok(Fill {
        side,
        quantity,
        amount,
        chunks,
    })
}

fn quote(
    tree: &LazyMulTree,
    lo: u32,
    hi: u32,
    side: TradeSide,
    quantity: u128,
    alpha: u128,
) -> Result<u128, CostError> {
    let plan = ChunkPlan::new(quantity, alpha)?;
    let mut range = tree.range_sum(lo, hi)?;
    let mut total = tree.total_sum()?;

    let mut amount = 0u128;
    for chunk in plan {
        let step = price_chunk(range, total, side, chunk, alpha)?;
        amount = amount
            .checked_add(step.amount)
            .ok_or(MathError::Overflow("quote"))?;
        range = step.range_after;
        total = step.total_after;
    }
    Ok(amount)
}

/// Factor equivalent to trading `quantity` (at most one chunk) with liquidity `alpha`.
fn chunk_factor(side: TradeSide, quantity: u128, alpha: u128) -> Result<u128, CostError> {
    let growth = exp_wad(wdiv(quantity, alpha)?)?;
    Ok(match side {
        TradeSide::Buy => growth,
        // rounded up so a sell never removes more weight than it pays for
        TradeSide::Sell => wdiv_up(WAD, growth)?,
    })
}

fn price_chunk(
    range: u128,
    total: u128,
    side: TradeSide,
    quantity: u128,
    alpha: u128,
) -> Result<ChunkStep, CostError> {
    let factor = chunk_factor(side, quantity, alpha)?;
    let range_after = wmul(range, factor)?;
    // range_sum may overshoot the root sum by rounding units; the rest of
    // the domain never carries negative weight
    let rest = total.saturating_sub(range);
    let total_after = rest
        .checked_add(range_after)
        .ok_or(MathError::Overflow("post-trade total"))?;

    let amount = match side {
        TradeSide::Buy => {
            let ratio = wdiv_up(total_after, total)?;
            wmul_up(alpha, log_ratio(ratio)?)?
        }
        TradeSide::Sell => {
            let ratio = wdiv(total, total_after)?;
            wmul(alpha, log_ratio(ratio)?)?
        }
    };

    Ok(ChunkStep {
        factor,
        range_after,
        total_after,
        amount,
    })
}

fn target_inputs(
    tree: &LazyMulTree,
    lo: u32,
    hi: u32,
    target: u128,
    alpha: u128,
) -> Result<(u128, u128), CostError> {
    if alpha == 0 {
        return Err(CostError::ZeroLiquidity);
    }
    if target == 0 {
        return Err(CostError::ZeroQuantity);
    }
    let range = tree.range_sum(lo, hi)?;
    if range == 0 {
        return Err(CostError::EmptyRangeWeight { lo, hi });
    }
    Ok((range, tree.total_sum()?))
}

/// `ln(ratio)` for a ratio that must be at least one.
fn log_ratio(ratio: u128) -> Result<u128, CostError> {
    if ratio < WAD {
        return Err(CostError::RatioBelowOne { ratio });
    }
    let ln = ln_wad(ratio)?;
    u128::try_from(ln).map_err(|_| CostError::RatioBelowOne { ratio })
}
