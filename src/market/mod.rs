//! Tick-denominated range market
//!
//! Wraps a [`LazyMulTree`] and the cost engine behind the tick coordinates a
//! ledger speaks: positions cover `[lower, upper)` tick ranges, quantities and
//! amounts are WAD. Every method validates ticks before touching the tree.

mod config;
mod ticks;

pub use config::MarketConfig;
pub use ticks::{BinRange, TickRange};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::cost::{self, CostError, TradeSide};
use crate::fixed::{wdiv, MathError};
use crate::tree::{LazyMulTree, TreeError};

/// Errors raised at the market surface.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MarketError {
    /// Configuration rejected by [`MarketConfig::validate`].
    #[error("invalid market configuration: {0}")]
    InvalidConfig(String),

    /// Tick not on the spacing grid.
    #[error("tick {tick} is not a multiple of spacing {spacing} from the domain start")]
    MisalignedTick {
        /// Offending tick.
        tick: i64,
        /// Configured spacing.
        spacing: i64,
    },

    /// Tick outside `[min_tick, max_tick]`.
    #[error("tick {tick} outside [{min}, {max}]")]
    TickOutOfRange {
        /// Offending tick.
        tick: i64,
        /// Domain start.
        min: i64,
        /// Domain end.
        max: i64,
    },

    /// `lower >= upper`.
    #[error("tick range [{lower}, {upper}) is empty")]
    EmptyTickRange {
        /// Lower tick.
        lower: i64,
        /// Upper tick.
        upper: i64,
    },

    /// Tree failure.
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// Cost engine failure.
    #[error(transparent)]
    Cost(#[from] CostError),
}

impl From<MathError> for MarketError {
    fn from(err: MathError) -> Self {
        MarketError::Cost(CostError::Math(err))
    }
}

/// A trade against a tick range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TradeRequest {
    /// Buy (open/increase) or sell (decrease/close).
    pub side: TradeSide,
    /// Tick range of the position.
    pub range: TickRange,
    /// Quantity (WAD).
    pub quantity: u128,
}

impl TradeRequest {
    /// Buy `quantity` over `range`.
    pub fn buy(range: TickRange, quantity: u128) -> Self {
        Self {
            side: TradeSide::Buy,
            range,
            quantity,
        }
    }

    /// Sell `quantity` over `range`.
    pub fn sell(range: TickRange, quantity: u128) -> Self {
        Self {
            side: TradeSide::Sell,
            range,
            quantity,
        }
    }
}

/// Settlement record for an executed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TradeReceipt {
    /// Executed request.
    pub request: TradeRequest,
    /// Bins the tick range resolved to.
    pub bins: BinRange,
    /// Cost paid (buy) or proceeds received (sell), WAD.
    pub amount: u128,
    /// Range-multiply steps applied.
    pub chunks: u64,
    /// Partition function after the trade.
    pub total_after: u128,
}

/// One range market: configuration plus weight tree.
#[derive(Debug, Clone)]
pub struct RangeMarket {
    config: MarketConfig,
    tree: LazyMulTree,
}

impl RangeMarket {
    /// Open a market with a uniform prior.
    pub fn new(config: MarketConfig) -> Result<Self, MarketError> {
        let bins = config.num_bins()?;
        let tree = LazyMulTree::with_size(bins)?;
        debug!(bins, liquidity = config.liquidity, "opened market");
        Ok(Self { config, tree })
    }

    /// Open a market seeded with one positive weight per bin.
    pub fn with_prior(config: MarketConfig, weights: &[u128]) -> Result<Self, MarketError> {
        let mut market = Self::new(config)?;
        market.tree.seed_with_factors(weights)?;
        Ok(market)
    }

    /// Market parameters.
    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    /// Underlying tree, for inspection.
    pub fn tree(&self) -> &LazyMulTree {
        &self.tree
    }

    /// Cost of buying `quantity` over `range`.
    pub fn cost_to_buy(&self, range: TickRange, quantity: u128) -> Result<u128, MarketError> {
        let bins = self.bins(range)?;
        Ok(cost::cost_of_buy(&self.tree, bins.lo, bins.hi, quantity, self.config.liquidity)?)
    }

    /// Proceeds of selling `quantity` over `range`.
    pub fn proceeds_from_sell(&self, range: TickRange, quantity: u128) -> Result<u128, MarketError> {
        let bins = self.bins(range)?;
        Ok(cost::proceeds_of_sell(&self.tree, bins.lo, bins.hi, quantity, self.config.liquidity)?)
    }

    /// Quantity that `budget` buys over `range`.
    pub fn quantity_for_cost(&self, range: TickRange, budget: u128) -> Result<u128, MarketError> {
        let bins = self.bins(range)?;
        Ok(cost::quantity_from_cost(&self.tree, bins.lo, bins.hi, budget, self.config.liquidity)?)
    }

    /// Quantity to sell over `range` to receive `proceeds`.
    pub fn quantity_for_proceeds(&self, range: TickRange, proceeds: u128) -> Result<u128, MarketError> {
        let bins = self.bins(range)?;
        Ok(cost::quantity_from_proceeds(
            &self.tree,
            bins.lo,
            bins.hi,
            proceeds,
            self.config.liquidity,
        )?)
    }

    /// Apply a trade. On error the market is unchanged.
    pub fn execute(&mut self, request: TradeRequest) -> Result<TradeReceipt, MarketError> {
        let bins = self.bins(request.range)?;
        let fill = cost::apply_trade(
            &mut self.tree,
            bins.lo,
            bins.hi,
            request.side,
            request.quantity,
            self.config.liquidity,
        )?;
        let total_after = self.tree.total_sum()?;

        info!(
            side = ?request.side,
            range = %request.range,
            quantity = request.quantity,
            amount = fill.amount,
            chunks = fill.chunks,
            "executed trade"
        );
        Ok(TradeReceipt {
            request,
            bins,
            amount: fill.amount,
            chunks: fill.chunks,
            total_after,
        })
    }

    /// Weight held by `range`.
    pub fn range_sum(&self, range: TickRange) -> Result<u128, MarketError> {
        let bins = self.bins(range)?;
        Ok(self.tree.range_sum(bins.lo, bins.hi)?)
    }

    /// Partition function.
    pub fn total_sum(&self) -> Result<u128, MarketError> {
        Ok(self.tree.total_sum()?)
    }

    /// Implied probability of `range`, `S / Z` in WAD.
    pub fn range_probability(&self, range: TickRange) -> Result<u128, MarketError> {
        let range_weight = self.range_sum(range)?;
        let total = self.total_sum()?;
        Ok(wdiv(range_weight, total)?)
    }

    /// Weight of every bin, lowest tick first.
    pub fn bin_weights(&self) -> Result<Vec<u128>, MarketError> {
        Ok(self.tree.leaf_weights()?)
    }

    fn bins(&self, range: TickRange) -> Result<BinRange, MarketError> {
        range.to_bins(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::WAD;

    fn market() -> RangeMarket {
        let config = MarketConfig::with_domain(0, 1_000)
            .with_tick_spacing(50)
            .with_liquidity(100 * WAD);
        RangeMarket::new(config).unwrap()
    }

    #[test]
    fn test_uniform_market_probabilities() {
        let market = market();
        assert_eq!(market.total_sum().unwrap(), 20 * WAD);
        let p = market.range_probability(TickRange::new(0, 250)).unwrap();
        assert_eq!(p, WAD / 4);
    }

    #[test]
    fn test_buy_raises_range_probability() {
        let mut market = market();
        let range = TickRange::new(200, 400);
        let before = market.range_probability(range).unwrap();
        let quote = market.cost_to_buy(range, 20 * WAD).unwrap();

        let receipt = market.execute(TradeRequest::buy(range, 20 * WAD)).unwrap();
        assert_eq!(receipt.amount, quote);
        assert_eq!(receipt.bins, BinRange { lo: 4, hi: 7 });
        assert_eq!(receipt.total_after, market.total_sum().unwrap());
        assert!(market.range_probability(range).unwrap() > before);
    }

    #[test]
    fn test_bad_ticks_leave_market_unchanged() {
        let mut market = market();
        let digest = market.tree().state_digest();
        let err = market
            .execute(TradeRequest::buy(TickRange::new(10, 100), WAD))
            .unwrap_err();
        assert!(matches!(err, MarketError::MisalignedTick { tick: 10, .. }));
        assert_eq!(market.tree().state_digest(), digest);
    }

    #[test]
    fn test_prior_weights() {
        let config = MarketConfig::with_domain(0, 4);
        let market = RangeMarket::with_prior(config, &[WAD, 2 * WAD, 3 * WAD, 4 * WAD]).unwrap();
        assert_eq!(market.bin_weights().unwrap(), vec![WAD, 2 * WAD, 3 * WAD, 4 * WAD]);
        assert_eq!(
            market.range_probability(TickRange::new(2, 4)).unwrap(),
            7 * WAD / 10
        );
    }
}
