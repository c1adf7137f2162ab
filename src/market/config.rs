//! Market configuration

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::MarketError;
use crate::fixed::WAD;
use crate::tree::MAX_TREE_SIZE;

/// Parameters of one range market.
///
/// Bins partition `[min_tick, max_tick)` into `tick_spacing`-wide buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MarketConfig {
    /// LMSR liquidity parameter `α` (WAD).
    pub liquidity: u128,
    /// Lowest tick of the outcome domain (inclusive).
    pub min_tick: i64,
    /// Highest tick of the outcome domain (exclusive bin edge).
    pub max_tick: i64,
    /// Width of each bin in ticks.
    pub tick_spacing: i64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            liquidity: 100 * WAD,
            min_tick: 0,
            max_tick: 100,
            tick_spacing: 1,
        }
    }
}

impl MarketConfig {
    /// Configuration over `[min_tick, max_tick)` with default liquidity and unit spacing.
    pub fn with_domain(min_tick: i64, max_tick: i64) -> Self {
        Self {
            min_tick,
            max_tick,
            ..Self::default()
        }
    }

    /// Set liquidity `α` (WAD).
    pub fn with_liquidity(mut self, liquidity: u128) -> Self {
        self.liquidity = liquidity;
        self
    }

    /// Set bin width in ticks.
    pub fn with_tick_spacing(mut self, tick_spacing: i64) -> Self {
        self.tick_spacing = tick_spacing;
        self
    }

    /// Number of bins the domain splits into.
    ///
    /// Runs the full validation; an invalid config yields its error, never a
    /// fallback count.
    pub fn num_bins(&self) -> Result<u32, MarketError> {
        if self.liquidity == 0 {
            return Err(invalid("liquidity must be > 0"));
        }
        if self.tick_spacing <= 0 {
            return Err(invalid("tick spacing must be > 0"));
        }
        if self.min_tick >= self.max_tick {
            return Err(invalid("tick domain is empty"));
        }
        let span = self
            .max_tick
            .checked_sub(self.min_tick)
            .ok_or_else(|| invalid("tick domain too wide"))?;
        if span % self.tick_spacing != 0 {
            return Err(invalid("tick domain is not a multiple of the spacing"));
        }
        let bins = span / self.tick_spacing;
        match u32::try_from(bins) {
            Ok(bins) if bins <= MAX_TREE_SIZE => Ok(bins),
            _ => Err(MarketError::InvalidConfig(format!(
                "{} bins exceeds maximum {}",
                bins, MAX_TREE_SIZE
            ))),
        }
    }

    /// Check every field and the derived bin count.
    pub fn validate(&self) -> Result<(), MarketError> {
        self.num_bins().map(|_| ())
    }
}

fn invalid(reason: &str) -> MarketError {
    MarketError::InvalidConfig(reason.to_string())
}
