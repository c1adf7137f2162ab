//! Tick ranges and their bin ranges

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{MarketConfig, MarketError};

/// Half-open tick interval `[lower, upper)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TickRange {
    /// Inclusive lower tick.
    pub lower: i64,
    /// Exclusive upper tick.
    pub upper: i64,
}

impl TickRange {
    /// Construct `[lower, upper)`.
    pub fn new(lower: i64, upper: i64) -> Self {
        Self { lower, upper }
    }

    /// Map onto the inclusive bin range covered by this tick range.
    ///
    /// `config` is validated first, so an unchecked config is rejected with
    /// [`MarketError::InvalidConfig`].
    pub fn to_bins(&self, config: &MarketConfig) -> Result<BinRange, MarketError> {
        config.validate()?;
        if self.lower >= self.upper {
            return Err(MarketError::EmptyTickRange {
                lower: self.lower,
                upper: self.upper,
            });
        }
        let lo = tick_to_bin(self.lower, config)?;
        let hi = tick_to_bin(self.upper, config)? - 1;
        Ok(BinRange { lo, hi })
    }
}

impl fmt::Display for TickRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.lower, self.upper)
    }
}

/// Inclusive bin interval `[lo, hi]` addressed in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BinRange {
    /// First bin.
    pub lo: u32,
    /// Last bin.
    pub hi: u32,
}

impl BinRange {
    /// Number of bins covered.
    pub fn bin_count(&self) -> u32 {
        self.hi - self.lo + 1
    }
}

/// Bin edge index of `tick` in a validated config. `max_tick` maps to the bin count.
fn tick_to_bin(tick: i64, config: &MarketConfig) -> Result<u32, MarketError> {
    if tick < config.min_tick || tick > config.max_tick {
        return Err(MarketError::TickOutOfRange {
            tick,
            min: config.min_tick,
            max: config.max_tick,
        });
    }
    // validated: max_tick - min_tick fits in i64 and tick_spacing > 0
    let offset = tick - config.min_tick;
    if offset % config.tick_spacing != 0 {
        return Err(MarketError::MisalignedTick {
            tick,
            spacing: config.tick_spacing,
        });
    }
    u32::try_from(offset / config.tick_spacing).map_err(|_| MarketError::TickOutOfRange {
        tick,
        min: config.min_tick,
        max: config.max_tick,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MarketConfig {
        MarketConfig::with_domain(-100, 100).with_tick_spacing(10)
    }

    #[test]
    fn test_range_maps_to_inclusive_bins() {
        let bins = TickRange::new(-100, -90).to_bins(&config()).unwrap();
        assert_eq!(bins, BinRange { lo: 0, hi: 0 });
        assert_eq!(bins.bin_count(), 1);

        let bins = TickRange::new(-20, 100).to_bins(&config()).unwrap();
        assert_eq!(bins, BinRange { lo: 8, hi: 19 });
        assert_eq!(bins.bin_count(), 12);
    }

    #[test]
    fn test_bad_ticks() {
        let config = config();
        assert_eq!(
            TickRange::new(-15, 0).to_bins(&config),
            Err(MarketError::MisalignedTick { tick: -15, spacing: 10 })
        );
        assert_eq!(
            TickRange::new(0, 110).to_bins(&config),
            Err(MarketError::TickOutOfRange { tick: 110, min: -100, max: 100 })
        );
        assert_eq!(
            TickRange::new(20, 20).to_bins(&config),
            Err(MarketError::EmptyTickRange { lower: 20, upper: 20 })
        );
    }

    #[test]
    fn test_unchecked_config_is_rejected() {
        let range = TickRange::new(0, 5);
        let zero_spacing = MarketConfig::with_domain(0, 10).with_tick_spacing(0);
        assert!(matches!(
            range.to_bins(&zero_spacing),
            Err(MarketError::InvalidConfig(_))
        ));

        let full_width = MarketConfig::with_domain(i64::MIN, i64::MAX);
        assert!(matches!(
            range.to_bins(&full_width),
            Err(MarketError::InvalidConfig(_))
        ));
    }
}
