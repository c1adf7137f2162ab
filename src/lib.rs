//! # Range LMSR market maker
//!
//! Continuous-outcome prediction market priced by the Logarithmic Market
//! Scoring Rule. The outcome domain is split into bins; each bin carries a
//! weight `exp(q_i / α)`, and the cost of a trade is the change in
//! `α · ln Σ weights`.
//!
//! ## Layers
//!
//! 1. **`fixed`**: WAD (1e18) fixed point on `u128` with a 256-bit
//!    intermediate product, directed rounding, `exp` and `ln`
//! 2. **`tree`**: sparse lazy multiplicative segment tree; O(log n)
//!    range-multiply and range-sum with undo-journaled transactions
//! 3. **`cost`**: LMSR quotes, budget inversions and chunked trade execution
//! 4. **`market`**: tick-denominated facade with validated configuration
//!
//! ## Usage Example
//!
//! ```
//! use range_lmsr::{MarketConfig, RangeMarket, TickRange, TradeRequest, WAD};
//!
//! let config = MarketConfig::with_domain(0, 100)
//!     .with_tick_spacing(10)
//!     .with_liquidity(100 * WAD);
//! let mut market = RangeMarket::new(config)?;
//!
//! let range = TickRange::new(20, 50);
//! let quote = market.cost_to_buy(range, 5 * WAD)?;
//! let receipt = market.execute(TradeRequest::buy(range, 5 * WAD))?;
//! assert_eq!(receipt.amount, quote);
//! # Ok::<(), range_lmsr::MarketError>(())
//! ```

#![warn(missing_docs, missing_debug_implementations)]

pub mod cost;   // LMSR pricing and trade execution
pub mod fixed;  // WAD fixed-point kernel
pub mod market; // Tick-level market facade
pub mod tree;   // Lazy multiplicative range tree

// Re-exports for convenience
pub use cost::{CostError, Fill, TradeSide};
pub use fixed::{format_wad, parse_wad, MathError, Rounding, WAD};
pub use market::{BinRange, MarketConfig, MarketError, RangeMarket, TickRange, TradeReceipt, TradeRequest};
pub use tree::{LazyMulTree, TreeError};
