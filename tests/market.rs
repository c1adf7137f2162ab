mod common;

use common::assert_close;
use range_lmsr::{
    BinRange, CostError, MarketConfig, MarketError, RangeMarket, TickRange, TradeRequest, TradeSide,
    WAD,
};
use test_case::test_case;

fn config() -> MarketConfig {
    MarketConfig::with_domain(-1_000, 1_000)
        .with_tick_spacing(100)
        .with_liquidity(25 * WAD)
}

#[test_case(-1_000, -900 => Ok(BinRange { lo: 0, hi: 0 }) ; "first bin")]
#[test_case(900, 1_000 => Ok(BinRange { lo: 19, hi: 19 }) ; "last bin")]
#[test_case(-1_000, 1_000 => Ok(BinRange { lo: 0, hi: 19 }) ; "whole domain")]
#[test_case(-100, 100 => Ok(BinRange { lo: 9, hi: 10 }) ; "around zero")]
#[test_case(-1_100, 0 => Err(MarketError::TickOutOfRange { tick: -1_100, min: -1_000, max: 1_000 }) ; "below domain")]
#[test_case(0, 1_100 => Err(MarketError::TickOutOfRange { tick: 1_100, min: -1_000, max: 1_000 }) ; "above domain")]
#[test_case(-50, 100 => Err(MarketError::MisalignedTick { tick: -50, spacing: 100 }) ; "misaligned lower")]
#[test_case(0, 150 => Err(MarketError::MisalignedTick { tick: 150, spacing: 100 }) ; "misaligned upper")]
#[test_case(200, 200 => Err(MarketError::EmptyTickRange { lower: 200, upper: 200 }) ; "empty")]
#[test_case(300, 200 => Err(MarketError::EmptyTickRange { lower: 300, upper: 200 }) ; "inverted")]
fn tick_conversion(lower: i64, upper: i64) -> Result<BinRange, MarketError> {
    TickRange::new(lower, upper).to_bins(&config())
}

#[test_case(MarketConfig::with_domain(0, 10).with_tick_spacing(0) ; "zero spacing")]
#[test_case(MarketConfig::with_domain(0, 10).with_tick_spacing(-2) ; "negative spacing")]
#[test_case(MarketConfig::with_domain(i64::MIN, i64::MAX) ; "full i64 domain")]
fn tick_conversion_rejects_unchecked_config(config: MarketConfig) {
    let result = TickRange::new(0, 2).to_bins(&config);
    assert!(matches!(result, Err(MarketError::InvalidConfig(_))), "{:?}", result);
    assert!(config.num_bins().is_err());
}

#[test]
fn probabilities_sum_to_one_after_trading() {
    let mut market = RangeMarket::new(config()).unwrap();
    market
        .execute(TradeRequest::buy(TickRange::new(-300, 200), 30 * WAD))
        .unwrap();
    market
        .execute(TradeRequest::sell(TickRange::new(0, 100), 5 * WAD))
        .unwrap();

    let halves = market.range_probability(TickRange::new(-1_000, 0)).unwrap()
        + market.range_probability(TickRange::new(0, 1_000)).unwrap();
    assert_close(halves, WAD, 10, "probability mass");

    let weights = market.bin_weights().unwrap();
    assert_eq!(weights.len(), 20);
    assert!(weights[7] > weights[0]);
    assert!(weights[10] < weights[9]);
}

#[test]
fn inverse_quotes_round_trip() {
    let market = RangeMarket::new(config()).unwrap();
    let range = TickRange::new(-400, 400);

    let quantity = market.quantity_for_cost(range, 10 * WAD).unwrap();
    let cost = market.cost_to_buy(range, quantity).unwrap();
    assert_close(cost, 10 * WAD, 100_000, "cost of bought quantity");

    let quantity = market.quantity_for_proceeds(range, 2 * WAD).unwrap();
    let proceeds = market.proceeds_from_sell(range, quantity).unwrap();
    assert_close(proceeds, 2 * WAD, 100_000, "proceeds of sold quantity");
}

#[test]
fn receipt_describes_trade() {
    let mut market = RangeMarket::new(config()).unwrap();
    let request = TradeRequest::buy(TickRange::new(500, 1_000), 250 * WAD);
    let receipt = market.execute(request).unwrap();

    assert_eq!(receipt.request.side, TradeSide::Buy);
    assert_eq!(receipt.bins, BinRange { lo: 15, hi: 19 });
    // 25 liquidity -> chunks of 100
    assert_eq!(receipt.chunks, 3);
    assert!(receipt.amount > 0 && receipt.amount < 250 * WAD);
    assert_eq!(receipt.total_after, market.total_sum().unwrap());
}

#[test]
fn rejected_trades_surface_typed_errors() {
    let mut market = RangeMarket::new(config()).unwrap();
    let err = market
        .execute(TradeRequest::buy(TickRange::new(0, 100), 0))
        .unwrap_err();
    assert_eq!(err, MarketError::Cost(CostError::ZeroQuantity));

    let err = market
        .quantity_for_proceeds(TickRange::new(0, 100), 100 * WAD)
        .unwrap_err();
    assert!(matches!(
        err,
        MarketError::Cost(CostError::InfeasibleProceeds { .. })
    ));
}

#[test]
fn invalid_configs_are_rejected() {
    let err = RangeMarket::new(config().with_tick_spacing(300)).unwrap_err();
    assert!(matches!(err, MarketError::InvalidConfig(_)));
    let err = RangeMarket::new(config().with_liquidity(0)).unwrap_err();
    assert!(matches!(err, MarketError::InvalidConfig(_)));

    let err = RangeMarket::with_prior(MarketConfig::with_domain(0, 3), &[WAD, WAD]).unwrap_err();
    assert!(matches!(err, MarketError::Tree(_)));
}
