use crate::data::{Instrument, WeightPlan};
use crate::error::EngineError;
use crate::portfolio::{Portfolio, PriceMap, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Order the execution collaborator should place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub instrument: Instrument,
    pub side: Side,
    pub quantity: Decimal,
}

/// Diffs a weight plan against current holdings.
///
/// Liquidations always come first so that buys never run on top of the
/// positions they replace.
pub struct OrderPlanner;

impl OrderPlanner {
    /// Rules, per plan entry:
    /// 1. weight <= 0 and held → sell the whole holding
    /// 2. weight > 0 and not held → buy `floor(total_value * weight / price)` shares;
    ///    skipped when the instrument has no usable price this session
    ///
    /// Holdings absent from the plan are sold.
    pub fn diff(
        plan: &WeightPlan,
        portfolio: &Portfolio,
        prices: &PriceMap,
    ) -> Result<Vec<OrderIntent>, EngineError> {
        let total_value = portfolio.total_value(prices);
        let mut liquidations = Vec::new();
        let mut buys = Vec::new();

        for (instrument, weight) in plan.iter() {
            let held = portfolio.quantity(instrument);

            if weight <= 0.0 {
                if held > Decimal::ZERO {
                    liquidations.push(OrderIntent {
                        instrument: instrument.clone(),
                        side: Side::Sell,
                        quantity: held,
                    });
                }
                continue;
            }

            if held > Decimal::ZERO {
                continue;
            }

            let Some(price) = prices.get(instrument).copied().filter(|p| *p > Decimal::ZERO) else {
                warn!(instrument = %instrument, "no price this session, buy skipped");
                continue;
            };
            let weight = Decimal::from_f64_retain(weight)
                .ok_or_else(|| EngineError::NonFinite(format!("weight for {instrument}")))?;

            let quantity = (total_value * weight / price).floor();
            if quantity > Decimal::ZERO {
                buys.push(OrderIntent {
                    instrument: instrument.clone(),
                    side: Side::Buy,
                    quantity,
                });
            } else {
                debug!(instrument = %instrument, %total_value, %price, "target too small for one share");
            }
        }

        for holding in portfolio.holdings() {
            if !plan.contains(&holding.instrument) && holding.quantity > Decimal::ZERO {
                liquidations.push(OrderIntent {
                    instrument: holding.instrument.clone(),
                    side: Side::Sell,
                    quantity: holding.quantity,
                });
            }
        }

        liquidations.extend(buys);
        Ok(liquidations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portfolio::Fill;
    use rust_decimal_macros::dec;

    fn prices() -> PriceMap {
        let mut prices = PriceMap::new();
        prices.insert(Instrument::new("QQQ"), dec!(300));
        prices.insert(Instrument::new("FDN"), dec!(200));
        prices.insert(Instrument::new("TLT"), dec!(150));
        prices.insert(Instrument::new("TLH"), dec!(130));
        prices
    }

    fn holding(portfolio: &mut Portfolio, symbol: &str, qty: Decimal, price: Decimal) {
        portfolio
            .apply_fill(&Fill {
                instrument: Instrument::new(symbol),
                side: Side::Buy,
                quantity: qty,
                price,
                commission: Decimal::ZERO,
            })
            .unwrap();
    }

    #[test]
    fn test_switch_to_bond_liquidates_first() {
        let mut portfolio = Portfolio::new(dec!(100000));
        holding(&mut portfolio, "QQQ", dec!(300), dec!(300));

        let plan = WeightPlan::new()
            .with(Instrument::new("QQQ"), 0.0)
            .with(Instrument::new("TLT"), 1.0);
        let orders = OrderPlanner::diff(&plan, &portfolio, &prices()).unwrap();

        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].side, Side::Sell);
        assert_eq!(orders[0].quantity, dec!(300));
        assert_eq!(orders[1].instrument, Instrument::new("TLT"));
        // 100000 total / 150
        assert_eq!(orders[1].quantity, dec!(666));
    }

    #[test]
    fn test_unlisted_holding_is_liquidated() {
        let mut portfolio = Portfolio::new(dec!(50000));
        holding(&mut portfolio, "FDN", dec!(100), dec!(200));

        let plan = WeightPlan::new()
            .with(Instrument::new("TLT"), 0.0)
            .with(Instrument::new("QQQ"), 1.0);
        let orders = OrderPlanner::diff(&plan, &portfolio, &prices()).unwrap();

        assert_eq!(orders[0].instrument, Instrument::new("FDN"));
        assert_eq!(orders[0].side, Side::Sell);
        assert_eq!(orders[1].instrument, Instrument::new("QQQ"));
        assert_eq!(orders[1].side, Side::Buy);
    }

    #[test]
    fn test_existing_target_holding_untouched() {
        let mut portfolio = Portfolio::new(dec!(10000));
        holding(&mut portfolio, "QQQ", dec!(10), dec!(300));

        let plan = WeightPlan::new()
            .with(Instrument::new("TLT"), 0.0)
            .with(Instrument::new("QQQ"), 1.0);
        let orders = OrderPlanner::diff(&plan, &portfolio, &prices()).unwrap();
        assert!(orders.is_empty());
    }

    #[test]
    fn test_missing_price_skips_buy_keeps_liquidation() {
        let mut portfolio = Portfolio::new(dec!(10000));
        holding(&mut portfolio, "QQQ", dec!(10), dec!(300));

        let plan = WeightPlan::new()
            .with(Instrument::new("QQQ"), 0.0)
            .with(Instrument::new("IEF"), 1.0);
        let orders = OrderPlanner::diff(&plan, &portfolio, &prices()).unwrap();

        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].instrument, Instrument::new("QQQ"));
        assert_eq!(orders[0].side, Side::Sell);
    }
}
