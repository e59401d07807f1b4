use crate::data::Instrument;
use crate::error::EngineError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Last known price per instrument
pub type PriceMap = HashMap<Instrument, Decimal>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Executed trade applied to the portfolio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub instrument: Instrument,
    pub side: Side,
    pub quantity: Decimal,
    pub price: Decimal,
    pub commission: Decimal,
}

/// Long holding in one instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub instrument: Instrument,
    pub quantity: Decimal,
    pub average_price: Decimal,
}

impl Holding {
    pub fn market_value(&self, price: Decimal) -> Decimal {
        self.quantity * price
    }

    pub fn unrealized_pnl(&self, price: Decimal) -> Decimal {
        (price - self.average_price) * self.quantity
    }
}

/// Point-in-time valuation the host hands to the engine for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioValuation {
    pub holdings_value: Decimal,
    pub total_value: Decimal,
}

impl PortfolioValuation {
    /// Holdings value over total portfolio value
    pub fn leverage(&self) -> Option<f64> {
        if self.total_value.is_zero() {
            return None;
        }
        (self.holdings_value / self.total_value).to_f64()
    }
}

/// Cash plus long holdings
#[derive(Debug, Clone)]
pub struct Portfolio {
    cash: Decimal,
    holdings: BTreeMap<Instrument, Holding>,
    realized_pnl: Decimal,
    total_fees: Decimal,
}

impl Portfolio {
    pub fn new(cash: Decimal) -> Self {
        Self {
            cash,
            holdings: BTreeMap::new(),
            realized_pnl: Decimal::ZERO,
            total_fees: Decimal::ZERO,
        }
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    pub fn quantity(&self, instrument: &Instrument) -> Decimal {
        self.holdings
            .get(instrument)
            .map_or(Decimal::ZERO, |h| h.quantity)
    }

    pub fn is_invested(&self, instrument: &Instrument) -> bool {
        self.quantity(instrument) > Decimal::ZERO
    }

    pub fn holding(&self, instrument: &Instrument) -> Option<&Holding> {
        self.holdings.get(instrument)
    }

    pub fn holdings(&self) -> impl Iterator<Item = &Holding> {
        self.holdings.values()
    }

    pub fn position_count(&self) -> usize {
        self.holdings.len()
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.realized_pnl
    }

    pub fn total_fees(&self) -> Decimal {
        self.total_fees
    }

    /// Market value of all holdings; a holding without a price is carried
    /// at its average cost
    pub fn holdings_value(&self, prices: &PriceMap) -> Decimal {
        self.holdings
            .values()
            .map(|h| h.market_value(prices.get(&h.instrument).copied().unwrap_or(h.average_price)))
            .sum()
    }

    pub fn total_value(&self, prices: &PriceMap) -> Decimal {
        self.cash + self.holdings_value(prices)
    }

    pub fn valuation(&self, prices: &PriceMap) -> PortfolioValuation {
        PortfolioValuation {
            holdings_value: self.holdings_value(prices),
            total_value: self.total_value(prices),
        }
    }

    /// Apply an executed fill. Returns the realized PnL (zero for buys).
    pub fn apply_fill(&mut self, fill: &Fill) -> Result<Decimal, EngineError> {
        self.total_fees += fill.commission;
        match fill.side {
            Side::Buy => {
                let holding = self
                    .holdings
                    .entry(fill.instrument.clone())
                    .or_insert_with(|| Holding {
                        instrument: fill.instrument.clone(),
                        quantity: Decimal::ZERO,
                        average_price: Decimal::ZERO,
                    });
                let new_qty = holding.quantity + fill.quantity;
                if !new_qty.is_zero() {
                    holding.average_price =
                        (holding.quantity * holding.average_price + fill.quantity * fill.price) / new_qty;
                }
                holding.quantity = new_qty;
                self.cash -= fill.quantity * fill.price + fill.commission;
                Ok(Decimal::ZERO)
            }
            Side::Sell => {
                let holding = self
                    .holdings
                    .get_mut(&fill.instrument)
                    .ok_or_else(|| EngineError::UnknownHolding(fill.instrument.clone()))?;
                if fill.quantity > holding.quantity {
                    return Err(EngineError::InsufficientQuantity {
                        instrument: fill.instrument.clone(),
                        requested: fill.quantity,
                        held: holding.quantity,
                    });
                }

                let pnl = (fill.price - holding.average_price) * fill.quantity - fill.commission;
                holding.quantity -= fill.quantity;
                if holding.quantity.is_zero() {
                    self.holdings.remove(&fill.instrument);
                }
                self.cash += fill.quantity * fill.price - fill.commission;
                self.realized_pnl += pnl;
                Ok(pnl)
            }
        }
    }
}
