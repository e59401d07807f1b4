use crate::backtest::TradingSession;
use crate::data::{Instrument, PriceBar};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seeded random-walk daily closes for a set of instruments, weekdays only
pub struct SyntheticMarket {
    instruments: Vec<Instrument>,
    rng: StdRng,
    /// Max absolute daily move
    volatility: f64,
}

impl SyntheticMarket {
    pub fn new(instruments: Vec<Instrument>, seed: u64) -> Self {
        Self {
            instruments,
            rng: StdRng::seed_from_u64(seed),
            volatility: 0.02,
        }
    }

    pub fn with_volatility(mut self, volatility: f64) -> Self {
        self.volatility = volatility.abs();
        self
    }

    /// Generate `sessions` weekday sessions starting at or after `start`
    pub fn generate(&mut self, start: NaiveDate, sessions: usize) -> Vec<TradingSession> {
        let mut prices: Vec<f64> = self
            .instruments
            .iter()
            .map(|_| self.rng.gen_range(20.0..200.0))
            .collect();

        let mut out = Vec::with_capacity(sessions);
        let mut date = start;

        while out.len() < sessions {
            if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
                let mut bars = Vec::with_capacity(self.instruments.len());
                for (instrument, price) in self.instruments.iter().zip(prices.iter_mut()) {
                    let change = if self.volatility > 0.0 {
                        self.rng.gen_range(-self.volatility..self.volatility)
                    } else {
                        0.0
                    };
                    *price = (*price * (1.0 + change)).max(0.01);
                    bars.push(PriceBar::new(instrument.clone(), date, *price));
                }
                out.push(TradingSession { date, bars });
            }
            date += Duration::days(1);
        }

        out
    }
}
