pub mod position;

pub use position::{Fill, Holding, Portfolio, PortfolioValuation, PriceMap, Side};
