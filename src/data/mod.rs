pub mod types;
pub mod ring_buffer;
pub mod history;
pub mod close_log;

pub use types::{Instrument, SignalKey, PriceBar, WeightPlan};
pub use ring_buffer::RingBuffer;
pub use history::{
    PriceHistoryStore, PriceSeries, BaselineParams, AppendOutcome, lagged_rolling_mean,
    DEFAULT_LOOKBACK, DEFAULT_BASELINE_SHIFT, DEFAULT_BASELINE_WINDOW,
};
pub use close_log::DailyCloseLog;
