pub mod momentum;
pub mod extreme;

pub use momentum::{MomentumSignalEngine, MomentumSnapshot, SignalUniverse, SpreadDefinition};
pub use extreme::{
    percentile_linear, ExtremeFlags, ExtremeReading, DEFAULT_EXTREME_PERCENTILE, MIN_OBSERVATIONS,
};
