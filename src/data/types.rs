use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a tradable or signal-only series (e.g. "TLT", "SLV")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Instrument(String);

impl Instrument {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    pub fn symbol(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Instrument {
    fn from(symbol: &str) -> Self {
        Self::new(symbol)
    }
}

/// Name of a momentum signal: an instrument symbol or a pair-spread key like "S_G"
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalKey(String);

impl SignalKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&Instrument> for SignalKey {
    fn from(instrument: &Instrument) -> Self {
        Self(instrument.symbol().to_string())
    }
}

impl From<&str> for SignalKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl fmt::Display for SignalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Daily (or consolidated-to-daily) closing price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub instrument: Instrument,
    pub date: NaiveDate,
    pub close: f64,
}

impl PriceBar {
    pub fn new(instrument: Instrument, date: NaiveDate, close: f64) -> Self {
        Self {
            instrument,
            date,
            close,
        }
    }
}

/// Target weights handed to the execution collaborator.
///
/// A full replacement map: anything currently held but missing here is
/// liquidated by the executor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightPlan {
    weights: BTreeMap<Instrument, f64>,
}

impl WeightPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, instrument: Instrument, weight: f64) {
        self.weights.insert(instrument, weight);
    }

    pub fn with(mut self, instrument: Instrument, weight: f64) -> Self {
        self.set(instrument, weight);
        self
    }

    pub fn weight(&self, instrument: &Instrument) -> Option<f64> {
        self.weights.get(instrument).copied()
    }

    pub fn contains(&self, instrument: &Instrument) -> bool {
        self.weights.contains_key(instrument)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Instrument, f64)> {
        self.weights.iter().map(|(i, w)| (i, *w))
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Sum of all target weights
    pub fn gross_weight(&self) -> f64 {
        self.weights.values().map(|w| w.abs()).sum()
    }
}
