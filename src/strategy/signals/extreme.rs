use crate::data::SignalKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fewer usable observations than this leave the percentile undefined
pub const MIN_OBSERVATIONS: usize = 2;

/// Default percentile below which a reading counts as extreme
pub const DEFAULT_EXTREME_PERCENTILE: f64 = 1.0;

/// Percentile with linear interpolation between closest ranks.
///
/// `pct` is in [0, 100]. Non-finite values are ignored; returns `None` when
/// fewer than [`MIN_OBSERVATIONS`] usable values remain.
pub fn percentile_linear(values: &[f64], pct: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.len() < MIN_OBSERVATIONS {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (pct.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = (rank.ceil() as usize).min(sorted.len() - 1);
    let frac = rank - lo as f64;

    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// One key's reading for the session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExtremeReading {
    /// Today's momentum, absent when the key has no bar for the session
    pub value: Option<f64>,
    /// Percentile threshold over the retained window
    pub threshold: Option<f64>,
    pub extreme: bool,
}

impl ExtremeReading {
    /// Extreme only when both sides are defined and the value is strictly below
    pub fn evaluate(value: Option<f64>, threshold: Option<f64>) -> Self {
        let extreme = matches!((value, threshold), (Some(v), Some(t)) if v < t);
        Self {
            value,
            threshold,
            extreme,
        }
    }
}

/// Per-key extreme flags for a single session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtremeFlags {
    readings: BTreeMap<SignalKey, ExtremeReading>,
}

impl ExtremeFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: SignalKey, reading: ExtremeReading) {
        self.readings.insert(key, reading);
    }

    pub fn is_extreme(&self, key: &SignalKey) -> bool {
        self.readings.get(key).is_some_and(|r| r.extreme)
    }

    pub fn reading(&self, key: &SignalKey) -> Option<&ExtremeReading> {
        self.readings.get(key)
    }

    pub fn any(&self) -> bool {
        self.readings.values().any(|r| r.extreme)
    }

    pub fn count(&self) -> usize {
        self.readings.values().filter(|r| r.extreme).count()
    }

    pub fn extreme_keys(&self) -> Vec<SignalKey> {
        self.readings
            .iter()
            .filter(|(_, r)| r.extreme)
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Keys evaluated without a value for the session
    pub fn skipped_keys(&self) -> Vec<SignalKey> {
        self.readings
            .iter()
            .filter(|(_, r)| r.value.is_none())
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SignalKey, &ExtremeReading)> {
        self.readings.iter()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}
