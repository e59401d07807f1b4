use crate::data::{Instrument, PriceBar, RingBuffer};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::trace;

/// Sessions of price history retained per instrument
pub const DEFAULT_LOOKBACK: usize = 252;

/// Sessions the baseline is lagged behind the price
pub const DEFAULT_BASELINE_SHIFT: usize = 55;

/// Sessions averaged into the baseline
pub const DEFAULT_BASELINE_WINDOW: usize = 11;

/// Shape of the lagged rolling-mean baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineParams {
    pub shift: usize,
    pub window: usize,
}

impl BaselineParams {
    /// Number of leading rows whose baseline is undefined
    pub fn warmup(&self) -> usize {
        (self.shift + self.window).saturating_sub(1)
    }
}

impl Default for BaselineParams {
    fn default() -> Self {
        Self {
            shift: DEFAULT_BASELINE_SHIFT,
            window: DEFAULT_BASELINE_WINDOW,
        }
    }
}

/// What an append did to the series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// New newest bar
    Appended,
    /// Same date already present, close replaced
    Overwrote,
    /// Late bar placed inside the window
    Inserted,
    /// Late bar older than a full window, discarded
    Dropped,
}

/// Rolling mean over `window` values, lagged by `shift` rows.
///
/// `out[j]` is the mean of `values[j-shift-window+1 ..= j-shift]`. Rows whose
/// window reaches before the first value, or covers a non-finite value, are `None`.
pub fn lagged_rolling_mean(values: &[f64], shift: usize, window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if window == 0 {
        return out;
    }

    for (j, slot) in out.iter_mut().enumerate().skip(shift + window - 1) {
        let end = j - shift;
        let slice = &values[end + 1 - window..=end];
        if slice.iter().all(|v| v.is_finite()) {
            *slot = Some(slice.iter().sum::<f64>() / window as f64);
        }
    }

    out
}

/// Closing prices for one instrument, ordered by date and capped at the lookback.
///
/// The baseline is recomputed on every change so that readers never see a
/// stale value.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    bars: RingBuffer<(NaiveDate, f64)>,
    baseline: Vec<Option<f64>>,
    params: BaselineParams,
}

impl PriceSeries {
    pub fn new(lookback: usize, params: BaselineParams) -> Self {
        Self {
            bars: RingBuffer::with_capacity(lookback),
            baseline: Vec::new(),
            params,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn lookback(&self) -> usize {
        self.bars.capacity()
    }

    /// Insert or overwrite the close for `date`, trimming to the lookback.
    pub fn append(&mut self, date: NaiveDate, close: f64) -> AppendOutcome {
        let outcome = match self.bars.last().map(|(d, _)| *d) {
            None => {
                self.bars.push((date, close));
                AppendOutcome::Appended
            }
            Some(last) if date > last => {
                self.bars.push((date, close));
                AppendOutcome::Appended
            }
            Some(last) if date == last => {
                if let Some(bar) = self.bars.last_mut() {
                    bar.1 = close;
                }
                AppendOutcome::Overwrote
            }
            Some(_) => self.insert_late(date, close),
        };

        if outcome != AppendOutcome::Dropped {
            self.recompute_baseline();
        }
        outcome
    }

    fn insert_late(&mut self, date: NaiveDate, close: f64) -> AppendOutcome {
        let full = self.bars.is_full();
        let mut bars = self.bars.drain_ordered();

        let outcome = match bars.binary_search_by(|(d, _)| d.cmp(&date)) {
            Ok(pos) => {
                bars[pos].1 = close;
                AppendOutcome::Overwrote
            }
            Err(0) if full => AppendOutcome::Dropped,
            Err(pos) => {
                bars.insert(pos, (date, close));
                AppendOutcome::Inserted
            }
        };

        self.bars.replace_from(bars);
        outcome
    }

    fn recompute_baseline(&mut self) {
        let closes: Vec<f64> = self.closes().collect();
        self.baseline = lagged_rolling_mean(&closes, self.params.shift, self.params.window);
    }

    pub fn bars(&self) -> impl DoubleEndedIterator<Item = &(NaiveDate, f64)> + '_ {
        self.bars.iter()
    }

    pub fn closes(&self) -> impl Iterator<Item = f64> + '_ {
        self.bars.iter().map(|(_, close)| *close)
    }

    pub fn last(&self) -> Option<(NaiveDate, f64)> {
        self.bars.last().copied()
    }

    /// Baseline aligned index-for-index with `bars()`
    pub fn baseline(&self) -> &[Option<f64>] {
        &self.baseline
    }

    /// Momentum ratio `close / baseline - 1` per bar.
    ///
    /// Rows without a baseline, or whose ratio is not finite, are `None`.
    pub fn momentum(&self) -> Vec<(NaiveDate, Option<f64>)> {
        self.bars
            .iter()
            .zip(self.baseline.iter())
            .map(|(&(date, close), baseline)| {
                let mom = baseline
                    .map(|b| close / b - 1.0)
                    .filter(|m| m.is_finite());
                (date, mom)
            })
            .collect()
    }
}

/// Rolling per-instrument price windows fed by the market-data collaborator.
///
/// Appends may arrive at any frequency; nothing downstream runs as a side
/// effect.
#[derive(Debug, Clone)]
pub struct PriceHistoryStore {
    lookback: usize,
    params: BaselineParams,
    series: HashMap<Instrument, PriceSeries>,
    latest: Option<NaiveDate>,
}

impl PriceHistoryStore {
    pub fn new(lookback: usize, params: BaselineParams) -> Self {
        Self {
            lookback,
            params,
            series: HashMap::new(),
            latest: None,
        }
    }

    pub fn append(&mut self, instrument: &Instrument, date: NaiveDate, close: f64) -> AppendOutcome {
        let (lookback, params) = (self.lookback, self.params);
        let outcome = self
            .series
            .entry(instrument.clone())
            .or_insert_with(|| PriceSeries::new(lookback, params))
            .append(date, close);

        if outcome != AppendOutcome::Dropped {
            self.latest = Some(self.latest.map_or(date, |d| d.max(date)));
        }
        trace!(instrument = %instrument, %date, close, ?outcome, "history append");
        outcome
    }

    pub fn apply(&mut self, bar: &PriceBar) -> AppendOutcome {
        self.append(&bar.instrument, bar.date, bar.close)
    }

    pub fn series(&self, instrument: &Instrument) -> Option<&PriceSeries> {
        self.series.get(instrument)
    }

    pub fn baseline(&self, instrument: &Instrument) -> Option<&[Option<f64>]> {
        self.series.get(instrument).map(PriceSeries::baseline)
    }

    /// Most recent bar date seen for any instrument
    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.latest
    }

    /// Most recent bar date among `instruments` only
    pub fn latest_date_among<'a, I>(&self, instruments: I) -> Option<NaiveDate>
    where
        I: IntoIterator<Item = &'a Instrument>,
    {
        instruments
            .into_iter()
            .filter_map(|i| self.series.get(i).and_then(PriceSeries::last))
            .map(|(date, _)| date)
            .max()
    }

    pub fn latest_close(&self, instrument: &Instrument) -> Option<f64> {
        self.series
            .get(instrument)
            .and_then(PriceSeries::last)
            .map(|(_, close)| close)
    }

    /// Instruments in symbol order
    pub fn instruments(&self) -> Vec<&Instrument> {
        let mut out: Vec<&Instrument> = self.series.keys().collect();
        out.sort();
        out
    }

    pub fn lookback(&self) -> usize {
        self.lookback
    }

    pub fn params(&self) -> BaselineParams {
        self.params
    }
}

impl Default for PriceHistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_LOOKBACK, BaselineParams::default())
    }
}
