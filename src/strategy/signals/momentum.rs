use crate::data::{Instrument, PriceHistoryStore, SignalKey};
use crate::strategy::signals::extreme::{percentile_linear, ExtremeFlags, ExtremeReading};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Momentum rows for one key, aligned with its price series
type MomentumRows = Vec<(NaiveDate, Option<f64>)>;

/// Synthetic signal: momentum of `long` minus momentum of `short`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpreadDefinition {
    pub key: SignalKey,
    pub long: Instrument,
    pub short: Instrument,
}

impl SpreadDefinition {
    pub fn new(key: &str, long: &str, short: &str) -> Self {
        Self {
            key: SignalKey::new(key),
            long: Instrument::new(long),
            short: Instrument::new(short),
        }
    }
}

/// Which series the engine watches for extremes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalUniverse {
    /// Instruments monitored individually
    pub signals: Vec<Instrument>,
    pub spreads: Vec<SpreadDefinition>,
    /// Currency-hedge proxy whose momentum is sign-inverted
    pub inverted: Option<Instrument>,
}

impl SignalUniverse {
    /// Monitored keys: signal instruments followed by pair spreads
    pub fn monitored_keys(&self) -> Vec<SignalKey> {
        self.signals
            .iter()
            .map(SignalKey::from)
            .chain(self.spreads.iter().map(|s| s.key.clone()))
            .collect()
    }

    /// Every instrument the signals read from
    pub fn required_instruments(&self) -> Vec<Instrument> {
        let mut out: Vec<Instrument> = self.signals.clone();
        for spread in &self.spreads {
            out.push(spread.long.clone());
            out.push(spread.short.clone());
        }
        out.extend(self.inverted.iter().cloned());
        out.sort();
        out.dedup();
        out
    }
}

impl Default for SignalUniverse {
    fn default() -> Self {
        Self {
            signals: ["XLI", "DBB", "IGE", "SHY", "UUP"]
                .iter()
                .map(|s| Instrument::new(*s))
                .collect(),
            spreads: vec![
                SpreadDefinition::new("S_G", "SLV", "GLD"),
                SpreadDefinition::new("I_U", "XLI", "XLU"),
                SpreadDefinition::new("A_F", "FXA", "FXF"),
            ],
            inverted: Some(Instrument::new("UUP")),
        }
    }
}

/// Momentum readings for one session.
///
/// Holds today's and the prior row's value for every key (base instruments
/// and spreads) plus the extreme flags for the monitored set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentumSnapshot {
    pub session_index: u64,
    /// Latest bar date in the history store
    pub as_of: Option<NaiveDate>,
    latest: BTreeMap<SignalKey, f64>,
    previous: BTreeMap<SignalKey, f64>,
    pub extremes: ExtremeFlags,
}

impl MomentumSnapshot {
    /// Snapshot with no readings: nothing extreme, nothing flipped
    pub fn empty(session_index: u64) -> Self {
        Self {
            session_index,
            as_of: None,
            latest: BTreeMap::new(),
            previous: BTreeMap::new(),
            extremes: ExtremeFlags::new(),
        }
    }

    pub fn latest(&self, key: &SignalKey) -> Option<f64> {
        self.latest.get(key).copied()
    }

    pub fn previous(&self, key: &SignalKey) -> Option<f64> {
        self.previous.get(key).copied()
    }

    pub fn keys(&self) -> impl Iterator<Item = &SignalKey> {
        self.latest.keys()
    }

    pub fn extreme_count(&self) -> usize {
        self.extremes.count()
    }
}

/// Converts price history into momentum ratios and spread signals, and
/// flags readings below their own historical percentile.
pub struct MomentumSignalEngine {
    universe: SignalUniverse,
    /// Percentile (0-100) marking an extreme reading
    percentile: f64,
}

impl MomentumSignalEngine {
    pub fn new(universe: SignalUniverse, percentile: f64) -> Self {
        Self {
            universe,
            percentile,
        }
    }

    pub fn universe(&self) -> &SignalUniverse {
        &self.universe
    }

    pub fn percentile(&self) -> f64 {
        self.percentile
    }

    /// Compute the snapshot as of the newest bar among the instruments the
    /// signals read. Bars for tradables or the benchmark never move "today".
    ///
    /// Never fails: keys without data are absent from the value maps and
    /// evaluate as not extreme.
    pub fn compute_snapshot(&self, history: &PriceHistoryStore, session_index: u64) -> MomentumSnapshot {
        let required = self.universe.required_instruments();
        match history.latest_date_among(&required) {
            Some(as_of) => self.compute_snapshot_at(history, session_index, as_of),
            None => MomentumSnapshot::empty(session_index),
        }
    }

    /// Compute the snapshot for session date `as_of`. Rows dated after
    /// `as_of` (early bars for the next session) are ignored.
    pub fn compute_snapshot_at(&self, history: &PriceHistoryStore, session_index: u64, as_of: NaiveDate) -> MomentumSnapshot {
        let table = self.momentum_table(history, as_of);

        let mut latest = BTreeMap::new();
        let mut previous = BTreeMap::new();
        for (key, rows) in &table {
            let (today, prior) = today_and_prior(rows, as_of);
            if let Some(v) = today {
                latest.insert(key.clone(), v);
            }
            if let Some(v) = prior {
                previous.insert(key.clone(), v);
            }
        }

        let mut extremes = ExtremeFlags::new();
        for key in self.universe.monitored_keys() {
            let reading = match table.get(&key) {
                Some(rows) => {
                    let values: Vec<f64> = rows.iter().filter_map(|(_, v)| *v).collect();
                    let threshold = percentile_linear(&values, self.percentile);
                    ExtremeReading::evaluate(latest.get(&key).copied(), threshold)
                }
                None => ExtremeReading::evaluate(None, None),
            };
            if reading.value.is_none() {
                debug!(key = %key, %as_of, "no reading for session, skipping extreme check");
            }
            extremes.insert(key, reading);
        }

        MomentumSnapshot {
            session_index,
            as_of: Some(as_of),
            latest,
            previous,
            extremes,
        }
    }

    /// Momentum rows up to `as_of` for every instrument in the store plus
    /// every spread
    fn momentum_table(&self, history: &PriceHistoryStore, as_of: NaiveDate) -> HashMap<SignalKey, MomentumRows> {
        let mut table: HashMap<SignalKey, MomentumRows> = HashMap::new();

        for instrument in history.instruments() {
            let Some(series) = history.series(instrument) else {
                continue;
            };
            let mut rows = series.momentum();
            rows.retain(|(date, _)| *date <= as_of);
            if self.universe.inverted.as_ref() == Some(instrument) {
                for (_, v) in rows.iter_mut() {
                    *v = v.map(|m| -m);
                }
            }
            table.insert(SignalKey::from(instrument), rows);
        }

        for spread in &self.universe.spreads {
            let long = table.get(&SignalKey::from(&spread.long));
            let short = table.get(&SignalKey::from(&spread.short));
            if let (Some(long), Some(short)) = (long, short) {
                let rows = spread_rows(long, short);
                table.insert(spread.key.clone(), rows);
            }
        }

        table
    }
}

/// `long - short` on the long leg's dates; undefined where either leg is
fn spread_rows(long: &[(NaiveDate, Option<f64>)], short: &[(NaiveDate, Option<f64>)]) -> MomentumRows {
    let short_by_date: HashMap<NaiveDate, Option<f64>> = short.iter().copied().collect();
    long.iter()
        .map(|&(date, l)| {
            let s = short_by_date.get(&date).copied().flatten();
            let spread = match (l, s) {
                (Some(l), Some(s)) => Some(l - s).filter(|v| v.is_finite()),
                _ => None,
            };
            (date, spread)
        })
        .collect()
}

/// Value at `as_of` and the row immediately before it.
/// A key without a row at `as_of` has neither.
fn today_and_prior(rows: &[(NaiveDate, Option<f64>)], as_of: NaiveDate) -> (Option<f64>, Option<f64>) {
    match rows.last() {
        Some(&(date, today)) if date == as_of => {
            let prior = rows
                .len()
                .checked_sub(2)
                .and_then(|i| rows.get(i))
                .and_then(|(_, v)| *v);
            (today, prior)
        }
        _ => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{BaselineParams, DEFAULT_LOOKBACK};
    use chrono::Duration;

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, 1, 1).unwrap() + Duration::days(n)
    }

    fn flat_store(sessions: i64, symbols: &[&str]) -> PriceHistoryStore {
        let mut store = PriceHistoryStore::default();
        for n in 0..sessions {
            for s in symbols {
                store.append(&Instrument::new(*s), day(n), 100.0);
            }
        }
        store
    }

    fn all_symbols() -> Vec<&'static str> {
        vec!["XLI", "XLU", "SLV", "GLD", "FXA", "FXF", "DBB", "IGE", "SHY", "UUP"]
    }

    #[test]
    fn test_empty_store_gives_empty_snapshot() {
        let engine = MomentumSignalEngine::new(SignalUniverse::default(), 1.0);
        let snap = engine.compute_snapshot(&PriceHistoryStore::default(), 3);
        assert_eq!(snap.session_index, 3);
        assert_eq!(snap.as_of, None);
        assert!(!snap.extremes.any());
    }

    #[test]
    fn test_flat_market_has_no_extremes() {
        let engine = MomentumSignalEngine::new(SignalUniverse::default(), 1.0);
        let store = flat_store(120, &all_symbols());
        let snap = engine.compute_snapshot(&store, 119);

        assert_eq!(snap.extremes.len(), 8);
        assert!(!snap.extremes.any());
        assert_eq!(snap.latest(&"S_G".into()), Some(0.0));
    }

    #[test]
    fn test_spread_collapse_is_extreme() {
        let engine = MomentumSignalEngine::new(SignalUniverse::default(), 1.0);
        let mut store = flat_store(150, &all_symbols());
        let today = day(150);
        for s in all_symbols() {
            let px = if s == "SLV" { 70.0 } else { 100.0 };
            store.append(&Instrument::new(s), today, px);
        }

        let snap = engine.compute_snapshot(&store, 150);
        let sg = snap.latest(&"S_G".into()).unwrap();
        assert!((sg + 0.3).abs() < 1e-9);
        assert!(snap.extremes.is_extreme(&"S_G".into()));
        // SLV is only watched through the spread
        assert_eq!(snap.extremes.extreme_keys(), vec![SignalKey::new("S_G")]);
        assert_eq!(snap.previous(&"SLV".into()), Some(0.0));
    }

    #[test]
    fn test_inverted_instrument_flips_sign() {
        let universe = SignalUniverse::default();
        let engine = MomentumSignalEngine::new(universe, 1.0);
        let mut store = PriceHistoryStore::new(DEFAULT_LOOKBACK, BaselineParams { shift: 1, window: 1 });
        let uup = Instrument::new("UUP");
        store.append(&uup, day(0), 100.0);
        store.append(&uup, day(1), 110.0);

        let snap = engine.compute_snapshot(&store, 1);
        // Raw momentum +0.1 becomes -0.1
        assert!((snap.latest(&"UUP".into()).unwrap() + 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_cold_start_never_extreme() {
        let engine = MomentumSignalEngine::new(SignalUniverse::default(), 1.0);
        let mut store = PriceHistoryStore::default();
        let warmup = store.params().warmup() as i64;
        for n in 0..warmup {
            for s in all_symbols() {
                // Falling hard every day; still nothing comparable yet
                store.append(&Instrument::new(s), day(n), 100.0 - n as f64);
            }
        }
        let snap = engine.compute_snapshot(&store, warmup as u64);
        assert!(!snap.extremes.any());
        assert!(snap.extremes.iter().all(|(_, r)| r.threshold.is_none()));
    }

    #[test]
    fn test_stale_instrument_skipped_for_session() {
        let engine = MomentumSignalEngine::new(SignalUniverse::default(), 1.0);
        let mut store = flat_store(120, &all_symbols());
        // Only XLI prints today; DBB is stale
        store.append(&Instrument::new("XLI"), day(120), 100.0);

        let snap = engine.compute_snapshot(&store, 120);
        let dbb = snap.extremes.reading(&"DBB".into()).unwrap();
        assert_eq!(dbb.value, None);
        assert!(!dbb.extreme);
        assert!(snap.latest(&"XLI".into()).is_some());
        // Spread I_U needs XLU today too
        assert_eq!(snap.latest(&"I_U".into()), None);
    }

    fn collapse_store() -> PriceHistoryStore {
        let mut store = flat_store(150, &all_symbols());
        for s in all_symbols() {
            let px = if s == "SLV" { 70.0 } else { 100.0 };
            store.append(&Instrument::new(s), day(150), px);
        }
        store
    }

    #[test]
    fn test_early_tradable_bar_does_not_move_today() {
        let engine = MomentumSignalEngine::new(SignalUniverse::default(), 1.0);
        let mut store = collapse_store();
        store.append(&Instrument::new("QQQ"), day(151), 300.0);
        store.append(&Instrument::new("SPY"), day(151), 400.0);

        let snap = engine.compute_snapshot(&store, 150);
        assert_eq!(snap.as_of, Some(day(150)));
        assert!(snap.extremes.is_extreme(&"S_G".into()));
    }

    #[test]
    fn test_snapshot_at_ignores_next_session_rows() {
        let engine = MomentumSignalEngine::new(SignalUniverse::default(), 1.0);
        let mut store = collapse_store();
        // SLV and GLD print early for the next session
        store.append(&Instrument::new("SLV"), day(151), 100.0);
        store.append(&Instrument::new("GLD"), day(151), 100.0);

        let snap = engine.compute_snapshot_at(&store, 150, day(150));
        assert_eq!(snap.as_of, Some(day(150)));
        assert!((snap.latest(&"S_G".into()).unwrap() + 0.3).abs() < 1e-9);
        assert!(snap.extremes.is_extreme(&"S_G".into()));
        assert!(snap.extremes.reading(&"DBB".into()).unwrap().value.is_some());
    }

    #[test]
    fn test_required_instruments_deduplicated() {
        let required = SignalUniverse::default().required_instruments();
        assert_eq!(required.len(), 10);
        assert!(required.contains(&Instrument::new("FXF")));
    }
}
