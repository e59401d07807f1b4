use crate::data::{Instrument, PriceBar, RingBuffer};
use crate::strategy::selection::TrailingHistory;
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::trace;

/// Host-side daily close log answering on-demand trailing history requests.
///
/// Kept apart from `PriceHistoryStore`: the selector looks back over its own
/// horizon and must not depend on the momentum window.
#[derive(Debug, Clone)]
pub struct DailyCloseLog {
    capacity: usize,
    closes: HashMap<Instrument, RingBuffer<(NaiveDate, f64)>>,
}

impl DailyCloseLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            closes: HashMap::new(),
        }
    }

    /// Record a close; a repeated date replaces the earlier close and a late
    /// bar is inserted in date order, matching `PriceHistoryStore`. A late
    /// bar older than everything retained in a full log is dropped.
    pub fn record(&mut self, bar: &PriceBar) {
        let capacity = self.capacity;
        let buf = self
            .closes
            .entry(bar.instrument.clone())
            .or_insert_with(|| RingBuffer::with_capacity(capacity));

        match buf.last().map(|(date, _)| *date) {
            Some(last) if last == bar.date => {
                if let Some(entry) = buf.last_mut() {
                    entry.1 = bar.close;
                }
            }
            Some(last) if last > bar.date => {
                let full = buf.is_full();
                let mut closes = buf.drain_ordered();
                match closes.binary_search_by(|(d, _)| d.cmp(&bar.date)) {
                    Ok(pos) => closes[pos].1 = bar.close,
                    Err(0) if full => {
                        trace!(instrument = %bar.instrument, date = %bar.date, "late close older than log, dropped");
                    }
                    Err(pos) => closes.insert(pos, (bar.date, bar.close)),
                }
                buf.replace_from(closes);
            }
            _ => {
                buf.push((bar.date, bar.close));
            }
        }
    }

    pub fn len(&self, instrument: &Instrument) -> usize {
        self.closes.get(instrument).map_or(0, RingBuffer::len)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl TrailingHistory for DailyCloseLog {
    fn trailing_closes(&self, instrument: &Instrument, sessions: usize) -> Option<Vec<f64>> {
        let buf = self.closes.get(instrument)?;
        let skip = buf.len().saturating_sub(sessions);
        let closes: Vec<f64> = buf.iter().skip(skip).map(|(_, c)| *c).collect();
        if closes.is_empty() {
            None
        } else {
            Some(closes)
        }
    }
}
