use chrono::NaiveDateTime;
use serde::Serialize;

use crate::frequency::Frequency;
use crate::water_balance::{CumulativeAccumulator, IntervalEta};

/// Water balance over one output period `[period_start, period_end)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaterBalanceRecord {
    pub period_start: NaiveDateTime,
    pub period_end: NaiveDateTime,
    pub eta_mm: Option<f64>,
    /// Set when any contributing interval was interpolated.
    pub interpolated: bool,
    pub cumulative_eta_mm: f64,
    pub etr_mm: Option<f64>,
    pub kc: Option<f64>,
    pub interval_count: usize,
    pub missing_count: usize,
}

impl WaterBalanceRecord {
    fn open(period_start: NaiveDateTime, period_end: NaiveDateTime) -> Self {
        Self {
            period_start,
            period_end,
            eta_mm: None,
            interpolated: false,
            cumulative_eta_mm: 0.0,
            etr_mm: None,
            kc: None,
            interval_count: 0,
            missing_count: 0,
        }
    }

    fn absorb(&mut self, interval: &IntervalEta) {
        self.interval_count += 1;
        self.interpolated |= interval.is_interpolated();
        match interval.eta_mm {
            Some(eta) => *self.eta_mm.get_or_insert(0.0) += eta,
            None => self.missing_count += 1,
        }
    }
}

/// Aggregates per-interval ETa into output periods.
///
/// An interval `(a, b]` lands in the period containing `a`. Periods with no
/// intervals are not emitted. Without a frequency every interval becomes its own
/// record.
pub fn resample(
    intervals: &[IntervalEta],
    frequency: Option<Frequency>,
) -> Vec<WaterBalanceRecord> {
    let Some(frequency) = frequency else {
        return intervals
            .iter()
            .map(|interval| {
                let mut record = WaterBalanceRecord::open(interval.start, interval.end);
                record.absorb(interval);
                record.cumulative_eta_mm = interval.cumulative_eta_mm;
                record
            })
            .collect();
    };

    let Some(origin) = intervals.first().map(|interval| interval.start) else {
        return Vec::new();
    };

    let mut records: Vec<WaterBalanceRecord> = Vec::new();
    for interval in intervals {
        let period_start = frequency.period_start(origin, interval.start);
        let same_period = records
            .last()
            .is_some_and(|current| current.period_start == period_start);
        if !same_period {
            let period_end = frequency.next_period_start(period_start);
            records.push(WaterBalanceRecord::open(period_start, period_end));
        }
        if let Some(current) = records.last_mut() {
            current.absorb(interval);
        }
    }

    let mut accumulator = CumulativeAccumulator::new();
    for record in &mut records {
        record.cumulative_eta_mm = accumulator.push(record.period_start, record.eta_mm);
    }
    records
}
