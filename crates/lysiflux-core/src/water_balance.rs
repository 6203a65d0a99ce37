//! Per-interval ETa, gap interpolation across non-standard events, and cumulation.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::calibration::CalibrationParameters;
use crate::error::DataContinuityWarning;
use crate::events::NonStandardEvent;
use crate::series::ChannelSeries;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EtaStatus {
    Measured,
    Interpolated,
    /// Inside an event span with no anchor on one side.
    Unresolved,
    /// Missing reading with no anchor on one side.
    MissingReading,
}

impl EtaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EtaStatus::Measured => "measured",
            EtaStatus::Interpolated => "interpolated",
            EtaStatus::Unresolved => "unresolved",
            EtaStatus::MissingReading => "missing_reading",
        }
    }
}

/// ETa over the sampling interval `(start, end]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntervalEta {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub eta_mm: Option<f64>,
    pub status: EtaStatus,
    pub cumulative_eta_mm: f64,
}

impl IntervalEta {
    pub fn is_interpolated(&self) -> bool {
        self.status == EtaStatus::Interpolated
    }

    fn duration_secs(&self) -> f64 {
        (self.end - self.start).num_milliseconds() as f64 / 1000.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaterBalance {
    pub channel: String,
    pub intervals: Vec<IntervalEta>,
    pub warnings: Vec<DataContinuityWarning>,
}

impl WaterBalance {
    pub fn total_eta_mm(&self) -> f64 {
        self.intervals
            .last()
            .map(|interval| interval.cumulative_eta_mm)
            .unwrap_or(0.0)
    }

    pub fn interpolated_count(&self) -> usize {
        self.intervals.iter().filter(|i| i.is_interpolated()).count()
    }
}

/// Running sum of ETa that records every decrease instead of clipping it.
#[derive(Debug, Clone, Default)]
pub struct CumulativeAccumulator {
    total: f64,
    decreasing: usize,
    first_decrease: Option<NaiveDateTime>,
}

impl CumulativeAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `eta_mm` (missing adds nothing) and returns the running total.
    pub fn push(&mut self, at: NaiveDateTime, eta_mm: Option<f64>) -> f64 {
        if let Some(eta) = eta_mm {
            if eta < 0.0 {
                self.decreasing += 1;
                self.first_decrease.get_or_insert(at);
            }
            self.total += eta;
        }
        self.total
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn finish(self) -> Option<DataContinuityWarning> {
        self.first_decrease
            .map(|first_decrease| DataContinuityWarning::NonMonotonicCumulative {
                first_decrease,
                decreasing_intervals: self.decreasing,
            })
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    start: NaiveDateTime,
    end: NaiveDateTime,
    eta_mm: Option<f64>,
    in_event: bool,
    missing_reading: bool,
}

impl Slot {
    fn excluded(&self) -> bool {
        self.in_event || self.missing_reading
    }

    fn duration_secs(&self) -> f64 {
        (self.end - self.start).num_milliseconds() as f64 / 1000.0
    }
}

/// Computes ETa for every interval of `series`, filling event spans and missing
/// readings by linear interpolation between the neighbouring measured rates.
///
/// Measured intervals get `ETa = -CF * (signal[i] - signal[i-1])`, so weight loss
/// is positive ETa. For a gap from `t0` to `t1` the ETa rate is taken to move
/// linearly from `ETa_pre / dur_pre` to `ETa_post / dur_post`, and each gap interval
/// receives that rate integrated over its own duration. The gap total is therefore
/// the trapezoid `(t1 - t0) * (rate_pre + rate_post) / 2`.
pub fn compute_water_balance(
    series: &ChannelSeries,
    events: &[NonStandardEvent],
    calibration: &CalibrationParameters,
) -> WaterBalance {
    let mut slots = measure(series, events, calibration);
    let mut statuses = vec![EtaStatus::Measured; slots.len()];
    let mut warnings = Vec::new();

    let mut idx = 0;
    while idx < slots.len() {
        if !slots[idx].excluded() {
            idx += 1;
            continue;
        }
        let first = idx;
        while idx < slots.len() && slots[idx].excluded() {
            idx += 1;
        }
        let last = idx - 1;

        let pre = first.checked_sub(1).map(|i| slots[i]);
        let post = slots.get(last + 1).copied();
        let gap = &mut slots[first..=last];

        match (pre, post) {
            (Some(pre), Some(post)) => {
                if let Some(warning) = fill_gap(gap, &pre, &post) {
                    warnings.push(warning);
                }
                statuses[first..=last].fill(EtaStatus::Interpolated);
            }
            _ => {
                let status = if gap.iter().any(|slot| slot.in_event) {
                    EtaStatus::Unresolved
                } else {
                    EtaStatus::MissingReading
                };
                for slot in gap.iter_mut() {
                    slot.eta_mm = None;
                }
                statuses[first..=last].fill(status);
                warnings.push(DataContinuityWarning::UnanchoredGap {
                    start: gap[0].start,
                    end: gap[gap.len() - 1].end,
                    intervals: gap.len(),
                });
            }
        }
    }

    let mut accumulator = CumulativeAccumulator::new();
    let intervals: Vec<IntervalEta> = slots
        .iter()
        .zip(statuses)
        .map(|(slot, status)| IntervalEta {
            start: slot.start,
            end: slot.end,
            eta_mm: slot.eta_mm,
            status,
            cumulative_eta_mm: accumulator.push(slot.end, slot.eta_mm),
        })
        .collect();
    warnings.extend(accumulator.finish());

    debug!(
        channel = %series.name,
        intervals = intervals.len(),
        interpolated = intervals.iter().filter(|i| i.is_interpolated()).count(),
        warnings = warnings.len(),
        "Water balance computed"
    );

    WaterBalance {
        channel: series.name.clone(),
        intervals,
        warnings,
    }
}

/// Sum of interpolated ETa a gap between `pre` and `post` should receive.
pub fn trapezoid_estimate(
    pre: &IntervalEta,
    post: &IntervalEta,
    gap_start: NaiveDateTime,
    gap_end: NaiveDateTime,
) -> Option<f64> {
    let rate_pre = pre.eta_mm? / pre.duration_secs();
    let rate_post = post.eta_mm? / post.duration_secs();
    let span = (gap_end - gap_start).num_milliseconds() as f64 / 1000.0;
    Some(span * (rate_pre + rate_post) / 2.0)
}

fn measure(
    series: &ChannelSeries,
    events: &[NonStandardEvent],
    calibration: &CalibrationParameters,
) -> Vec<Slot> {
    let ts = &series.timestamps;
    let values = &series.values;

    let mut spans: Vec<&NonStandardEvent> = events.iter().collect();
    spans.sort_by_key(|event| (event.start, event.stop));
    // Spans before the cursor end at or before the current interval's start.
    let mut cursor = 0;

    (1..series.len())
        .map(|idx| {
            let start = ts[idx - 1];
            let end = ts[idx];
            while cursor < spans.len() && spans[cursor].stop <= start {
                cursor += 1;
            }
            let in_event = spans[cursor..]
                .iter()
                .take_while(|event| event.start <= end)
                .any(|event| event.touches_interval(start, end));
            let missing_reading = !values[idx - 1].is_finite() || !values[idx].is_finite();
            let eta_mm = if in_event || missing_reading {
                None
            } else {
                Some(-calibration.to_depth_mm(values[idx] - values[idx - 1]))
            };
            Slot {
                start,
                end,
                eta_mm,
                in_event,
                missing_reading,
            }
        })
        .collect()
}

fn fill_gap(gap: &mut [Slot], pre: &Slot, post: &Slot) -> Option<DataContinuityWarning> {
    let (Some(eta_pre), Some(eta_post)) = (pre.eta_mm, post.eta_mm) else {
        return None;
    };
    let rate_pre = eta_pre / pre.duration_secs();
    let rate_post = eta_post / post.duration_secs();

    let gap_start = gap[0].start;
    let gap_end = gap[gap.len() - 1].end;
    let span = (gap_end - gap_start).num_milliseconds() as f64 / 1000.0;

    let mut most_negative: Option<f64> = None;
    for slot in gap.iter_mut() {
        let from = (slot.start - gap_start).num_milliseconds() as f64 / 1000.0;
        let to = (slot.end - gap_start).num_milliseconds() as f64 / 1000.0;
        let midpoint = (from + to) / 2.0;
        let rate = rate_pre + (rate_post - rate_pre) * midpoint / span;
        let eta = rate * (to - from);
        if eta < 0.0 {
            most_negative = Some(most_negative.map_or(eta, |current| current.min(eta)));
        }
        slot.eta_mm = Some(eta);
    }

    most_negative.map(|eta_mm| DataContinuityWarning::NegativeInterpolatedEta {
        start: gap_start,
        end: gap_end,
        eta_mm,
    })
}
