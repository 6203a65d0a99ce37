use chrono::Duration;
use tracing::debug;

use crate::events::NonStandardEvent;
use crate::frequency::SamplingInterval;
use crate::series::ChannelSeries;

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    /// `flags[t]` is set when the step into sample `t` exceeded the threshold.
    pub flags: Vec<bool>,
    pub events: Vec<NonStandardEvent>,
}

impl DetectionResult {
    pub fn flagged_count(&self) -> usize {
        self.flags.iter().filter(|flag| **flag).count()
    }
}

/// Flags sample `t` when `|signal[t] - signal[t-1]| > threshold` (mV/V).
///
/// Pairs involving a missing reading are never flagged.
pub fn flag_samples(values: &[f64], threshold: f64) -> Vec<bool> {
    let mut flags = vec![false; values.len()];
    for (idx, window) in values.windows(2).enumerate() {
        let (prev, curr) = (window[0], window[1]);
        if prev.is_finite() && curr.is_finite() && (curr - prev).abs() > threshold {
            flags[idx + 1] = true;
        }
    }
    flags
}

/// Automatic pass: flag threshold excursions and coalesce adjacent flags into spans.
///
/// Each flagged sample `t` stands for the interval `(ts[t-1], ts[t]]`. Flagged
/// samples that are index-adjacent and at most one sampling interval apart share
/// a span `[ts[first-1], ts[last]]`.
pub fn detect_events(
    series: &ChannelSeries,
    threshold: f64,
    interval: Option<SamplingInterval>,
) -> DetectionResult {
    let flags = flag_samples(&series.values, threshold);
    let ts = &series.timestamps;

    let max_step = interval
        .or_else(|| SamplingInterval::infer(ts))
        .map(|interval| interval.duration())
        .unwrap_or_else(Duration::zero);

    let mut events = Vec::new();
    let mut run: Option<(usize, usize)> = None;

    for (idx, &flagged) in flags.iter().enumerate() {
        if !flagged {
            continue;
        }
        run = match run {
            Some((first, last)) if last + 1 == idx && ts[idx] - ts[last] <= max_step => {
                Some((first, idx))
            }
            Some((first, last)) => {
                events.push(NonStandardEvent::automatic(ts[first - 1], ts[last]));
                Some((idx, idx))
            }
            None => Some((idx, idx)),
        };
    }
    if let Some((first, last)) = run {
        events.push(NonStandardEvent::automatic(ts[first - 1], ts[last]));
    }

    debug!(
        channel = %series.name,
        threshold,
        flagged = flags.iter().filter(|flag| **flag).count(),
        spans = events.len(),
        "Automatic NSE pass complete"
    );

    DetectionResult { flags, events }
}
