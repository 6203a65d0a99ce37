//! Non-standard events: detection, manual annotations, and reconciliation.

pub mod detector;
pub mod manual;
pub mod merge;

use std::fmt;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

pub use detector::{detect_events, flag_samples, DetectionResult};
pub use manual::{parse_manual_events, ManualEvent, ManualEventRow, ManualEventTable};
pub use merge::reconcile_events;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Rain,
    Irrigation,
    Drain,
    Fertilizer,
    Unknown,
    Custom(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Rain => "Rain",
            EventKind::Irrigation => "Irrigation",
            EventKind::Drain => "Drain",
            EventKind::Fertilizer => "Fertilizer",
            EventKind::Unknown => "Unknown",
            EventKind::Custom(label) => label.as_str(),
        }
    }

    /// Lenient label parsing; unrecognised labels are kept verbatim.
    pub fn from_label(label: &str) -> Self {
        let trimmed = label.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "" | "unknown" => EventKind::Unknown,
            "rain" | "rainfall" => EventKind::Rain,
            "irrigation" | "irrigate" => EventKind::Irrigation,
            "drain" | "drainage" => EventKind::Drain,
            "fertilizer" | "fertiliser" | "fertilization" => EventKind::Fertilizer,
            _ => EventKind::Custom(trimmed.to_string()),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for EventKind {
    fn from(value: &str) -> Self {
        EventKind::from_label(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventSource {
    Automatic,
    Manual,
    ManualConfirmed,
}

impl EventSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSource::Automatic => "Automatic",
            EventSource::Manual => "Manual",
            EventSource::ManualConfirmed => "Manual-confirmed",
        }
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NonStandardEvent {
    pub start: NaiveDateTime,
    pub stop: NaiveDateTime,
    pub kind: EventKind,
    pub source: EventSource,
    pub notes: Option<String>,
}

impl NonStandardEvent {
    pub fn automatic(start: NaiveDateTime, stop: NaiveDateTime) -> Self {
        Self {
            start,
            stop,
            kind: EventKind::Unknown,
            source: EventSource::Automatic,
            notes: None,
        }
    }

    pub fn duration(&self) -> Duration {
        self.stop - self.start
    }

    /// Spans overlap when they share more than an endpoint.
    pub fn overlaps(&self, other: &NonStandardEvent) -> bool {
        spans_overlap(self.start, self.stop, other.start, other.stop)
    }

    /// Whether the sampling interval `(from, to]` falls (partly) inside this span.
    ///
    /// Sharing only an endpoint does not count, except for instantaneous spans,
    /// which claim the interval they fall in.
    pub fn touches_interval(&self, from: NaiveDateTime, to: NaiveDateTime) -> bool {
        if self.start == self.stop {
            return from < self.start && self.start <= to;
        }
        from < self.stop && self.start < to
    }
}

/// Half-open overlap of `[a_start, a_stop]` and `[b_start, b_stop]`.
///
/// An instantaneous span overlaps a longer one when it falls in `(start, stop]`,
/// matching [`NonStandardEvent::touches_interval`].
pub(crate) fn spans_overlap(
    a_start: NaiveDateTime,
    a_stop: NaiveDateTime,
    b_start: NaiveDateTime,
    b_stop: NaiveDateTime,
) -> bool {
    match (a_start == a_stop, b_start == b_stop) {
        (true, true) => a_start == b_start,
        (true, false) => b_start < a_start && a_start <= b_stop,
        (false, true) => a_start < b_start && b_start <= a_stop,
        (false, false) => a_start < b_stop && b_start < a_stop,
    }
}

impl fmt::Display for NonStandardEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {} .. {}",
            self.kind, self.source, self.start, self.stop
        )
    }
}
