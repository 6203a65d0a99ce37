// crates/lysiflux-core/src/error.rs

use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("unknown lysimeter type '{0}'")]
    UnknownPreset(String),

    #[error("custom calibration requires both alpha and beta (alpha: {alpha:?}, beta: {beta:?})")]
    IncompleteCustomPair {
        alpha: Option<f64>,
        beta: Option<f64>,
    },

    #[error("beta (effective lysimeter area) must be > 0 m², got {0}")]
    NonPositiveBeta(f64),

    #[error("alpha (load-cell slope) must be finite and > 0, got {0}")]
    InvalidAlpha(f64),

    #[error("detection threshold must be finite and > 0 mV/V, got {0}")]
    InvalidThreshold(f64),

    #[error("invalid frequency code '{code}': {reason}")]
    InvalidFrequency { code: String, reason: String },

    #[error("invalid sampling interval '{0}'")]
    InvalidSamplingInterval(String),

    #[error(
        "output frequency {frequency} is finer than the input sampling interval of {input_minutes} minutes"
    )]
    FrequencyFinerThanInput {
        frequency: String,
        input_minutes: i64,
    },

    #[error("invalid season date '{0}' (expected YYYY-MM-DD or MM-DD-YYYY)")]
    InvalidSeasonDate(String),

    #[error("failed to read run configuration: {0}")]
    Toml(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    #[error("signal table has no '{0}' column")]
    MissingColumn(String),

    #[error("column '{column}' has an unsupported type: {dtype}")]
    UnsupportedColumnType { column: String, dtype: String },

    #[error("channel '{channel}' has {values} readings for {timestamps} timestamps")]
    LengthMismatch {
        channel: String,
        timestamps: usize,
        values: usize,
    },

    #[error("duplicate timestamp {timestamp} at row {row}")]
    DuplicateTimestamp { row: usize, timestamp: NaiveDateTime },

    #[error("timestamp {timestamp} at row {row} is earlier than the previous row")]
    DecreasingTimestamp { row: usize, timestamp: NaiveDateTime },

    #[error("null timestamp at row {0}")]
    NullTimestamp(usize),

    #[error("timestamp value {0} is out of range")]
    TimestampOutOfRange(i64),

    #[error("row {row}: cannot parse timestamp '{value}'")]
    InvalidTimestamp { row: usize, value: String },

    #[error("row {row}: column '{column}' has non-numeric value '{value}'")]
    InvalidReading {
        row: usize,
        column: String,
        value: String,
    },

    #[error("table has no data rows")]
    EmptyTable,

    #[error("no load-cell channels to process")]
    NoChannels,
}

/// Rejected row of a manual event table.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum ParseError {
    #[error("manual event row {row}: {message}")]
    MalformedRow { row: usize, message: String },

    #[error("manual event row {row}: cannot parse {field} '{value}'")]
    InvalidTimestamp {
        row: usize,
        field: &'static str,
        value: String,
    },

    #[error("manual event row {row}: stop {stop} is before start {start}")]
    StopBeforeStart {
        row: usize,
        start: NaiveDateTime,
        stop: NaiveDateTime,
    },

    #[error("manual event table is missing the '{0}' column")]
    MissingColumn(&'static str),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DataContinuityWarning {
    /// Gap touching the series boundary, so one interpolation anchor is absent.
    UnanchoredGap {
        start: NaiveDateTime,
        end: NaiveDateTime,
        intervals: usize,
    },
    NegativeInterpolatedEta {
        start: NaiveDateTime,
        end: NaiveDateTime,
        eta_mm: f64,
    },
    NonMonotonicCumulative {
        first_decrease: NaiveDateTime,
        decreasing_intervals: usize,
    },
}

impl fmt::Display for DataContinuityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataContinuityWarning::UnanchoredGap {
                start,
                end,
                intervals,
            } => write!(
                f,
                "gap {start} .. {end} ({intervals} intervals) has no anchor on one side; ETa left missing"
            ),
            DataContinuityWarning::NegativeInterpolatedEta { start, end, eta_mm } => write!(
                f,
                "interpolated ETa {eta_mm:.4} mm over {start} .. {end} is negative"
            ),
            DataContinuityWarning::NonMonotonicCumulative {
                first_decrease,
                decreasing_intervals,
            } => write!(
                f,
                "cumulative ETa decreased over {decreasing_intervals} intervals, first at {first_decrease}"
            ),
        }
    }
}

/// Non-fatal issue surfaced next to the run results.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunWarning {
    ManualEventRejected {
        error: ParseError,
    },
    DataContinuity {
        channel: String,
        warning: DataContinuityWarning,
    },
    MissingReferenceData {
        channel: String,
        periods: usize,
    },
}

impl fmt::Display for RunWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunWarning::ManualEventRejected { error } => write!(f, "{error}"),
            RunWarning::DataContinuity { channel, warning } => write!(f, "{channel}: {warning}"),
            RunWarning::MissingReferenceData { channel, periods } => write!(
                f,
                "{channel}: no reference ET for {periods} periods; Kc left missing"
            ),
        }
    }
}

#[derive(Error, Debug)]
pub enum LysiError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("input data error: {0}")]
    Data(#[from] DataError),

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LysiError>;
