//! Conversions between polars `DataFrame`s, CSV text, and the typed series.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use csv::{ReaderBuilder, Trim};
use polars::prelude::*;

use crate::error::{DataError, LysiError};
use crate::events::manual::parse_event_datetime;
use crate::events::NonStandardEvent;
use crate::pipeline::ChannelResult;
use crate::series::ChannelSeries;

pub const TIMESTAMP_COLUMN: &str = "timestamp";
pub const OUTPUT_TIMESTAMP_COLUMN: &str = "TIMESTAMP";

const TABLE_DATETIME_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
];

/// Reads a datetime (or date) column as naive timestamps. Nulls are rejected.
pub fn column_timestamps(df: &DataFrame, name: &str) -> Result<Vec<NaiveDateTime>, LysiError> {
    let column = df
        .column(name)
        .map_err(|_| DataError::MissingColumn(name.to_string()))?;

    let converted: Vec<Option<NaiveDateTime>> = match column.dtype() {
        DataType::Datetime(unit, _) => {
            let unit = *unit;
            let raw = column.cast(&DataType::Int64)?;
            raw.i64()?
                .into_iter()
                .map(|value| value.map(|v| from_epoch(v, unit).ok_or(v)))
                .map(|value| value.transpose())
                .collect::<Result<_, i64>>()
                .map_err(DataError::TimestampOutOfRange)?
        }
        DataType::Date => {
            let raw = column.cast(&DataType::Int32)?;
            raw.i32()?
                .into_iter()
                .map(|value| {
                    value.map(|days| {
                        DateTime::<Utc>::from_timestamp(i64::from(days) * 86_400, 0)
                            .map(|dt| dt.naive_utc())
                            .ok_or(i64::from(days))
                    })
                })
                .map(|value| value.transpose())
                .collect::<Result<_, i64>>()
                .map_err(DataError::TimestampOutOfRange)?
        }
        other => {
            return Err(DataError::UnsupportedColumnType {
                column: name.to_string(),
                dtype: other.to_string(),
            }
            .into())
        }
    };

    converted
        .into_iter()
        .enumerate()
        .map(|(row, value)| value.ok_or(DataError::NullTimestamp(row)))
        .collect::<Result<Vec<_>, _>>()
        .map_err(LysiError::from)
}

fn from_epoch(value: i64, unit: TimeUnit) -> Option<NaiveDateTime> {
    let dt = match unit {
        TimeUnit::Nanoseconds => Some(DateTime::<Utc>::from_timestamp_nanos(value)),
        TimeUnit::Microseconds => DateTime::<Utc>::from_timestamp_micros(value),
        TimeUnit::Milliseconds => DateTime::<Utc>::from_timestamp_millis(value),
    };
    dt.map(|dt| dt.naive_utc())
}

fn is_reading_column(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float64
            | DataType::Float32
            | DataType::Int64
            | DataType::Int32
            | DataType::Int16
            | DataType::Int8
            | DataType::UInt64
            | DataType::UInt32
            | DataType::UInt16
            | DataType::UInt8
    )
}

/// Splits a signal table into one `ChannelSeries` per load-cell column.
///
/// With `channels = None` every numeric column besides the timestamp is used.
/// Null readings become `NaN`.
pub fn channels_from_frame(
    df: &DataFrame,
    timestamp_column: &str,
    channels: Option<&[String]>,
) -> Result<Vec<ChannelSeries>, LysiError> {
    let timestamps = column_timestamps(df, timestamp_column)?;

    let names: Vec<String> = match channels {
        Some(names) => names.to_vec(),
        None => df
            .get_columns()
            .iter()
            .filter(|column| column.name().as_str() != timestamp_column)
            .filter(|column| is_reading_column(column.dtype()))
            .map(|column| column.name().to_string())
            .collect(),
    };
    if names.is_empty() {
        return Err(DataError::NoChannels.into());
    }

    let mut series = Vec::with_capacity(names.len());
    for name in names {
        let column = df
            .column(&name)
            .map_err(|_| DataError::MissingColumn(name.clone()))?;
        if !is_reading_column(column.dtype()) {
            return Err(DataError::UnsupportedColumnType {
                column: name,
                dtype: column.dtype().to_string(),
            }
            .into());
        }
        let values: Vec<f64> = column
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|value| value.unwrap_or(f64::NAN))
            .collect();
        series.push(ChannelSeries::new(name, timestamps.clone(), values)?);
    }
    Ok(series)
}

/// Parses a timestamp cell of a signal or reference-ET table. Date-only cells map
/// to midnight.
pub fn parse_table_datetime(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    TABLE_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .or_else(|| parse_event_datetime(trimmed))
        .or_else(|| {
            ["%Y-%m-%d", "%m/%d/%Y"]
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
                .map(|date| date.and_time(NaiveTime::MIN))
        })
}

fn parse_reading(value: &str) -> Option<Option<f64>> {
    let trimmed = value.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("nan")
        || trimmed.eq_ignore_ascii_case("na")
    {
        return Some(None);
    }
    trimmed.parse::<f64>().ok().map(Some)
}

/// Builds a frame from CSV text whose first column is the timestamp and whose
/// remaining columns are numeric. The timestamp column is renamed to `timestamp`.
pub fn frame_from_csv(content: &str) -> Result<DataFrame, LysiError> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .from_reader(content.as_bytes());
    let headers = reader.headers()?.clone();
    let value_names: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

    let mut timestamps: Vec<i64> = Vec::new();
    let mut columns: Vec<Vec<Option<f64>>> = vec![Vec::new(); value_names.len()];

    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        let row = idx + 1;
        if record.iter().all(str::is_empty) {
            continue;
        }

        let raw_ts = record.get(0).unwrap_or("");
        let ts = parse_table_datetime(raw_ts).ok_or_else(|| DataError::InvalidTimestamp {
            row,
            value: raw_ts.to_string(),
        })?;
        timestamps.push(ts.and_utc().timestamp_micros());

        for (col_idx, values) in columns.iter_mut().enumerate() {
            let raw = record.get(col_idx + 1).unwrap_or("");
            let value = parse_reading(raw).ok_or_else(|| DataError::InvalidReading {
                row,
                column: value_names[col_idx].clone(),
                value: raw.to_string(),
            })?;
            values.push(value);
        }
    }

    if timestamps.is_empty() {
        return Err(DataError::EmptyTable.into());
    }

    let ts_series = Series::new(TIMESTAMP_COLUMN.into(), timestamps)
        .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?;
    let mut cols: Vec<Column> = Vec::with_capacity(value_names.len() + 1);
    cols.push(ts_series.into());
    for (name, values) in value_names.iter().zip(columns) {
        cols.push(Series::new(name.as_str().into(), values).into());
    }

    Ok(DataFrame::new(cols)?)
}

fn datetime_series(
    name: &str,
    values: impl Iterator<Item = NaiveDateTime>,
) -> PolarsResult<Series> {
    let micros: Vec<i64> = values.map(|ts| ts.and_utc().timestamp_micros()).collect();
    Series::new(name.into(), micros).cast(&DataType::Datetime(TimeUnit::Microseconds, None))
}

/// Wide output table: `TIMESTAMP`, then per channel `{ch}_ETa`,
/// `{ch}_Cumulative_ETa`, `{ch}_interpolated`, and with reference data `ETr` and
/// `{ch}_Kc`.
pub fn water_balance_frame(
    channels: &[ChannelResult],
    include_reference: bool,
) -> Result<DataFrame, LysiError> {
    let Some(first) = channels.first() else {
        return Err(DataError::NoChannels.into());
    };

    let mut cols: Vec<Column> = Vec::new();
    cols.push(
        datetime_series(
            OUTPUT_TIMESTAMP_COLUMN,
            first.records.iter().map(|record| record.period_start),
        )?
        .into(),
    );

    for channel in channels {
        if channel.records.len() != first.records.len() {
            return Err(DataError::LengthMismatch {
                channel: channel.channel.clone(),
                timestamps: first.records.len(),
                values: channel.records.len(),
            }
            .into());
        }
        let name = &channel.channel;
        let eta: Vec<Option<f64>> = channel.records.iter().map(|r| r.eta_mm).collect();
        let cumulative: Vec<f64> = channel.records.iter().map(|r| r.cumulative_eta_mm).collect();
        let interpolated: Vec<bool> = channel.records.iter().map(|r| r.interpolated).collect();
        cols.push(Series::new(format!("{name}_ETa").into(), eta).into());
        cols.push(Series::new(format!("{name}_Cumulative_ETa").into(), cumulative).into());
        cols.push(Series::new(format!("{name}_interpolated").into(), interpolated).into());
    }

    if include_reference {
        let etr: Vec<Option<f64>> = first.records.iter().map(|r| r.etr_mm).collect();
        cols.push(Series::new("ETr".into(), etr).into());
        for channel in channels {
            let kc: Vec<Option<f64>> = channel.records.iter().map(|r| r.kc).collect();
            cols.push(Series::new(format!("{}_Kc", channel.channel).into(), kc).into());
        }
    }

    Ok(DataFrame::new(cols)?)
}

/// Long table of reconciled NSE spans, one row per channel and span.
pub fn events_frame(channels: &[ChannelResult]) -> Result<DataFrame, LysiError> {
    let rows: Vec<(&str, &NonStandardEvent)> = channels
        .iter()
        .flat_map(|channel| {
            channel
                .events
                .iter()
                .map(move |event| (channel.channel.as_str(), event))
        })
        .collect();

    let channel: Vec<&str> = rows.iter().map(|(name, _)| *name).collect();
    let kind: Vec<&str> = rows.iter().map(|(_, event)| event.kind.as_str()).collect();
    let source: Vec<&str> = rows.iter().map(|(_, event)| event.source.as_str()).collect();
    let notes: Vec<Option<&str>> = rows
        .iter()
        .map(|(_, event)| event.notes.as_deref())
        .collect();

    let df = DataFrame::new(vec![
        Series::new("channel".into(), channel).into(),
        datetime_series("start", rows.iter().map(|(_, event)| event.start))?.into(),
        datetime_series("stop", rows.iter().map(|(_, event)| event.stop))?.into(),
        Series::new("event_type".into(), kind).into(),
        Series::new("source".into(), source).into(),
        Series::new("notes".into(), notes).into(),
    ])?;
    Ok(df)
}
