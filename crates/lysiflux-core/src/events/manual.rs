use chrono::NaiveDateTime;
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ParseError;
use crate::events::EventKind;

const EVENT_TYPE_COLUMN: &str = "Event Type";
const START_COLUMN: &str = "Start Datetime";
const STOP_COLUMN: &str = "Stop Datetime";
const NOTES_COLUMN: &str = "Notes";

const DATETIME_FORMATS: [&str; 4] = [
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// One unparsed row of a manual event table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManualEventRow {
    pub event_type: String,
    pub start: String,
    pub stop: String,
    pub notes: Option<String>,
}

/// A validated manual annotation. `order` is its position in the source table;
/// later entries win overlaps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManualEvent {
    pub order: usize,
    pub kind: EventKind,
    pub start: NaiveDateTime,
    pub stop: NaiveDateTime,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManualEventTable {
    pub events: Vec<ManualEvent>,
    pub rejected: Vec<ParseError>,
}

impl ManualEventTable {
    /// Validates already-split rows; `row` numbers in errors are 1-based.
    pub fn from_rows(rows: &[ManualEventRow]) -> Self {
        let mut table = ManualEventTable::default();
        for (idx, row) in rows.iter().enumerate() {
            table.push_row(idx + 1, row);
        }
        table
    }

    fn push_row(&mut self, row_number: usize, row: &ManualEventRow) {
        match validate_row(row_number, row) {
            Ok(event) => self.events.push(event),
            Err(err) => {
                warn!(error = %err, "Dropping manual event row");
                self.rejected.push(err);
            }
        }
    }
}

/// Parses a CSV table with `Event Type, Start Datetime, Stop Datetime[, Notes]` headers.
///
/// Malformed rows are dropped and reported in `rejected`; a table missing a required
/// header yields no events.
pub fn parse_manual_events(content: &str) -> ManualEventTable {
    let mut table = ManualEventTable::default();
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = match reader.headers() {
        Ok(headers) => headers.clone(),
        Err(err) => {
            table.rejected.push(ParseError::MalformedRow {
                row: 0,
                message: err.to_string(),
            });
            return table;
        }
    };

    let columns = match locate_columns(&headers) {
        Ok(columns) => columns,
        Err(err) => {
            warn!(error = %err, "Manual event table rejected");
            table.rejected.push(err);
            return table;
        }
    };

    for (idx, record) in reader.records().enumerate() {
        let row_number = idx + 1;
        match record {
            Ok(record) => {
                if record.iter().all(str::is_empty) {
                    continue;
                }
                let row = columns.extract(&record);
                table.push_row(row_number, &row);
            }
            Err(err) => {
                let err = ParseError::MalformedRow {
                    row: row_number,
                    message: err.to_string(),
                };
                warn!(error = %err, "Dropping manual event row");
                table.rejected.push(err);
            }
        }
    }

    table
}

pub fn parse_event_datetime(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
}

struct ColumnIndexes {
    event_type: usize,
    start: usize,
    stop: usize,
    notes: Option<usize>,
}

impl ColumnIndexes {
    fn extract(&self, record: &StringRecord) -> ManualEventRow {
        let field = |idx: usize| record.get(idx).unwrap_or("").to_string();
        ManualEventRow {
            event_type: field(self.event_type),
            start: field(self.start),
            stop: field(self.stop),
            notes: self
                .notes
                .and_then(|idx| record.get(idx))
                .filter(|notes| !notes.is_empty())
                .map(str::to_string),
        }
    }
}

fn locate_columns(headers: &StringRecord) -> Result<ColumnIndexes, ParseError> {
    let find = |name: &'static str| {
        headers
            .iter()
            .position(|header| header.trim().eq_ignore_ascii_case(name))
    };

    Ok(ColumnIndexes {
        event_type: find(EVENT_TYPE_COLUMN).ok_or(ParseError::MissingColumn(EVENT_TYPE_COLUMN))?,
        start: find(START_COLUMN).ok_or(ParseError::MissingColumn(START_COLUMN))?,
        stop: find(STOP_COLUMN).ok_or(ParseError::MissingColumn(STOP_COLUMN))?,
        notes: find(NOTES_COLUMN),
    })
}

fn validate_row(row: usize, raw: &ManualEventRow) -> Result<ManualEvent, ParseError> {
    let start = parse_event_datetime(&raw.start).ok_or_else(|| ParseError::InvalidTimestamp {
        row,
        field: START_COLUMN,
        value: raw.start.clone(),
    })?;
    let stop = parse_event_datetime(&raw.stop).ok_or_else(|| ParseError::InvalidTimestamp {
        row,
        field: STOP_COLUMN,
        value: raw.stop.clone(),
    })?;

    if stop < start {
        return Err(ParseError::StopBeforeStart { row, start, stop });
    }

    Ok(ManualEvent {
        order: row,
        kind: EventKind::from_label(&raw.event_type),
        start,
        stop,
        notes: raw
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|notes| !notes.is_empty())
            .map(str::to_string),
    })
}
