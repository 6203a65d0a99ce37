use chrono::NaiveDateTime;

use crate::error::DataError;

/// One load-cell channel: strictly increasing timestamps and mV/V readings.
///
/// Missing readings are stored as `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSeries {
    pub name: String,
    pub timestamps: Vec<NaiveDateTime>,
    pub values: Vec<f64>,
}

impl ChannelSeries {
    pub fn new(
        name: impl Into<String>,
        timestamps: Vec<NaiveDateTime>,
        values: Vec<f64>,
    ) -> Result<Self, DataError> {
        let name = name.into();
        if timestamps.len() != values.len() {
            return Err(DataError::LengthMismatch {
                channel: name,
                timestamps: timestamps.len(),
                values: values.len(),
            });
        }
        validate_timestamps(&timestamps)?;
        Ok(Self {
            name,
            timestamps,
            values,
        })
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| !v.is_finite()).count()
    }
}

pub fn validate_timestamps(timestamps: &[NaiveDateTime]) -> Result<(), DataError> {
    for (idx, window) in timestamps.windows(2).enumerate() {
        let row = idx + 1;
        if window[1] == window[0] {
            return Err(DataError::DuplicateTimestamp {
                row,
                timestamp: window[1],
            });
        }
        if window[1] < window[0] {
            return Err(DataError::DecreasingTimestamp {
                row,
                timestamp: window[1],
            });
        }
    }
    Ok(())
}
