use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::*;
use serde::Serialize;

use crate::error::{DataError, LysiError};
use crate::frame::column_timestamps;
use crate::resample::WaterBalanceRecord;
use crate::series::validate_timestamps;

/// Reference evapotranspiration (ETr, mm) indexed by timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceEtSeries {
    timestamps: Vec<NaiveDateTime>,
    values: Vec<f64>,
}

impl ReferenceEtSeries {
    pub fn new(timestamps: Vec<NaiveDateTime>, values: Vec<f64>) -> Result<Self, DataError> {
        if timestamps.len() != values.len() {
            return Err(DataError::LengthMismatch {
                channel: "ETr".to_string(),
                timestamps: timestamps.len(),
                values: values.len(),
            });
        }
        validate_timestamps(&timestamps)?;
        Ok(Self { timestamps, values })
    }

    /// Reads `timestamp_column` (datetime) and `value_column` (numeric) from `df`.
    pub fn from_frame(
        df: &DataFrame,
        timestamp_column: &str,
        value_column: &str,
    ) -> Result<Self, LysiError> {
        let timestamps = column_timestamps(df, timestamp_column)?;
        let column = df
            .column(value_column)
            .map_err(|_| DataError::MissingColumn(value_column.to_string()))?
            .cast(&DataType::Float64)?;
        let values: Vec<f64> = column
            .f64()?
            .into_iter()
            .map(|value| value.unwrap_or(f64::NAN))
            .collect();
        Ok(Self::new(timestamps, values)?)
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Sum of finite ETr values stamped within `[from, to)`; `None` if there are none.
    pub fn sum_between(&self, from: NaiveDateTime, to: NaiveDateTime) -> Option<f64> {
        let lo = self.timestamps.partition_point(|ts| *ts < from);
        let hi = self.timestamps.partition_point(|ts| *ts < to);
        self.values[lo..hi]
            .iter()
            .filter(|value| value.is_finite())
            .fold(None, |acc, value| Some(acc.unwrap_or(0.0) + value))
    }
}

/// Attaches ETr and `Kc = ETa / ETr` to each record.
///
/// Returns the number of periods that had no reference data. Zero ETr or missing
/// ETa leaves Kc missing.
pub fn apply_reference_et(
    records: &mut [WaterBalanceRecord],
    reference: &ReferenceEtSeries,
) -> usize {
    let mut missing = 0;
    for record in records.iter_mut() {
        record.etr_mm = reference.sum_between(record.period_start, record.period_end);
        if record.etr_mm.is_none() {
            missing += 1;
        }
        record.kc = crop_coefficient(record.eta_mm, record.etr_mm);
    }
    missing
}

pub fn crop_coefficient(eta_mm: Option<f64>, etr_mm: Option<f64>) -> Option<f64> {
    match (eta_mm, etr_mm) {
        (Some(eta), Some(etr)) if etr != 0.0 && eta.is_finite() && etr.is_finite() => {
            Some(eta / etr)
        }
        _ => None,
    }
}

/// Seasonal crop coefficient `Kc(d) = c0 + c1 d + c2 d²`, `d` in days since planting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KcCurve {
    pub c0: f64,
    pub c1: f64,
    pub c2: f64,
    pub n_points: usize,
}

impl KcCurve {
    pub fn evaluate(&self, days_since_planting: f64) -> f64 {
        self.c0 + self.c1 * days_since_planting + self.c2 * days_since_planting.powi(2)
    }
}

/// Least-squares quadratic fit of Kc against days since planting over records
/// starting within `[planting, harvest]`.
pub fn fit_kc_curve(
    records: &[WaterBalanceRecord],
    planting: NaiveDate,
    harvest: NaiveDate,
) -> Option<KcCurve> {
    let planted = planting.and_time(NaiveTime::MIN);
    let points: Vec<(f64, f64)> = records
        .iter()
        .filter(|record| {
            let date = record.period_start.date();
            date >= planting && date <= harvest
        })
        .filter_map(|record| {
            let kc = record.kc.filter(|kc| kc.is_finite())?;
            let days = (record.period_start - planted).num_seconds() as f64 / 86_400.0;
            Some((days, kc))
        })
        .collect();

    if points.len() < 3 {
        return None;
    }

    // Normal equations in days scaled to [-1, 1], mapped back afterwards.
    let scale = points
        .iter()
        .fold(0.0_f64, |acc, (x, _)| acc.max(x.abs()))
        .max(1.0);
    let mut sums = [0.0_f64; 5];
    let mut rhs = [0.0_f64; 3];
    for &(x, y) in &points {
        let x = x / scale;
        let mut power = 1.0;
        for (k, sum) in sums.iter_mut().enumerate() {
            *sum += power;
            if k < 3 {
                rhs[k] += power * y;
            }
            power *= x;
        }
    }
    let matrix = [
        [sums[0], sums[1], sums[2]],
        [sums[1], sums[2], sums[3]],
        [sums[2], sums[3], sums[4]],
    ];
    let [b0, b1, b2] = solve3(matrix, rhs)?;

    Some(KcCurve {
        c0: b0,
        c1: b1 / scale,
        c2: b2 / (scale * scale),
        n_points: points.len(),
    })
}

/// Gaussian elimination with partial pivoting.
fn solve3(mut a: [[f64; 3]; 3], mut b: [f64; 3]) -> Option<[f64; 3]> {
    let scale = a
        .iter()
        .flatten()
        .fold(0.0_f64, |acc, value| acc.max(value.abs()));
    if scale == 0.0 || !scale.is_finite() {
        return None;
    }
    let tolerance = scale * 1e-12;

    for col in 0..3 {
        let pivot = (col..3).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() <= tolerance {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in (col + 1)..3 {
            let factor = a[row][col] / a[col][col];
            for k in col..3 {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = [0.0_f64; 3];
    for row in (0..3).rev() {
        let tail: f64 = ((row + 1)..3).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    x.iter().all(|value| value.is_finite()).then_some(x)
}
