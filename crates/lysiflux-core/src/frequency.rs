//! Output frequency codes and input sampling intervals.
//!
//! Frequency codes follow the `[n]X` shape used by the lysimeter tooling
//! (`15T`, `H`, `D`, `2W`, `M`, `Q`, `A`). Fixed-length periods are aligned to
//! midnight of the series' first day, weeks start on Monday, and calendar
//! periods are aligned to month/quarter/year starts.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

const MAX_MULTIPLIER: u32 = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrequencyUnit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl FrequencyUnit {
    pub fn code(&self) -> &'static str {
        match self {
            FrequencyUnit::Minute => "T",
            FrequencyUnit::Hour => "H",
            FrequencyUnit::Day => "D",
            FrequencyUnit::Week => "W",
            FrequencyUnit::Month => "M",
            FrequencyUnit::Quarter => "Q",
            FrequencyUnit::Year => "A",
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_lowercase().as_str() {
            "t" | "min" => Some(FrequencyUnit::Minute),
            "h" => Some(FrequencyUnit::Hour),
            "d" => Some(FrequencyUnit::Day),
            "w" => Some(FrequencyUnit::Week),
            "m" | "ms" => Some(FrequencyUnit::Month),
            "q" | "qs" => Some(FrequencyUnit::Quarter),
            "a" | "y" | "as" | "ys" => Some(FrequencyUnit::Year),
            _ => None,
        }
    }

    /// Shortest possible length of one unit.
    fn shortest(&self) -> Duration {
        match self {
            FrequencyUnit::Minute => Duration::minutes(1),
            FrequencyUnit::Hour => Duration::hours(1),
            FrequencyUnit::Day => Duration::days(1),
            FrequencyUnit::Week => Duration::weeks(1),
            FrequencyUnit::Month => Duration::days(28),
            FrequencyUnit::Quarter => Duration::days(90),
            FrequencyUnit::Year => Duration::days(365),
        }
    }

    fn months(&self) -> Option<i64> {
        match self {
            FrequencyUnit::Month => Some(1),
            FrequencyUnit::Quarter => Some(3),
            FrequencyUnit::Year => Some(12),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Frequency {
    pub multiplier: u32,
    pub unit: FrequencyUnit,
}

impl Frequency {
    pub fn new(multiplier: u32, unit: FrequencyUnit) -> Self {
        Self {
            multiplier: multiplier.max(1),
            unit,
        }
    }

    pub fn parse(code: &str) -> Result<Self, ConfigurationError> {
        let trimmed = code.trim();
        let invalid = |reason: &str| ConfigurationError::InvalidFrequency {
            code: code.to_string(),
            reason: reason.to_string(),
        };

        if trimmed.is_empty() {
            return Err(invalid("empty code"));
        }

        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| invalid("missing unit (expected one of T, H, D, W, M, Q, A)"))?;
        let (digits, unit_code) = trimmed.split_at(split);

        let multiplier = if digits.is_empty() {
            1
        } else {
            digits
                .parse::<u32>()
                .map_err(|err| invalid(&format!("bad multiplier: {err}")))?
        };
        if multiplier == 0 {
            return Err(invalid("multiplier must be at least 1"));
        }
        if multiplier > MAX_MULTIPLIER {
            return Err(invalid(&format!("multiplier must be at most {MAX_MULTIPLIER}")));
        }

        let unit = FrequencyUnit::from_code(unit_code)
            .ok_or_else(|| invalid(&format!("unknown unit '{unit_code}'")))?;

        Ok(Self { multiplier, unit })
    }

    /// Shortest possible length of one period.
    pub fn nominal_duration(&self) -> Duration {
        self.unit.shortest() * self.multiplier as i32
    }

    /// Rejects output periods that would be finer than what the logger recorded.
    pub fn ensure_not_finer_than(&self, input: SamplingInterval) -> Result<(), ConfigurationError> {
        if self.nominal_duration() < input.duration() {
            return Err(ConfigurationError::FrequencyFinerThanInput {
                frequency: self.to_string(),
                input_minutes: input.duration().num_minutes(),
            });
        }
        Ok(())
    }

    /// Start of the period containing `t`, for a series whose first sample is `origin`.
    pub fn period_start(&self, origin: NaiveDateTime, t: NaiveDateTime) -> NaiveDateTime {
        let step = i64::from(self.multiplier);
        match self.unit.months() {
            Some(unit_months) => {
                let step_months = step * unit_months;
                let base = month_index(origin.date()).div_euclid(unit_months) * unit_months;
                let offset = (month_index(t.date()) - base).div_euclid(step_months);
                from_month_index(base + offset * step_months)
            }
            None => {
                let anchor = self.fixed_anchor(origin);
                let step_secs = self.unit.shortest().num_seconds() * step;
                let offset = (t - anchor).num_seconds().div_euclid(step_secs);
                anchor + Duration::seconds(offset * step_secs)
            }
        }
    }

    /// Start of the period following the one starting at `start`.
    pub fn next_period_start(&self, start: NaiveDateTime) -> NaiveDateTime {
        let step = i64::from(self.multiplier);
        match self.unit.months() {
            Some(unit_months) => from_month_index(month_index(start.date()) + step * unit_months),
            None => start + self.unit.shortest() * self.multiplier as i32,
        }
    }

    fn fixed_anchor(&self, origin: NaiveDateTime) -> NaiveDateTime {
        let midnight = origin.date().and_time(NaiveTime::MIN);
        match self.unit {
            FrequencyUnit::Week => {
                let back = i64::from(origin.date().weekday().num_days_from_monday());
                midnight - Duration::days(back)
            }
            _ => midnight,
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.multiplier == 1 {
            f.write_str(self.unit.code())
        } else {
            write!(f, "{}{}", self.multiplier, self.unit.code())
        }
    }
}

impl FromStr for Frequency {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Frequency::parse(s)
    }
}

fn month_index(date: NaiveDate) -> i64 {
    i64::from(date.year()) * 12 + i64::from(date.month0())
}

fn from_month_index(index: i64) -> NaiveDateTime {
    let year = index.div_euclid(12) as i32;
    let month = index.rem_euclid(12) as u32 + 1;
    NaiveDate::from_ymd_opt(year, month, 1)
        .unwrap_or(NaiveDate::MIN)
        .and_time(NaiveTime::MIN)
}

/// Spacing between consecutive logger samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SamplingInterval(Duration);

impl SamplingInterval {
    pub fn new(duration: Duration) -> Result<Self, ConfigurationError> {
        if duration <= Duration::zero() {
            return Err(ConfigurationError::InvalidSamplingInterval(format!(
                "{} seconds",
                duration.num_seconds()
            )));
        }
        Ok(Self(duration))
    }

    /// Logger table timescale names: `Min5`, `Min15`, `Min60`, `Hourly`, `Daily`.
    pub fn parse(code: &str) -> Result<Self, ConfigurationError> {
        let invalid = || ConfigurationError::InvalidSamplingInterval(code.to_string());
        let lower = code.trim().to_ascii_lowercase();
        let duration = match lower.as_str() {
            "daily" | "day" => Duration::days(1),
            "hourly" | "hour" => Duration::hours(1),
            other => other
                .strip_prefix("min")
                .and_then(|rest| rest.parse::<i64>().ok())
                .and_then(Duration::try_minutes)
                .ok_or_else(invalid)?,
        };
        Self::new(duration).map_err(|_| invalid())
    }

    /// Most common positive spacing; ties go to the shorter spacing.
    pub fn infer(timestamps: &[NaiveDateTime]) -> Option<Self> {
        let mut counts: HashMap<i64, usize> = HashMap::new();
        for window in timestamps.windows(2) {
            let step = (window[1] - window[0]).num_seconds();
            if step > 0 {
                *counts.entry(step).or_insert(0) += 1;
            }
        }

        counts
            .into_iter()
            .max_by(|(step_a, count_a), (step_b, count_b)| {
                count_a.cmp(count_b).then_with(|| step_b.cmp(step_a))
            })
            .map(|(step, _)| Self(Duration::seconds(step)))
    }

    pub fn duration(&self) -> Duration {
        self.0
    }
}

impl fmt::Display for SamplingInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} min", self.0.num_minutes())
    }
}
