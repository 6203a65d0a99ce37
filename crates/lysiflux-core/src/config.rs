// crates/lysiflux-core/src/config.rs

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::calibration::{
    CalibrationParameters, CalibrationPreset, CalibrationPresets, CalibrationRequest,
};
use crate::error::ConfigurationError;
use crate::frequency::{Frequency, SamplingInterval};

pub const DEFAULT_TIMESTAMP_COLUMN: &str = "timestamp";

const SEASON_DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m-%d-%Y"];

// --- TOML layout ---
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub calibration: CalibrationSection,
    pub detection: DetectionSection,
    pub output: OutputSection,
    pub season: SeasonSection,
    /// Extra or replacement presets, keyed by lysimeter type code.
    pub presets: BTreeMap<String, CalibrationPreset>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CalibrationSection {
    pub lysimeter_type: Option<String>,
    pub alpha: Option<f64>,
    pub beta: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectionSection {
    pub threshold: Option<f64>,
    /// Channel columns to process; every numeric column when absent.
    pub channels: Option<Vec<String>>,
    /// Logger timescale such as `Min15` or `Daily`; inferred when absent.
    pub sampling_interval: Option<String>,
    pub timestamp_column: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputSection {
    pub frequency: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SeasonSection {
    pub planting_date: Option<String>,
    pub harvest_date: Option<String>,
}

/// Growing season used for the Kc curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Season {
    pub planting: NaiveDate,
    pub harvest: NaiveDate,
}

/// Validated run settings; everything a run needs besides the data.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub calibration: CalibrationParameters,
    pub frequency: Option<Frequency>,
    pub sampling_interval: Option<SamplingInterval>,
    pub channels: Option<Vec<String>>,
    pub timestamp_column: String,
    pub season: Option<Season>,
}

impl RunSettings {
    pub fn new(calibration: CalibrationParameters) -> Self {
        Self {
            calibration,
            frequency: None,
            sampling_interval: None,
            channels: None,
            timestamp_column: DEFAULT_TIMESTAMP_COLUMN.to_string(),
            season: None,
        }
    }

    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = Some(frequency);
        self
    }

    pub fn with_sampling_interval(mut self, interval: SamplingInterval) -> Self {
        self.sampling_interval = Some(interval);
        self
    }

    pub fn with_season(mut self, season: Season) -> Self {
        self.season = Some(season);
        self
    }
}

impl RunConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigurationError> {
        toml::from_str(content).map_err(|err| ConfigurationError::Toml(err.to_string()))
    }

    pub fn presets(&self) -> CalibrationPresets {
        CalibrationPresets::with_overrides(self.presets.clone())
    }

    pub fn calibration_request(&self) -> CalibrationRequest {
        CalibrationRequest {
            lysimeter_type: self.calibration.lysimeter_type.clone(),
            alpha: self.calibration.alpha,
            beta: self.calibration.beta,
            threshold: self.detection.threshold,
        }
    }

    /// Validates every section. Nothing here depends on the signal data.
    pub fn resolve(&self) -> Result<RunSettings, ConfigurationError> {
        let calibration =
            CalibrationParameters::resolve(&self.calibration_request(), &self.presets())?;

        let frequency = self
            .output
            .frequency
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(Frequency::parse)
            .transpose()?;

        let sampling_interval = self
            .detection
            .sampling_interval
            .as_deref()
            .map(SamplingInterval::parse)
            .transpose()?;

        if let (Some(frequency), Some(interval)) = (frequency, sampling_interval) {
            frequency.ensure_not_finer_than(interval)?;
        }

        let season = self.season.resolve()?;

        info!(
            calibration = %calibration,
            frequency = ?frequency.map(|f| f.to_string()),
            sampling_interval = ?sampling_interval.map(|i| i.to_string()),
            "Run configuration resolved"
        );

        Ok(RunSettings {
            calibration,
            frequency,
            sampling_interval,
            channels: self.detection.channels.clone(),
            timestamp_column: self
                .detection
                .timestamp_column
                .clone()
                .unwrap_or_else(|| DEFAULT_TIMESTAMP_COLUMN.to_string()),
            season,
        })
    }
}

impl SeasonSection {
    fn resolve(&self) -> Result<Option<Season>, ConfigurationError> {
        match (self.planting_date.as_deref(), self.harvest_date.as_deref()) {
            (None, None) => Ok(None),
            (Some(planting), Some(harvest)) => {
                let planting = parse_season_date(planting)?;
                let harvest = parse_season_date(harvest)?;
                if harvest < planting {
                    return Err(ConfigurationError::InvalidSeasonDate(format!(
                        "harvest {harvest} is before planting {planting}"
                    )));
                }
                Ok(Some(Season { planting, harvest }))
            }
            (Some(_), None) => Err(ConfigurationError::InvalidSeasonDate(
                "harvest_date missing".to_string(),
            )),
            (None, Some(_)) => Err(ConfigurationError::InvalidSeasonDate(
                "planting_date missing".to_string(),
            )),
        }
    }
}

pub fn parse_season_date(value: &str) -> Result<NaiveDate, ConfigurationError> {
    let trimmed = value.trim();
    SEASON_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
        .ok_or_else(|| ConfigurationError::InvalidSeasonDate(value.to_string()))
}
