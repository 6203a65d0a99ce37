use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigurationError;

const KG_TO_TONNES: f64 = 1.0 / 1000.0;
const M_TO_MM: f64 = 1000.0;

/// Threshold applied when no preset supplies one (large-lysimeter value).
pub const DEFAULT_THRESHOLD_MV_V: f64 = 0.0034;

pub const CUSTOM_LABEL: &str = "custom";

/// Load-cell and geometry constants for one lysimeter type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPreset {
    /// Load-cell slope, kg per mV/V.
    pub alpha: f64,
    /// Effective lysimeter surface area, m².
    pub beta: f64,
    /// NSE detection threshold, mV/V.
    pub threshold: f64,
}

/// Immutable map of lysimeter type code to preset.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationPresets {
    presets: BTreeMap<String, CalibrationPreset>,
}

impl CalibrationPresets {
    pub fn standard() -> Self {
        let mut presets = BTreeMap::new();
        presets.insert(
            "LL".to_string(),
            CalibrationPreset {
                alpha: 684.694,
                beta: 9.181,
                threshold: 0.0034,
            },
        );
        presets.insert(
            "SL".to_string(),
            CalibrationPreset {
                alpha: 368.538,
                beta: 2.341,
                threshold: 0.0016,
            },
        );
        Self { presets }
    }

    /// Standard presets plus (or replaced by) the supplied entries.
    pub fn with_overrides<I>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (String, CalibrationPreset)>,
    {
        let mut base = Self::standard();
        for (code, preset) in overrides {
            base.presets.insert(code.trim().to_ascii_uppercase(), preset);
        }
        base
    }

    pub fn get(&self, code: &str) -> Option<&CalibrationPreset> {
        self.presets.get(&code.trim().to_ascii_uppercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CalibrationPreset)> {
        self.presets.iter().map(|(code, preset)| (code.as_str(), preset))
    }
}

impl Default for CalibrationPresets {
    fn default() -> Self {
        Self::standard()
    }
}

/// What the caller asked for; resolved against a preset map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRequest {
    pub lysimeter_type: Option<String>,
    pub alpha: Option<f64>,
    pub beta: Option<f64>,
    pub threshold: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationParameters {
    pub lysimeter_type: String,
    pub alpha: f64,
    pub beta: f64,
    /// mm of water per mV/V.
    pub conversion_factor: f64,
    /// mV/V.
    pub threshold: f64,
}

impl CalibrationParameters {
    pub fn resolve(
        request: &CalibrationRequest,
        presets: &CalibrationPresets,
    ) -> Result<Self, ConfigurationError> {
        let preset_code = request
            .lysimeter_type
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty() && !code.eq_ignore_ascii_case(CUSTOM_LABEL));

        let preset = match preset_code {
            Some(code) => Some(
                presets
                    .get(code)
                    .ok_or_else(|| ConfigurationError::UnknownPreset(code.to_string()))?,
            ),
            None => None,
        };

        let (label, alpha, beta, preset_threshold) = match (preset, request.alpha, request.beta) {
            (_, Some(alpha), Some(beta)) => (
                CUSTOM_LABEL.to_string(),
                alpha,
                beta,
                preset.map(|p| p.threshold),
            ),
            (Some(preset), alpha, beta) => {
                let label = if alpha.is_some() || beta.is_some() {
                    CUSTOM_LABEL.to_string()
                } else {
                    preset_code.unwrap_or_default().to_ascii_uppercase()
                };
                (
                    label,
                    alpha.unwrap_or(preset.alpha),
                    beta.unwrap_or(preset.beta),
                    Some(preset.threshold),
                )
            }
            (None, alpha, beta) => {
                return Err(ConfigurationError::IncompleteCustomPair { alpha, beta });
            }
        };

        let threshold = request
            .threshold
            .or(preset_threshold)
            .unwrap_or(DEFAULT_THRESHOLD_MV_V);

        Self::new(label, alpha, beta, threshold)
    }

    pub fn new(
        lysimeter_type: impl Into<String>,
        alpha: f64,
        beta: f64,
        threshold: f64,
    ) -> Result<Self, ConfigurationError> {
        if !alpha.is_finite() || alpha <= 0.0 {
            return Err(ConfigurationError::InvalidAlpha(alpha));
        }
        if !beta.is_finite() || beta <= 0.0 {
            return Err(ConfigurationError::NonPositiveBeta(beta));
        }
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(ConfigurationError::InvalidThreshold(threshold));
        }

        let conversion_factor = conversion_factor(alpha, beta);
        let lysimeter_type = lysimeter_type.into();
        debug!(
            lysimeter_type = %lysimeter_type,
            alpha,
            beta,
            conversion_factor,
            threshold,
            "Resolved calibration"
        );

        Ok(Self {
            lysimeter_type,
            alpha,
            beta,
            conversion_factor,
            threshold,
        })
    }

    /// Depth of water (mm) equivalent to a signal change in mV/V.
    pub fn to_depth_mm(&self, delta_mv_v: f64) -> f64 {
        delta_mv_v * self.conversion_factor
    }
}

impl fmt::Display for CalibrationParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (alpha {} kg/mV/V, beta {} m², CF {:.4} mm/mV/V, threshold {} mV/V)",
            self.lysimeter_type, self.alpha, self.beta, self.conversion_factor, self.threshold
        )
    }
}

/// kg/(mV/V) over m², assuming water at 1000 kg/m³.
fn conversion_factor(alpha: f64, beta: f64) -> f64 {
    alpha * KG_TO_TONNES * (1.0 / beta) * M_TO_MM
}
