use serde::Serialize;

use crate::calibration::CalibrationParameters;
use crate::crop_coefficient::KcCurve;
use crate::events::EventSource;
use crate::pipeline::ChannelResult;
use crate::water_balance::EtaStatus;

/// Per-channel counts reported next to the outputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelSummary {
    pub channel: String,
    pub nse_count: usize,
    pub automatic_events: usize,
    pub manual_events: usize,
    pub confirmed_events: usize,
    pub flagged_samples: usize,
    pub interpolated_intervals: usize,
    pub unresolved_intervals: usize,
    pub total_eta_mm: f64,
    pub kc_curve: Option<KcCurve>,
}

impl ChannelSummary {
    pub fn from_result(result: &ChannelResult) -> Self {
        let count_source = |source: EventSource| {
            result
                .events
                .iter()
                .filter(|event| event.source == source)
                .count()
        };
        let count_status = |wanted: fn(EtaStatus) -> bool| {
            result
                .intervals
                .iter()
                .filter(|interval| wanted(interval.status))
                .count()
        };

        Self {
            channel: result.channel.clone(),
            nse_count: result.events.len(),
            automatic_events: count_source(EventSource::Automatic),
            manual_events: count_source(EventSource::Manual),
            confirmed_events: count_source(EventSource::ManualConfirmed),
            flagged_samples: result.flagged_samples,
            interpolated_intervals: count_status(|status| status == EtaStatus::Interpolated),
            unresolved_intervals: count_status(|status| {
                matches!(status, EtaStatus::Unresolved | EtaStatus::MissingReading)
            }),
            total_eta_mm: result
                .intervals
                .last()
                .map(|interval| interval.cumulative_eta_mm)
                .unwrap_or(0.0),
            kc_curve: result.kc_curve,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub lysimeter_type: String,
    pub alpha: f64,
    pub beta: f64,
    pub conversion_factor: f64,
    pub threshold: f64,
    pub input_interval_minutes: Option<i64>,
    pub output_frequency: Option<String>,
    pub channels: Vec<ChannelSummary>,
    pub warning_count: usize,
}

impl RunSummary {
    pub fn new(calibration: &CalibrationParameters) -> Self {
        Self {
            lysimeter_type: calibration.lysimeter_type.clone(),
            alpha: calibration.alpha,
            beta: calibration.beta,
            conversion_factor: calibration.conversion_factor,
            threshold: calibration.threshold,
            input_interval_minutes: None,
            output_frequency: None,
            channels: Vec::new(),
            warning_count: 0,
        }
    }

    pub fn nse_count(&self, channel: &str) -> Option<usize> {
        self.channels
            .iter()
            .find(|summary| summary.channel == channel)
            .map(|summary| summary.nse_count)
    }
}
