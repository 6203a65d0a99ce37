// crates/lysiflux-core/src/pipeline.rs

use polars::prelude::DataFrame;
use tracing::{info, warn};

use crate::config::RunSettings;
use crate::crop_coefficient::{apply_reference_et, fit_kc_curve, KcCurve, ReferenceEtSeries};
use crate::error::{DataError, Result, RunWarning};
use crate::events::{
    detect_events, reconcile_events, ManualEvent, ManualEventTable, NonStandardEvent,
};
use crate::frame::channels_from_frame;
use crate::frequency::SamplingInterval;
use crate::resample::{resample, WaterBalanceRecord};
use crate::series::ChannelSeries;
use crate::summary::{ChannelSummary, RunSummary};
use crate::water_balance::{compute_water_balance, IntervalEta};

/// Everything computed for one load-cell channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelResult {
    pub channel: String,
    pub flagged_samples: usize,
    pub events: Vec<NonStandardEvent>,
    pub intervals: Vec<IntervalEta>,
    pub records: Vec<WaterBalanceRecord>,
    pub kc_curve: Option<KcCurve>,
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub channels: Vec<ChannelResult>,
    pub warnings: Vec<RunWarning>,
    pub summary: RunSummary,
}

impl RunOutput {
    pub fn channel(&self, name: &str) -> Option<&ChannelResult> {
        self.channels.iter().find(|channel| channel.channel == name)
    }
}

/// Optional inputs that sit beside the signal table.
#[derive(Debug, Clone, Copy, Default)]
pub struct Annotations<'a> {
    pub manual_events: Option<&'a ManualEventTable>,
    pub reference_et: Option<&'a ReferenceEtSeries>,
}

/// Runs the whole chain on a signal `DataFrame`.
pub fn run_frame(
    df: &DataFrame,
    settings: &RunSettings,
    annotations: Annotations<'_>,
) -> Result<RunOutput> {
    let channels =
        channels_from_frame(df, &settings.timestamp_column, settings.channels.as_deref())?;
    run_water_balance(&channels, settings, annotations)
}

/// Detection, reconciliation, water balance, resampling and Kc for every channel.
///
/// Frequency compatibility is checked before any channel is processed, so a
/// configuration error yields no partial output.
pub fn run_water_balance(
    channels: &[ChannelSeries],
    settings: &RunSettings,
    annotations: Annotations<'_>,
) -> Result<RunOutput> {
    if channels.is_empty() {
        return Err(DataError::NoChannels.into());
    }

    let interval = settings
        .sampling_interval
        .or_else(|| SamplingInterval::infer(&channels[0].timestamps));
    if let Some(frequency) = settings.frequency {
        match interval {
            Some(interval) => frequency.ensure_not_finer_than(interval)?,
            None => warn!(
                frequency = %frequency,
                "Input sampling interval unknown; frequency check skipped"
            ),
        }
    }

    let calibration = &settings.calibration;
    let mut warnings = Vec::new();

    let manual_events: &[ManualEvent] = match annotations.manual_events {
        Some(table) => {
            warnings.extend(
                table
                    .rejected
                    .iter()
                    .cloned()
                    .map(|error| RunWarning::ManualEventRejected { error }),
            );
            table.events.as_slice()
        }
        None => &[],
    };

    info!(
        channels = channels.len(),
        calibration = %calibration,
        manual_events = manual_events.len(),
        input_interval = ?interval.map(|i| i.to_string()),
        "Starting water balance run"
    );

    let mut results = Vec::with_capacity(channels.len());
    for series in channels {
        let detection = detect_events(series, calibration.threshold, interval);
        let events = reconcile_events(&detection.events, manual_events);
        let balance = compute_water_balance(series, &events, calibration);

        for warning in &balance.warnings {
            warn!(channel = %series.name, warning = %warning, "Data continuity warning");
        }
        warnings.extend(balance.warnings.iter().cloned().map(|warning| {
            RunWarning::DataContinuity {
                channel: series.name.clone(),
                warning,
            }
        }));

        let mut records = resample(&balance.intervals, settings.frequency);

        let mut kc_curve = None;
        if let Some(reference) = annotations.reference_et {
            let missing = apply_reference_et(&mut records, reference);
            if missing > 0 {
                let warning = RunWarning::MissingReferenceData {
                    channel: series.name.clone(),
                    periods: missing,
                };
                warn!(warning = %warning, "Reference ET incomplete");
                warnings.push(warning);
            }
            if let Some(season) = settings.season {
                kc_curve = fit_kc_curve(&records, season.planting, season.harvest);
            }
        }

        info!(
            channel = %series.name,
            samples = series.len(),
            flagged = detection.flagged_count(),
            events = events.len(),
            interpolated = balance.interpolated_count(),
            records = records.len(),
            total_eta_mm = balance.total_eta_mm(),
            "Channel processed"
        );

        results.push(ChannelResult {
            channel: series.name.clone(),
            flagged_samples: detection.flagged_count(),
            events,
            intervals: balance.intervals,
            records,
            kc_curve,
        });
    }

    let mut summary = RunSummary::new(calibration);
    summary.input_interval_minutes = interval.map(|i| i.duration().num_minutes());
    summary.output_frequency = settings.frequency.map(|f| f.to_string());
    summary.channels = results.iter().map(ChannelSummary::from_result).collect();
    summary.warning_count = warnings.len();

    info!(
        channels = results.len(),
        warnings = warnings.len(),
        "Water balance run complete"
    );

    Ok(RunOutput {
        channels: results,
        warnings,
        summary,
    })
}
