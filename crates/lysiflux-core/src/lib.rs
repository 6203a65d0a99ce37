pub mod calibration;
pub mod config;
pub mod crop_coefficient;
pub mod error;
pub mod events;
pub mod frame;
pub mod frequency;
pub mod pipeline;
pub mod resample;
pub mod series;
pub mod summary;
pub mod water_balance;

pub use calibration::{
    CalibrationParameters, CalibrationPreset, CalibrationPresets, CalibrationRequest,
};
pub use config::{RunConfig, RunSettings, Season};
pub use crop_coefficient::{apply_reference_et, fit_kc_curve, KcCurve, ReferenceEtSeries};
pub use error::{
    ConfigurationError, DataContinuityWarning, DataError, LysiError, ParseError, Result, RunWarning,
};
pub use events::{
    detect_events, parse_manual_events, reconcile_events, EventKind, EventSource, ManualEventTable,
    NonStandardEvent,
};
pub use frequency::{Frequency, FrequencyUnit, SamplingInterval};
pub use pipeline::{run_frame, run_water_balance, Annotations, ChannelResult, RunOutput};
pub use resample::{resample, WaterBalanceRecord};
pub use series::ChannelSeries;
pub use summary::{ChannelSummary, RunSummary};
pub use water_balance::{compute_water_balance, EtaStatus, IntervalEta, WaterBalance};
