use chrono::{Duration, NaiveDate, NaiveDateTime};
use lysiflux_core::pipeline::{run_water_balance, Annotations};
use lysiflux_core::water_balance::{compute_water_balance, EtaStatus, IntervalEta};
use lysiflux_core::{
    resample, CalibrationParameters, ChannelSeries, ConfigurationError, Frequency, LysiError,
    NonStandardEvent, RunSettings, SamplingInterval,
};

fn day(d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 6, d)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn quarter_hourly(samples: usize) -> ChannelSeries {
    let timestamps = (0..samples)
        .map(|i| day(1) + Duration::minutes(15 * i as i64))
        .collect();
    let values = (0..samples).map(|i| 1.0 - 0.0005 * i as f64).collect();
    ChannelSeries::new("LYS1", timestamps, values).unwrap()
}

fn calibration() -> CalibrationParameters {
    CalibrationParameters::new("custom", 76.2, 1.0, 0.0034).unwrap()
}

#[test]
fn daily_record_with_one_interpolated_sample() {
    let series = quarter_hourly(2 * 96);
    let event = NonStandardEvent::automatic(
        day(1) + Duration::hours(10),
        day(1) + Duration::hours(10) + Duration::minutes(15),
    );
    let balance = compute_water_balance(&series, &[event], &calibration());
    assert_eq!(balance.interpolated_count(), 1);

    let records = resample(&balance.intervals, Some(Frequency::parse("D").unwrap()));
    assert_eq!(records.len(), 2);

    let first = &records[0];
    assert_eq!(first.period_start, day(1));
    assert_eq!(first.period_end, day(2));
    assert!(first.interpolated);
    assert_eq!(first.interval_count, 96);
    assert_eq!(first.missing_count, 0);

    let expected: f64 = balance
        .intervals
        .iter()
        .filter(|interval| interval.start < day(2))
        .filter_map(|interval| interval.eta_mm)
        .sum();
    assert!((first.eta_mm.unwrap() - expected).abs() < 1e-9);

    let second = &records[1];
    assert!(!second.interpolated);
    assert_eq!(second.interval_count, 95);
    assert!((second.cumulative_eta_mm - balance.total_eta_mm()).abs() < 1e-9);
}

#[test]
fn no_frequency_keeps_every_interval() {
    let series = quarter_hourly(5);
    let balance = compute_water_balance(&series, &[], &calibration());
    let records = resample(&balance.intervals, None);

    assert_eq!(records.len(), 4);
    for (record, interval) in records.iter().zip(&balance.intervals) {
        assert_eq!(record.period_start, interval.start);
        assert_eq!(record.period_end, interval.end);
        assert_eq!(record.eta_mm, interval.eta_mm);
        assert_eq!(record.cumulative_eta_mm, interval.cumulative_eta_mm);
        assert_eq!(record.interval_count, 1);
    }
}

#[test]
fn all_missing_period_has_no_eta() {
    let interval = |start: NaiveDateTime, eta: Option<f64>, status| IntervalEta {
        start,
        end: start + Duration::days(1),
        eta_mm: eta,
        status,
        cumulative_eta_mm: 0.0,
    };
    let intervals = vec![
        interval(day(1), Some(3.0), EtaStatus::Measured),
        interval(day(2), None, EtaStatus::Unresolved),
        interval(day(3), Some(4.0), EtaStatus::Interpolated),
    ];

    let records = resample(&intervals, Some(Frequency::parse("D").unwrap()));
    assert_eq!(records[1].eta_mm, None);
    assert_eq!(records[1].missing_count, 1);
    assert_eq!(records[1].cumulative_eta_mm, 3.0);
    assert!(records[2].interpolated);
    assert_eq!(records[2].cumulative_eta_mm, 7.0);

    let weekly = resample(&intervals, Some(Frequency::parse("W").unwrap()));
    // 2023-06-01 is a Thursday; the week starts Monday 2023-05-29.
    assert_eq!(weekly.len(), 1);
    assert_eq!(weekly[0].period_start, day(1) - Duration::days(3));
    assert_eq!(weekly[0].eta_mm, Some(7.0));
    assert_eq!(weekly[0].missing_count, 1);
}

#[test]
fn monthly_periods_follow_the_calendar() {
    let start = NaiveDate::from_ymd_opt(2023, 5, 30)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let intervals: Vec<IntervalEta> = (0..4)
        .map(|i| IntervalEta {
            start: start + Duration::days(i),
            end: start + Duration::days(i + 1),
            eta_mm: Some(1.0),
            status: EtaStatus::Measured,
            cumulative_eta_mm: 0.0,
        })
        .collect();

    let records = resample(&intervals, Some(Frequency::parse("M").unwrap()));
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].period_end, day(1));
    assert_eq!(records[0].eta_mm, Some(2.0));
    assert_eq!(records[1].period_start, day(1));
    assert_eq!(records[1].cumulative_eta_mm, 4.0);
}

#[test]
fn finer_frequency_fails_before_any_channel() {
    let series = quarter_hourly(20);
    let settings = RunSettings::new(calibration()).with_frequency(Frequency::parse("5T").unwrap());

    let err = run_water_balance(&[series.clone()], &settings, Annotations::default()).unwrap_err();
    assert!(matches!(
        err,
        LysiError::Configuration(ConfigurationError::FrequencyFinerThanInput {
            input_minutes: 15,
            ..
        })
    ));

    let hourly = settings
        .clone()
        .with_frequency(Frequency::parse("H").unwrap())
        .with_sampling_interval(SamplingInterval::parse("Min15").unwrap());
    let output = run_water_balance(&[series], &hourly, Annotations::default()).unwrap();
    assert_eq!(output.channels[0].records.len(), 5);
}
