use chrono::{Duration, NaiveDate, NaiveDateTime};
use lysiflux_core::crop_coefficient::{apply_reference_et, fit_kc_curve, ReferenceEtSeries};
use lysiflux_core::WaterBalanceRecord;
use polars::prelude::*;

fn day(offset: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 5, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::days(offset)
}

fn daily_record(offset: i64, eta: Option<f64>) -> WaterBalanceRecord {
    WaterBalanceRecord {
        period_start: day(offset),
        period_end: day(offset + 1),
        eta_mm: eta,
        interpolated: false,
        cumulative_eta_mm: 0.0,
        etr_mm: None,
        kc: None,
        interval_count: 96,
        missing_count: 0,
    }
}

#[test]
fn reference_sums_are_half_open() {
    let reference = ReferenceEtSeries::new(
        vec![day(0), day(0) + Duration::hours(12), day(1)],
        vec![2.0, 1.5, 4.0],
    )
    .unwrap();

    assert_eq!(reference.sum_between(day(0), day(1)), Some(3.5));
    assert_eq!(reference.sum_between(day(1), day(2)), Some(4.0));
    assert_eq!(reference.sum_between(day(2), day(3)), None);
}

#[test]
fn kc_is_missing_without_usable_reference() {
    let reference = ReferenceEtSeries::new(vec![day(0), day(1)], vec![5.0, 0.0]).unwrap();
    let mut records = vec![
        daily_record(0, Some(4.0)),
        daily_record(1, Some(3.0)),
        daily_record(2, Some(3.0)),
        daily_record(3, None),
    ];

    let missing = apply_reference_et(&mut records, &reference);

    assert_eq!(missing, 2);
    assert_eq!(records[0].etr_mm, Some(5.0));
    assert!((records[0].kc.unwrap() - 0.8).abs() < 1e-12);
    assert_eq!(records[1].etr_mm, Some(0.0));
    assert_eq!(records[1].kc, None);
    assert_eq!(records[2].etr_mm, None);
    assert_eq!(records[2].kc, None);
    assert_eq!(records[3].kc, None);
}

#[test]
fn reference_loads_from_a_frame() -> PolarsResult<()> {
    let micros: Vec<i64> = (0..3)
        .map(|offset| day(offset).and_utc().timestamp_micros())
        .collect();
    let timestamp = Series::new("timestamp".into(), micros)
        .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?;
    let etr = Series::new("etr".into(), vec![Some(4.0f64), None, Some(6.0)]);
    let df = DataFrame::new(vec![timestamp.into(), etr.into()])?;

    let reference = ReferenceEtSeries::from_frame(&df, "timestamp", "etr").unwrap();
    assert_eq!(reference.len(), 3);
    assert_eq!(reference.sum_between(day(0), day(2)), Some(4.0));
    assert_eq!(reference.sum_between(day(1), day(2)), None);
    Ok(())
}

#[test]
fn seasonal_curve_recovers_a_quadratic() {
    let planting = day(0).date();
    let harvest = day(120).date();
    let mut records: Vec<WaterBalanceRecord> = (-10..140)
        .map(|offset| {
            let mut record = daily_record(offset, Some(1.0));
            let d = offset as f64;
            record.kc = Some(0.3 + 0.02 * d - 0.0001 * d * d);
            record
        })
        .collect();
    // Outside the season; must not pull the fit.
    records[0].kc = Some(50.0);

    let curve = fit_kc_curve(&records, planting, harvest).unwrap();
    assert_eq!(curve.n_points, 121);
    assert!((curve.c0 - 0.3).abs() < 1e-6);
    assert!((curve.c1 - 0.02).abs() < 1e-7);
    assert!((curve.c2 + 0.0001).abs() < 1e-9);
    assert!((curve.evaluate(60.0) - (0.3 + 1.2 - 0.36)).abs() < 1e-6);
}

#[test]
fn seasonal_curve_needs_three_points() {
    let mut records: Vec<WaterBalanceRecord> =
        (0..5).map(|offset| daily_record(offset, None)).collect();
    records[1].kc = Some(0.5);
    records[3].kc = Some(0.7);

    assert!(fit_kc_curve(&records, day(0).date(), day(10).date()).is_none());

    records[4].kc = Some(f64::NAN);
    assert!(fit_kc_curve(&records, day(0).date(), day(10).date()).is_none());
}
