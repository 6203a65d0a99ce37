use chrono::{Duration, NaiveDate, NaiveDateTime};
use lysiflux_core::events::detect_events;
use lysiflux_core::water_balance::{compute_water_balance, trapezoid_estimate, EtaStatus};
use lysiflux_core::{
    CalibrationParameters, ChannelSeries, DataContinuityWarning, NonStandardEvent,
    SamplingInterval,
};
use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;

const MIN_PROPTEST_CASES: u32 = 256;
const THRESHOLD: f64 = 0.0034;

fn proptest_cases() -> u32 {
    std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .map(|parsed| parsed.max(MIN_PROPTEST_CASES))
        .unwrap_or(MIN_PROPTEST_CASES)
}

fn origin() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 6, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn calibration() -> CalibrationParameters {
    CalibrationParameters::new("LL", 684.694, 9.181, THRESHOLD).unwrap()
}

/// Regular 15-minute series from a start value and per-step changes.
fn walk(start: f64, steps: &[f64]) -> ChannelSeries {
    let mut values = Vec::with_capacity(steps.len() + 1);
    values.push(start);
    for step in steps {
        let last = values[values.len() - 1];
        values.push(last + step);
    }
    let timestamps = (0..values.len())
        .map(|i| origin() + Duration::minutes(15 * i as i64))
        .collect();
    ChannelSeries::new("LYS1", timestamps, values).unwrap()
}

fn quarter_hour() -> Option<SamplingInterval> {
    Some(SamplingInterval::new(Duration::minutes(15)).unwrap())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: proptest_cases(),
        max_shrink_iters: 1024,
        .. ProptestConfig::default()
    })]

    #[test]
    fn steps_below_threshold_never_form_events(
        start in 0.5f64..1.5,
        steps in prop::collection::vec(-0.9 * THRESHOLD..0.9 * THRESHOLD, 2..200),
    ) {
        let series = walk(start, &steps);
        let cal = calibration();
        let detection = detect_events(&series, cal.threshold, quarter_hour());
        prop_assert_eq!(detection.flagged_count(), 0);
        prop_assert!(detection.events.is_empty());

        let balance = compute_water_balance(&series, &detection.events, &cal);
        prop_assert_eq!(balance.interpolated_count(), 0);
        prop_assert!(balance
            .intervals
            .iter()
            .all(|interval| interval.status == EtaStatus::Measured));
    }

    #[test]
    fn single_jump_yields_one_span_around_it(
        start in 0.5f64..1.5,
        steps in prop::collection::vec(-0.4 * THRESHOLD..0.4 * THRESHOLD, 3..150),
        jump in 2.0 * THRESHOLD..40.0 * THRESHOLD,
        downward in any::<bool>(),
        position in any::<prop::sample::Index>(),
    ) {
        let mut steps = steps;
        let k = position.index(steps.len());
        steps[k] = if downward { -jump } else { jump };
        let series = walk(start, &steps);

        let detection = detect_events(&series, THRESHOLD, quarter_hour());
        prop_assert_eq!(detection.flagged_count(), 1);
        prop_assert_eq!(detection.events.len(), 1);
        // steps[k] is the change into sample k + 1.
        let ts = &series.timestamps;
        prop_assert_eq!(detection.events[0].start, ts[k]);
        prop_assert_eq!(detection.events[0].stop, ts[k + 1]);
    }

    #[test]
    fn interpolated_gap_sums_to_the_trapezoid(
        durations in prop::collection::vec(5i64..90, 6..60),
        losses in prop::collection::vec(0.0f64..0.002, 60),
        gap_seed in any::<(prop::sample::Index, prop::sample::Index)>(),
    ) {
        let mut timestamps = vec![origin()];
        for minutes in &durations {
            let last = timestamps[timestamps.len() - 1];
            timestamps.push(last + Duration::minutes(*minutes));
        }
        let n = timestamps.len();
        let mut values = vec![1.0];
        for loss in losses.iter().take(n - 1) {
            let last = values[values.len() - 1];
            values.push(last - loss);
        }
        let series = ChannelSeries::new("LYS1", timestamps.clone(), values).unwrap();

        // 1 <= g0 < g1 <= n - 2 leaves a measured interval on each side.
        let g0 = 1 + gap_seed.0.index(n - 3);
        let g1 = g0 + 1 + gap_seed.1.index(n - 2 - g0);
        let event = NonStandardEvent::automatic(timestamps[g0], timestamps[g1]);

        let balance = compute_water_balance(&series, &[event], &calibration());
        let intervals = &balance.intervals;
        prop_assert_eq!(intervals[g0 - 1].status, EtaStatus::Measured);
        prop_assert_eq!(intervals[g1].status, EtaStatus::Measured);
        prop_assert!(intervals[g0..g1]
            .iter()
            .all(|interval| interval.status == EtaStatus::Interpolated));

        let filled: f64 = intervals[g0..g1].iter().filter_map(|i| i.eta_mm).sum();
        let expected = trapezoid_estimate(
            &intervals[g0 - 1],
            &intervals[g1],
            timestamps[g0],
            timestamps[g1],
        )
        .unwrap();
        prop_assert!((filled - expected).abs() <= 1e-9 * expected.abs().max(1.0));
    }

    #[test]
    fn non_negative_eta_keeps_cumulative_monotone(
        start in 0.5f64..1.5,
        losses in prop::collection::vec(0.0f64..0.9 * THRESHOLD, 2..200),
    ) {
        let steps: Vec<f64> = losses.iter().map(|loss| -loss).collect();
        let series = walk(start, &steps);
        let cal = calibration();
        let events = detect_events(&series, cal.threshold, quarter_hour()).events;
        let balance = compute_water_balance(&series, &events, &cal);

        prop_assert!(balance
            .intervals
            .windows(2)
            .all(|pair| pair[1].cumulative_eta_mm >= pair[0].cumulative_eta_mm));
        let non_monotonic = balance
            .warnings
            .iter()
            .any(|w| matches!(w, DataContinuityWarning::NonMonotonicCumulative { .. }));
        prop_assert!(!non_monotonic, "cumulative ETa reported as decreasing");
    }
}
