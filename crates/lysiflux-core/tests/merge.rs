use chrono::{NaiveDate, NaiveDateTime};
use lysiflux_core::events::{reconcile_events, ManualEvent};
use lysiflux_core::{EventKind, EventSource, NonStandardEvent};

fn at(hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 6, 1)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

fn manual(order: usize, kind: EventKind, start: NaiveDateTime, stop: NaiveDateTime) -> ManualEvent {
    ManualEvent {
        order,
        kind,
        start,
        stop,
        notes: Some(format!("entry {order}")),
    }
}

fn spans(events: &[NonStandardEvent]) -> Vec<(NaiveDateTime, NaiveDateTime)> {
    events.iter().map(|event| (event.start, event.stop)).collect()
}

#[test]
fn identical_manual_events_keep_the_later_one() {
    let merged = reconcile_events(
        &[],
        &[
            manual(1, EventKind::Rain, at(8, 0), at(9, 0)),
            manual(2, EventKind::Irrigation, at(8, 0), at(9, 0)),
        ],
    );

    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].kind, EventKind::Irrigation);
    assert_eq!(merged[0].notes.as_deref(), Some("entry 2"));
    assert_eq!(merged[0].source, EventSource::Manual);
}

#[test]
fn manual_event_confirms_and_widens_an_automatic_span() {
    let automatic = [NonStandardEvent::automatic(at(8, 15), at(8, 45))];
    let merged = reconcile_events(
        &automatic,
        &[manual(1, EventKind::Irrigation, at(8, 0), at(8, 30))],
    );

    assert_eq!(merged.len(), 1);
    assert_eq!(spans(&merged), vec![(at(8, 0), at(8, 45))]);
    assert_eq!(merged[0].kind, EventKind::Irrigation);
    assert_eq!(merged[0].source, EventSource::ManualConfirmed);
    assert_eq!(merged[0].notes.as_deref(), Some("entry 1"));
}

#[test]
fn latest_manual_event_labels_a_shared_span() {
    let automatic = [NonStandardEvent::automatic(at(8, 0), at(10, 0))];
    let merged = reconcile_events(
        &automatic,
        &[
            manual(1, EventKind::Rain, at(8, 0), at(8, 30)),
            manual(2, EventKind::Drain, at(9, 30), at(10, 30)),
        ],
    );

    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].kind, EventKind::Drain);
    assert_eq!(spans(&merged), vec![(at(8, 0), at(10, 30))]);
}

#[test]
fn unmatched_spans_pass_through() {
    let automatic = [NonStandardEvent::automatic(at(6, 0), at(6, 15))];
    let merged = reconcile_events(
        &automatic,
        &[manual(1, EventKind::Fertilizer, at(12, 0), at(12, 30))],
    );

    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].source, EventSource::Automatic);
    assert_eq!(merged[0].kind, EventKind::Unknown);
    assert_eq!(merged[1].source, EventSource::Manual);
    assert_eq!(merged[1].kind, EventKind::Fertilizer);
}

#[test]
fn later_manual_event_trims_an_earlier_one() {
    let merged = reconcile_events(
        &[],
        &[
            manual(1, EventKind::Rain, at(10, 0), at(12, 0)),
            manual(2, EventKind::Irrigation, at(11, 0), at(13, 0)),
        ],
    );

    assert_eq!(
        spans(&merged),
        vec![(at(10, 0), at(11, 0)), (at(11, 0), at(13, 0))]
    );
    assert_eq!(merged[0].kind, EventKind::Rain);
    assert_eq!(merged[1].kind, EventKind::Irrigation);
}

#[test]
fn later_manual_event_splits_an_earlier_one() {
    let merged = reconcile_events(
        &[],
        &[
            manual(1, EventKind::Rain, at(10, 0), at(14, 0)),
            manual(2, EventKind::Drain, at(11, 0), at(12, 0)),
        ],
    );

    assert_eq!(
        spans(&merged),
        vec![
            (at(10, 0), at(11, 0)),
            (at(11, 0), at(12, 0)),
            (at(12, 0), at(14, 0)),
        ]
    );
    let kinds: Vec<&EventKind> = merged.iter().map(|event| &event.kind).collect();
    assert_eq!(kinds, vec![&EventKind::Rain, &EventKind::Drain, &EventKind::Rain]);
}

#[test]
fn covered_manual_event_is_dropped() {
    let merged = reconcile_events(
        &[],
        &[
            manual(1, EventKind::Rain, at(11, 0), at(12, 0)),
            manual(2, EventKind::Drain, at(10, 0), at(13, 0)),
        ],
    );
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].kind, EventKind::Drain);
}

#[test]
fn widened_span_absorbs_neighbouring_automatic_span() {
    let automatic = [
        NonStandardEvent::automatic(at(8, 0), at(8, 15)),
        NonStandardEvent::automatic(at(9, 0), at(9, 15)),
    ];
    let merged = reconcile_events(
        &automatic,
        &[manual(1, EventKind::Irrigation, at(8, 10), at(9, 5))],
    );

    assert_eq!(merged.len(), 1);
    assert_eq!(spans(&merged), vec![(at(8, 0), at(9, 15))]);
    assert_eq!(merged[0].source, EventSource::ManualConfirmed);
    assert_eq!(merged[0].kind, EventKind::Irrigation);
}

#[test]
fn adjacent_manual_events_keep_their_own_labels() {
    let automatic = [NonStandardEvent::automatic(at(10, 30), at(11, 0))];
    let merged = reconcile_events(
        &automatic,
        &[
            manual(1, EventKind::Rain, at(10, 0), at(11, 0)),
            manual(2, EventKind::Irrigation, at(11, 0), at(12, 0)),
        ],
    );

    assert_eq!(
        spans(&merged),
        vec![(at(10, 0), at(11, 0)), (at(11, 0), at(12, 0))]
    );
    assert_eq!(merged[0].kind, EventKind::Rain);
    assert_eq!(merged[0].source, EventSource::ManualConfirmed);
    assert_eq!(merged[1].kind, EventKind::Irrigation);
    assert_eq!(merged[1].source, EventSource::Manual);
}

#[test]
fn instantaneous_manual_event_confirms_the_span_it_falls_in() {
    let automatic = [
        NonStandardEvent::automatic(at(9, 45), at(10, 0)),
        NonStandardEvent::automatic(at(10, 0), at(10, 15)),
    ];
    let merged = reconcile_events(
        &automatic,
        &[manual(1, EventKind::Drain, at(10, 0), at(10, 0))],
    );

    assert_eq!(
        spans(&merged),
        vec![(at(9, 45), at(10, 0)), (at(10, 0), at(10, 15))]
    );
    assert_eq!(merged[0].kind, EventKind::Drain);
    assert_eq!(merged[0].source, EventSource::ManualConfirmed);
    assert_eq!(merged[1].kind, EventKind::Unknown);
    assert_eq!(merged[1].source, EventSource::Automatic);
}
