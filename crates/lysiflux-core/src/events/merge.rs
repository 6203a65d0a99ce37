use std::cmp::Ordering;

use chrono::NaiveDateTime;
use tracing::debug;

use crate::events::{spans_overlap, EventKind, EventSource, ManualEvent, NonStandardEvent};

/// A manual annotation after overlaps with later annotations were cut away.
#[derive(Debug, Clone)]
struct ManualPiece {
    order: usize,
    kind: EventKind,
    start: NaiveDateTime,
    stop: NaiveDateTime,
    notes: Option<String>,
}

impl ManualPiece {
    fn overlaps(&self, start: NaiveDateTime, stop: NaiveDateTime) -> bool {
        spans_overlap(self.start, self.stop, start, stop)
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    event: NonStandardEvent,
    /// Listing order of the manual annotation the span carries, if any.
    order: Option<usize>,
}

impl Candidate {
    fn precedence(&self) -> (u8, usize) {
        let rank = match self.event.source {
            EventSource::Automatic => 0,
            EventSource::Manual | EventSource::ManualConfirmed => 1,
        };
        (rank, self.order.unwrap_or(0))
    }
}

/// Reconciles automatic spans with manual annotations for one channel.
///
/// * Manual annotations are resolved in listing order; a later one removes the
///   overlapping region from earlier ones.
/// * An automatic span overlapping manual annotations adopts the latest one's kind
///   and notes, grows to cover them, and becomes `ManualConfirmed`.
/// * Manual annotations touching no automatic span are kept as `Manual`.
/// * Spans left overlapping are coalesced, keeping the highest-precedence label.
pub fn reconcile_events(automatic: &[NonStandardEvent], manual: &[ManualEvent]) -> Vec<NonStandardEvent> {
    let pieces = resolve_manual_overlaps(manual);
    let mut consumed = vec![false; pieces.len()];
    let mut candidates = Vec::with_capacity(automatic.len() + pieces.len());

    for span in automatic {
        let mut start = span.start;
        let mut stop = span.stop;
        let mut winner: Option<&ManualPiece> = None;

        for (idx, piece) in pieces.iter().enumerate() {
            if !piece.overlaps(span.start, span.stop) {
                continue;
            }
            consumed[idx] = true;
            start = start.min(piece.start);
            stop = stop.max(piece.stop);
            if winner.is_none_or(|current| piece.order > current.order) {
                winner = Some(piece);
            }
        }

        let candidate = match winner {
            Some(piece) => Candidate {
                event: NonStandardEvent {
                    start,
                    stop,
                    kind: piece.kind.clone(),
                    source: EventSource::ManualConfirmed,
                    notes: piece.notes.clone(),
                },
                order: Some(piece.order),
            },
            None => Candidate {
                event: NonStandardEvent::automatic(start, stop),
                order: None,
            },
        };
        candidates.push(candidate);
    }

    for (piece, used) in pieces.into_iter().zip(consumed) {
        if used {
            continue;
        }
        candidates.push(Candidate {
            event: NonStandardEvent {
                start: piece.start,
                stop: piece.stop,
                kind: piece.kind,
                source: EventSource::Manual,
                notes: piece.notes,
            },
            order: Some(piece.order),
        });
    }

    let merged = coalesce(candidates);
    debug!(
        automatic = automatic.len(),
        manual = manual.len(),
        merged = merged.len(),
        "Reconciled NSE spans"
    );
    merged
}

fn resolve_manual_overlaps(manual: &[ManualEvent]) -> Vec<ManualPiece> {
    let mut ordered: Vec<&ManualEvent> = manual.iter().collect();
    ordered.sort_by_key(|event| event.order);

    let mut pieces: Vec<ManualPiece> = Vec::with_capacity(ordered.len());
    for event in ordered {
        let mut next = Vec::with_capacity(pieces.len() + 2);
        for piece in pieces {
            if !piece.overlaps(event.start, event.stop) {
                next.push(piece);
                continue;
            }
            if piece.start < event.start {
                next.push(ManualPiece {
                    stop: event.start,
                    ..piece.clone()
                });
            }
            if event.stop < piece.stop {
                next.push(ManualPiece {
                    start: event.stop,
                    ..piece
                });
            }
        }
        next.push(ManualPiece {
            order: event.order,
            kind: event.kind.clone(),
            start: event.start,
            stop: event.stop,
            notes: event.notes.clone(),
        });
        pieces = next;
    }
    pieces
}

fn coalesce(mut candidates: Vec<Candidate>) -> Vec<NonStandardEvent> {
    candidates.sort_by(|a, b| {
        a.event
            .start
            .cmp(&b.event.start)
            .then_with(|| a.event.stop.cmp(&b.event.stop))
    });

    let mut merged: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let Some(current) = merged.last_mut() else {
            merged.push(candidate);
            continue;
        };
        if candidate.event.start >= current.event.stop {
            merged.push(candidate);
            continue;
        }

        let start = current.event.start.min(candidate.event.start);
        let stop = current.event.stop.max(candidate.event.stop);
        let confirmed = current.event.source != EventSource::Manual
            || candidate.event.source != EventSource::Manual;

        let mut winner = match candidate.precedence().cmp(&current.precedence()) {
            Ordering::Greater => candidate,
            Ordering::Less | Ordering::Equal => current.clone(),
        };
        winner.event.start = start;
        winner.event.stop = stop;
        if confirmed && winner.event.source == EventSource::Manual {
            winner.event.source = EventSource::ManualConfirmed;
        }
        *current = winner;
    }

    merged.into_iter().map(|candidate| candidate.event).collect()
}
