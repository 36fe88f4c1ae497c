//! Incident reconstruction from the state-change event stream.
//!
//! An incident is a maximal contiguous span during which a monitored object
//! was DOWN. Reconstruction walks the deduplicated event stream for one
//! object through a reporting window, seeding from the last event before the
//! window and, if necessary, closing a still-open span from the first
//! recovery event after it.

use super::{EventSource, ReportError};
use crate::db::{EffectiveValue, Event, TriggerValue};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Whether an incident has been closed by a recovery event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentStatus {
    Active,
    Resolved,
}

/// A maximal contiguous DOWN span of one monitored object.
#[derive(Debug, Clone, Serialize)]
pub struct Incident {
    pub object_id: i64,
    pub status: IncidentStatus,
    /// Preserved from the opening event even when it precedes the reporting
    /// window; never clamped.
    pub start_time: DateTime<Utc>,
    /// Absent while the incident is still ongoing. May exceed the reporting
    /// window when the recovery event lies past it.
    pub end_time: Option<DateTime<Utc>>,
    /// Taken from the opening event only; later events never change it.
    pub false_positive: bool,
    pub total_tests: u64,
    pub failed_tests: u64,
}

impl Incident {
    fn open(object_id: i64, start_time: DateTime<Utc>, false_positive: bool) -> Self {
        Self {
            object_id,
            status: IncidentStatus::Active,
            start_time,
            end_time: None,
            false_positive,
            total_tests: 0,
            failed_tests: 0,
        }
    }

    fn close(&mut self, end_time: DateTime<Utc>) {
        self.end_time = Some(end_time);
        self.status = IncidentStatus::Resolved;
    }
}

/// Result of one reconstruction pass over a window.
#[derive(Debug, Clone)]
pub struct Reconstruction {
    /// Non-overlapping, in chronological order.
    pub incidents: Vec<Incident>,
    /// Post-dedup state transitions observed inside the window. Display
    /// counter only, never used for SLA math.
    pub status_changes: u64,
}

/// Drop events whose effective value repeats the preceding one.
///
/// `prior` seeds the comparison with the effective value of the last event
/// before the window, so an in-window event that merely restates pre-window
/// state is recognized as noise too. UNKNOWN collapses to UP for the
/// comparison, so DOWN → UNKNOWN → UP yields a single transition out of DOWN.
pub fn dedup_events(prior: Option<EffectiveValue>, events: Vec<Event>) -> Vec<Event> {
    let mut last = prior;
    let mut out = Vec::with_capacity(events.len());

    for event in events {
        let effective = event.value.effective();
        if last == Some(effective) {
            continue;
        }
        last = Some(effective);
        out.push(event);
    }

    out
}

/// Reconstruct the incidents of one object across `[from, to]`.
///
/// Events outside the window are consulted through the source's boundary
/// lookups: the last event before `from` may open a pre-existing incident
/// (with its true start time), and the first UP/UNKNOWN event after `to`
/// closes a span still open at the end of the scan.
pub fn reconstruct<E: EventSource>(
    source: &E,
    object_id: i64,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Reconstruction, ReportError> {
    let raw = source.events_in_window(object_id, from, to)?;
    check_ordering(object_id, &raw)?;

    let prior = source.nearest_event_before(object_id, from)?;

    // An object already DOWN at the window start carries an open incident in,
    // start time and false-positive flag preserved from the opening event.
    let mut open: Option<Incident> = None;
    if let Some(p) = &prior {
        if p.value.effective() == EffectiveValue::Down {
            open = Some(Incident::open(object_id, p.clock, p.false_positive));
        }
    }

    let deduped = dedup_events(prior.map(|p| p.value.effective()), raw);
    let status_changes = deduped.len() as u64;

    let mut incidents = Vec::new();

    for event in &deduped {
        match event.value.effective() {
            EffectiveValue::Down => {
                if open.is_some() {
                    // Unreachable after dedup unless the source produced two
                    // DOWN transitions with no recovery between them. Merge
                    // into the open span rather than dropping data.
                    tracing::warn!(
                        "object {}: DOWN at {} while an incident is already open, merging",
                        object_id,
                        event.clock
                    );
                } else {
                    open = Some(Incident::open(object_id, event.clock, event.false_positive));
                }
            }
            EffectiveValue::Up => {
                if let Some(mut incident) = open.take() {
                    incident.close(event.clock);
                    incidents.push(incident);
                }
            }
        }
    }

    // A span still open after the scan either ends at the first recovery
    // event past the window (its true boundary, deliberately allowed to
    // exceed `to`) or is ongoing as of now.
    if let Some(mut incident) = open.take() {
        if let Some(closer) = source.nearest_transition_after(
            object_id,
            to,
            &[TriggerValue::Up, TriggerValue::Unknown],
        )? {
            incident.close(closer.clock);
        }
        incidents.push(incident);
    }

    Ok(Reconstruction {
        incidents,
        status_changes,
    })
}

fn check_ordering(object_id: i64, events: &[Event]) -> Result<(), ReportError> {
    for pair in events.windows(2) {
        let earlier = (pair[0].clock, pair[0].id);
        let later = (pair[1].clock, pair[1].id);
        if later < earlier {
            return Err(ReportError::MalformedEventOrdering {
                object_id,
                clock: pair[1].clock,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::testutil::{event, ts, StaticSource};

    #[test]
    fn test_single_closed_incident() {
        let source = StaticSource::events(vec![
            event(1, 10, 100, TriggerValue::Down),
            event(2, 10, 400, TriggerValue::Up),
        ]);

        let recon = reconstruct(&source, 10, ts(0), ts(1000)).unwrap();
        assert_eq!(recon.incidents.len(), 1);
        let inc = &recon.incidents[0];
        assert_eq!(inc.start_time, ts(100));
        assert_eq!(inc.end_time, Some(ts(400)));
        assert_eq!(inc.status, IncidentStatus::Resolved);
        assert!(!inc.false_positive);
        assert_eq!(recon.status_changes, 2);
    }

    #[test]
    fn test_incident_started_before_window_keeps_true_start() {
        let source = StaticSource::events(vec![
            event(1, 10, 100, TriggerValue::Down),
            event(2, 10, 400, TriggerValue::Up),
        ]);

        // Window starts after the opening event; nearest_event_before(200)
        // returns the DOWN at t=100, whose clock must not be clamped.
        let recon = reconstruct(&source, 10, ts(200), ts(1000)).unwrap();
        assert_eq!(recon.incidents.len(), 1);
        assert_eq!(recon.incidents[0].start_time, ts(100));
        assert_eq!(recon.incidents[0].end_time, Some(ts(400)));
    }

    #[test]
    fn test_incident_with_no_recovery_stays_open() {
        let source = StaticSource::events(vec![event(1, 10, 100, TriggerValue::Down)]);

        let recon = reconstruct(&source, 10, ts(0), ts(1000)).unwrap();
        assert_eq!(recon.incidents.len(), 1);
        let inc = &recon.incidents[0];
        assert_eq!(inc.start_time, ts(100));
        assert_eq!(inc.end_time, None);
        assert_eq!(inc.status, IncidentStatus::Active);
    }

    #[test]
    fn test_consecutive_downs_collapse_to_one_incident() {
        let source = StaticSource::events(vec![
            event(1, 10, 100, TriggerValue::Down),
            event(2, 10, 150, TriggerValue::Down),
        ]);

        let recon = reconstruct(&source, 10, ts(0), ts(1000)).unwrap();
        assert_eq!(recon.incidents.len(), 1);
        assert_eq!(recon.incidents[0].start_time, ts(100));
        // The repeated DOWN is noise, not a transition.
        assert_eq!(recon.status_changes, 1);
    }

    #[test]
    fn test_dedup_is_idempotent_over_repeated_events() {
        let once = StaticSource::events(vec![
            event(1, 10, 100, TriggerValue::Down),
            event(2, 10, 400, TriggerValue::Up),
        ]);
        let twice = StaticSource::events(vec![
            event(1, 10, 100, TriggerValue::Down),
            event(2, 10, 100, TriggerValue::Down),
            event(3, 10, 400, TriggerValue::Up),
            event(4, 10, 400, TriggerValue::Up),
        ]);

        let a = reconstruct(&once, 10, ts(0), ts(1000)).unwrap();
        let b = reconstruct(&twice, 10, ts(0), ts(1000)).unwrap();

        assert_eq!(a.incidents.len(), b.incidents.len());
        assert_eq!(a.incidents[0].start_time, b.incidents[0].start_time);
        assert_eq!(a.incidents[0].end_time, b.incidents[0].end_time);
        assert_eq!(a.status_changes, b.status_changes);
    }

    #[test]
    fn test_unknown_counts_as_up_for_change_detection() {
        let source = StaticSource::events(vec![
            event(1, 10, 100, TriggerValue::Down),
            event(2, 10, 300, TriggerValue::Unknown),
            event(3, 10, 350, TriggerValue::Up),
            event(4, 10, 500, TriggerValue::Down),
            event(5, 10, 600, TriggerValue::Up),
        ]);

        let recon = reconstruct(&source, 10, ts(0), ts(1000)).unwrap();
        assert_eq!(recon.incidents.len(), 2);
        // UNKNOWN at t=300 closes the first incident; the UP at t=350 is a
        // duplicate effective value and is dropped.
        assert_eq!(recon.incidents[0].end_time, Some(ts(300)));
        assert_eq!(recon.incidents[1].start_time, ts(500));
        assert_eq!(recon.status_changes, 4);
    }

    #[test]
    fn test_open_incident_closed_by_event_past_window() {
        let source = StaticSource::events(vec![
            event(1, 10, 800, TriggerValue::Down),
            event(2, 10, 1200, TriggerValue::Up),
        ]);

        let recon = reconstruct(&source, 10, ts(0), ts(1000)).unwrap();
        assert_eq!(recon.incidents.len(), 1);
        let inc = &recon.incidents[0];
        // The true boundary lies past the window and is reported as such.
        assert_eq!(inc.end_time, Some(ts(1200)));
        assert_eq!(inc.status, IncidentStatus::Resolved);
    }

    #[test]
    fn test_pre_window_down_with_no_in_window_events() {
        let source = StaticSource::events(vec![event(1, 10, 50, TriggerValue::Down)]);

        let recon = reconstruct(&source, 10, ts(200), ts(1000)).unwrap();
        assert_eq!(recon.incidents.len(), 1);
        assert_eq!(recon.incidents[0].start_time, ts(50));
        assert_eq!(recon.incidents[0].end_time, None);
        assert_eq!(recon.status_changes, 0);
    }

    #[test]
    fn test_empty_stream_yields_no_incidents() {
        let source = StaticSource::events(vec![]);
        let recon = reconstruct(&source, 10, ts(0), ts(1000)).unwrap();
        assert!(recon.incidents.is_empty());
        assert_eq!(recon.status_changes, 0);
    }

    #[test]
    fn test_incidents_never_overlap_and_alternate() {
        let source = StaticSource::events(vec![
            event(1, 10, 100, TriggerValue::Down),
            event(2, 10, 200, TriggerValue::Up),
            event(3, 10, 300, TriggerValue::Down),
            event(4, 10, 350, TriggerValue::Down),
            event(5, 10, 400, TriggerValue::Unknown),
            event(6, 10, 700, TriggerValue::Down),
        ]);

        let recon = reconstruct(&source, 10, ts(0), ts(1000)).unwrap();
        assert_eq!(recon.incidents.len(), 3);

        for pair in recon.incidents.windows(2) {
            let end = pair[0].end_time.expect("all but the last must be closed");
            assert!(end <= pair[1].start_time);
            assert!(pair[0].start_time < pair[1].start_time);
        }
    }

    #[test]
    fn test_false_positive_comes_from_opening_event() {
        let mut opening = event(1, 10, 100, TriggerValue::Down);
        opening.false_positive = true;
        let source = StaticSource::events(vec![opening, event(2, 10, 400, TriggerValue::Up)]);

        let recon = reconstruct(&source, 10, ts(0), ts(1000)).unwrap();
        assert!(recon.incidents[0].false_positive);
    }

    #[test]
    fn test_out_of_order_events_are_a_hard_error() {
        let source = StaticSource {
            events: vec![
                event(1, 10, 400, TriggerValue::Down),
                event(2, 10, 100, TriggerValue::Up),
            ],
            samples: Vec::new(),
        };

        let err = reconstruct(&source, 10, ts(0), ts(1000)).unwrap_err();
        assert!(matches!(
            err,
            ReportError::MalformedEventOrdering { object_id: 10, .. }
        ));
    }

    #[test]
    fn test_equal_clocks_are_valid_when_ids_ascend() {
        let source = StaticSource::events(vec![
            event(1, 10, 100, TriggerValue::Down),
            event(2, 10, 100, TriggerValue::Up),
        ]);

        let recon = reconstruct(&source, 10, ts(0), ts(1000)).unwrap();
        assert_eq!(recon.incidents.len(), 1);
        assert_eq!(recon.incidents[0].end_time, Some(ts(100)));
    }

    #[test]
    fn test_dedup_events_standalone() {
        let events = vec![
            event(1, 10, 100, TriggerValue::Down),
            event(2, 10, 150, TriggerValue::Down),
            event(3, 10, 200, TriggerValue::Unknown),
            event(4, 10, 250, TriggerValue::Up),
            event(5, 10, 300, TriggerValue::Down),
        ];

        let deduped = dedup_events(None, events.clone());
        assert_eq!(deduped.len(), 3);
        assert_eq!(deduped[0].clock, ts(100));
        assert_eq!(deduped[1].clock, ts(200));
        assert_eq!(deduped[2].clock, ts(300));

        // Seeding with a prior DOWN drops the leading DOWN as well.
        let deduped = dedup_events(Some(EffectiveValue::Down), events);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].clock, ts(200));
    }
}
