//! Per-incident test counting.
//!
//! Events mark trigger state changes; test samples mark individual test
//! executions. These helpers map samples onto incident spans, which is all
//! the reporting pages need from them.

use super::{Incident, ReportError, SampleSource};
use crate::db::TestSample;
use chrono::{DateTime, Utc};

/// Whether a sample taken at `ts` falls inside the incident.
///
/// The span starts inclusively at the opening event. A closed incident ends
/// just before its recovery event (the sample taken at the recovery clock
/// belongs to the restored service); an open one is bounded by the reporting
/// window's `to`, never unbounded.
pub fn incident_contains(incident: &Incident, window_to: DateTime<Utc>, ts: DateTime<Utc>) -> bool {
    if ts < incident.start_time {
        return false;
    }
    match incident.end_time {
        Some(end) => ts < end,
        None => ts <= window_to,
    }
}

/// Count total and failed test executions inside one incident.
///
/// Pure function over the supplied samples; the caller fetches them over a
/// range covering the incident.
pub fn count_tests(
    incident: &Incident,
    window_to: DateTime<Utc>,
    samples: &[TestSample],
) -> (u64, u64) {
    let mut total = 0;
    let mut failed = 0;

    for sample in samples {
        if incident_contains(incident, window_to, sample.clock) {
            total += 1;
            if !sample.passed {
                failed += 1;
            }
        }
    }

    (total, failed)
}

/// Reconstruct incidents over `[from, to]` and fill in their test counts.
///
/// This is the detail report view: each incident's samples are fetched over
/// `[min(start, from), max(end or to, to)]`, since both the start and the
/// recovery of a span may lie outside the reporting window.
pub fn incidents_with_tests<S: super::EventSource + SampleSource>(
    source: &S,
    object_id: i64,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<Incident>, ReportError> {
    let recon = super::reconstruct(source, object_id, from, to)?;
    let mut incidents = recon.incidents;

    for incident in &mut incidents {
        let fetch_from = incident.start_time.min(from);
        let fetch_to = incident.end_time.unwrap_or(to).max(to);
        let samples = source.samples_in_window(object_id, fetch_from, fetch_to)?;

        let (total, failed) = count_tests(incident, to, &samples);
        incident.total_tests = total;
        incident.failed_tests = failed;
    }

    Ok(incidents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::TriggerValue;
    use crate::report::testutil::{event, sample, ts, StaticSource};

    #[test]
    fn test_closed_incident_counts_down_samples() {
        // DOWN at t=100, UP at t=400; a test executes every 50s, failing
        // while the service is down and passing once it recovers.
        let mut source = StaticSource::events(vec![
            event(1, 10, 100, TriggerValue::Down),
            event(2, 10, 400, TriggerValue::Up),
        ]);
        source.samples = (0..=20)
            .map(|i| {
                let clock = i * 50;
                sample(clock, !(100..400).contains(&clock))
            })
            .collect();

        let incidents = incidents_with_tests(&source, 10, ts(0), ts(1000)).unwrap();
        assert_eq!(incidents.len(), 1);
        assert_eq!(incidents[0].total_tests, 6);
        assert_eq!(incidents[0].failed_tests, 6);
    }

    #[test]
    fn test_start_sample_included_recovery_sample_excluded() {
        let mut source = StaticSource::events(vec![
            event(1, 10, 100, TriggerValue::Down),
            event(2, 10, 200, TriggerValue::Up),
        ]);
        source.samples = vec![
            sample(99, true),
            sample(100, false),
            sample(150, false),
            sample(200, true),
        ];

        let incidents = incidents_with_tests(&source, 10, ts(0), ts(1000)).unwrap();
        assert_eq!(incidents[0].total_tests, 2);
        assert_eq!(incidents[0].failed_tests, 2);
    }

    #[test]
    fn test_open_incident_bounded_by_window_end() {
        let mut source = StaticSource::events(vec![event(1, 10, 100, TriggerValue::Down)]);
        // Samples continue past the window; only those up to `to` count.
        source.samples = vec![
            sample(100, false),
            sample(500, false),
            sample(1000, false),
            sample(1500, false),
        ];

        let incidents = incidents_with_tests(&source, 10, ts(0), ts(1000)).unwrap();
        assert_eq!(incidents[0].end_time, None);
        assert_eq!(incidents[0].total_tests, 3);
        assert_eq!(incidents[0].failed_tests, 3);
    }

    #[test]
    fn test_counts_cover_span_outside_window() {
        // Incident [100, 1200) seen through window [200, 1000]: test counts
        // span the full incident, not just the visible part.
        let mut source = StaticSource::events(vec![
            event(1, 10, 100, TriggerValue::Down),
            event(2, 10, 1200, TriggerValue::Up),
        ]);
        source.samples = (0..=13).map(|i| sample(i * 100, false)).collect();

        let incidents = incidents_with_tests(&source, 10, ts(200), ts(1000)).unwrap();
        assert_eq!(incidents.len(), 1);
        assert_eq!(incidents[0].start_time, ts(100));
        assert_eq!(incidents[0].end_time, Some(ts(1200)));
        // Samples at 100..1100 inclusive fall inside [100, 1200).
        assert_eq!(incidents[0].total_tests, 11);
    }

    #[test]
    fn test_counts_partition_the_window() {
        // Every sample lands either in exactly one incident or in up-time;
        // the per-incident totals plus up-time samples add back up.
        let mut source = StaticSource::events(vec![
            event(1, 10, 100, TriggerValue::Down),
            event(2, 10, 300, TriggerValue::Up),
            event(3, 10, 600, TriggerValue::Down),
        ]);
        let samples: Vec<_> = (0..=20).map(|i| sample(i * 50, i % 3 != 0)).collect();
        source.samples = samples.clone();

        let window_to = ts(1000);
        let incidents = incidents_with_tests(&source, 10, ts(0), window_to).unwrap();
        assert_eq!(incidents.len(), 2);

        let in_incidents: u64 = incidents.iter().map(|i| i.total_tests).sum();
        let uptime = samples
            .iter()
            .filter(|s| {
                s.clock <= window_to
                    && !incidents
                        .iter()
                        .any(|i| incident_contains(i, window_to, s.clock))
            })
            .count() as u64;

        let in_window = samples.iter().filter(|s| s.clock <= window_to).count() as u64;
        assert_eq!(in_incidents + uptime, in_window);
    }
}
