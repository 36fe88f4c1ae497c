//! Rolling-window SLA aggregation.

use super::{incident_contains, reconstruct, EventSource, ReportError, SampleSource};
use crate::db::{Service, ServiceKind};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;

/// SLA figures for one service kind over a trailing window.
///
/// Derived, read-only; recomputed per report request.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceAggregate {
    pub service_kind: ServiceKind,
    /// Tests executed in the window, independent of incident grouping.
    pub total_tests: u64,
    /// Tests whose clock falls inside any reconstructed incident.
    pub tests_in_incident: u64,
    /// Failed tests in the window; the raw down-count.
    pub down_test_count: u64,
    pub down_minutes: f64,
    /// Post-dedup transitions in the window. Display counter only.
    pub status_change_count: u64,
    pub sla_threshold_minutes: i64,
    pub measurement_interval_seconds: i64,
}

impl ServiceAggregate {
    /// The configured allowance converted to seconds. The raw config value
    /// is minutes; the conversion happens here once, not per incident.
    pub fn sla_threshold_seconds(&self) -> i64 {
        self.sla_threshold_minutes * 60
    }
}

/// Compute one service kind's aggregate over `[now - rolling_window, now]`.
///
/// Fails with `MissingConfiguration` when the service has no SLA parameters;
/// the caller must surface that explicitly, never a zeroed aggregate.
pub fn service_aggregate<S: EventSource + SampleSource>(
    source: &S,
    service: &Service,
    now: DateTime<Utc>,
    rolling_window_seconds: i64,
) -> Result<ServiceAggregate, ReportError> {
    let sla = service
        .sla
        .ok_or(ReportError::MissingConfiguration(service.kind))?;

    let week_from = now - ChronoDuration::seconds(rolling_window_seconds);
    let week_to = now;

    let recon = reconstruct(source, service.object_id, week_from, week_to)?;
    let samples = source.samples_in_window(service.object_id, week_from, week_to)?;

    let total_tests = samples.len() as u64;
    let down_test_count = samples.iter().filter(|s| !s.passed).count() as u64;
    let tests_in_incident = samples
        .iter()
        .filter(|s| {
            recon
                .incidents
                .iter()
                .any(|i| incident_contains(i, week_to, s.clock))
        })
        .count() as u64;

    let down_minutes = down_test_count as f64 * sla.measurement_interval_seconds as f64 / 60.0;

    Ok(ServiceAggregate {
        service_kind: service.kind,
        total_tests,
        tests_in_incident,
        down_test_count,
        down_minutes,
        status_change_count: recon.status_changes,
        sla_threshold_minutes: sla.sla_threshold_minutes,
        measurement_interval_seconds: sla.measurement_interval_seconds,
    })
}
