//! Multi-service report coordination.
//!
//! Each registered service kind is aggregated independently; a failure in one
//! never blocks the others. Kinds are computed on parallel blocking tasks
//! (store reads are synchronous) and each task owns its own output slot, so
//! merging is plain map insertion.

use super::{service_aggregate, ReportError, ServiceAggregate};
use crate::db::{ServiceKind, Store};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Outcome of one service kind's aggregation.
#[derive(Debug)]
pub enum ServiceOutcome {
    Aggregate(ServiceAggregate),
    /// The kind is registered but has no SLA parameters; surfaced explicitly
    /// instead of a zero-valued aggregate.
    MissingConfiguration,
    Failed(ReportError),
}

/// Aggregate every registered service over `[now - rolling_window, now]`.
pub async fn aggregate_services(
    store: Arc<Store>,
    now: DateTime<Utc>,
    rolling_window_seconds: i64,
) -> Result<BTreeMap<ServiceKind, ServiceOutcome>, ReportError> {
    let services = store.get_services().map_err(ReportError::from)?;

    let mut handles = Vec::with_capacity(services.len());
    for service in services {
        let store = store.clone();
        let kind = service.kind;
        let handle = tokio::task::spawn_blocking(move || {
            service_aggregate(store.as_ref(), &service, now, rolling_window_seconds)
        });
        handles.push((kind, handle));
    }

    let mut outcomes = BTreeMap::new();
    for (kind, handle) in handles {
        let outcome = match handle.await {
            Ok(Ok(aggregate)) => ServiceOutcome::Aggregate(aggregate),
            Ok(Err(ReportError::MissingConfiguration(_))) => {
                tracing::warn!("service {}: SLA configuration missing, skipping", kind);
                ServiceOutcome::MissingConfiguration
            }
            Ok(Err(e)) => {
                tracing::error!("service {}: aggregation failed: {}", kind, e);
                ServiceOutcome::Failed(e)
            }
            Err(e) => {
                tracing::error!("service {}: aggregation task failed: {}", kind, e);
                ServiceOutcome::Failed(ReportError::Join(e.to_string()))
            }
        };
        outcomes.insert(kind, outcome);
    }

    Ok(outcomes)
}
