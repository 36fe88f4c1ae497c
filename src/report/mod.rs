//! Report computation core.
//!
//! Rebuilds downtime incidents from the trigger state-change event stream and
//! aggregates them, together with raw test samples, into rolling-window SLA
//! figures. Everything in this module is a pure computation over data the
//! sources hand it; there is no I/O beyond the source traits.

mod coordinator;
mod incident;
mod sla;
mod testcount;

pub use coordinator::*;
pub use incident::*;
pub use sla::*;
pub use testcount::*;

use crate::db::{DbError, Event, ServiceKind, Store, TestSample, TriggerValue};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Report error types.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("storage error: {0}")]
    Store(#[from] DbError),
    #[error("missing SLA configuration for {0}")]
    MissingConfiguration(ServiceKind),
    /// The event source violated its ordering contract. Raised as a hard
    /// error rather than silently resorting, since resorting could hide
    /// upstream corruption.
    #[error("events out of order for object {object_id} around {clock}")]
    MalformedEventOrdering {
        object_id: i64,
        clock: DateTime<Utc>,
    },
    #[error("aggregation task failed: {0}")]
    Join(String),
}

/// Read access to the state-change event stream for one monitored object.
///
/// Pure reads; implementations must return events in ascending `(clock, id)`
/// order.
pub trait EventSource {
    /// Events within `[from, to]`, both ends inclusive.
    fn events_in_window(
        &self,
        object_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Event>, ReportError>;

    /// The last event strictly before `ts`.
    fn nearest_event_before(
        &self,
        object_id: i64,
        ts: DateTime<Utc>,
    ) -> Result<Option<Event>, ReportError>;

    /// The first event at or after `ts` whose value is in `to_values`.
    fn nearest_transition_after(
        &self,
        object_id: i64,
        ts: DateTime<Utc>,
        to_values: &[TriggerValue],
    ) -> Result<Option<Event>, ReportError>;
}

/// Read access to executed test samples for one monitored object.
pub trait SampleSource {
    /// Samples within `[from, to]`, both ends inclusive, in clock order.
    fn samples_in_window(
        &self,
        object_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<TestSample>, ReportError>;
}

impl EventSource for Store {
    fn events_in_window(
        &self,
        object_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Event>, ReportError> {
        Ok(Store::events_in_window(self, object_id, from, to)?)
    }

    fn nearest_event_before(
        &self,
        object_id: i64,
        ts: DateTime<Utc>,
    ) -> Result<Option<Event>, ReportError> {
        Ok(Store::nearest_event_before(self, object_id, ts)?)
    }

    fn nearest_transition_after(
        &self,
        object_id: i64,
        ts: DateTime<Utc>,
        to_values: &[TriggerValue],
    ) -> Result<Option<Event>, ReportError> {
        Ok(Store::nearest_transition_after(self, object_id, ts, to_values)?)
    }
}

impl SampleSource for Store {
    fn samples_in_window(
        &self,
        object_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<TestSample>, ReportError> {
        Ok(Store::samples_in_window(self, object_id, from, to)?)
    }
}
