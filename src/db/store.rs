//! SQLite database store implementation.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use super::models::*;

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("Not found")]
    NotFound,
}

/// Thread-safe database store.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Create a new store with the given database path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    /// Initialize the database with migrations.
    fn init(&self) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(include_str!("../../migrations/000001_init.up.sql"))
            .map_err(|e| DbError::Migration(format!("Migration 1 failed: {}", e)))?;
        Ok(())
    }

    // --- Events ---

    /// Add state-change events in batch.
    pub fn add_events(&self, events: &[Event]) -> Result<(), DbError> {
        if events.is_empty() {
            return Ok(());
        }

        let conn = self.conn.lock().unwrap();
        let tx = conn.unchecked_transaction()?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO events (object_id, clock, value, false_positive) VALUES (?1, ?2, ?3, ?4)",
            )?;

            for e in events {
                stmt.execute(params![
                    e.object_id,
                    format_db_time(e.clock),
                    e.value.as_i64(),
                    e.false_positive as i64,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Get events for an object within `[from, to]`, both ends inclusive,
    /// ascending by clock with row id as the stable tie-breaker.
    pub fn events_in_window(
        &self,
        object_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Event>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, object_id, clock, value, false_positive FROM events
             WHERE object_id = ?1 AND clock >= ?2 AND clock <= ?3
             ORDER BY clock ASC, id ASC",
        )?;

        let events = stmt
            .query_map(
                params![object_id, format_db_time(from), format_db_time(to)],
                event_from_row,
            )?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(events)
    }

    /// Get the last event strictly before `ts` for an object.
    pub fn nearest_event_before(
        &self,
        object_id: i64,
        ts: DateTime<Utc>,
    ) -> Result<Option<Event>, DbError> {
        let conn = self.conn.lock().unwrap();
        let event = conn
            .query_row(
                "SELECT id, object_id, clock, value, false_positive FROM events
                 WHERE object_id = ?1 AND clock < ?2
                 ORDER BY clock DESC, id DESC LIMIT 1",
                params![object_id, format_db_time(ts)],
                event_from_row,
            )
            .optional()?;

        Ok(event)
    }

    /// Get the first event at or after `ts` whose value is in `to_values`.
    pub fn nearest_transition_after(
        &self,
        object_id: i64,
        ts: DateTime<Utc>,
        to_values: &[TriggerValue],
    ) -> Result<Option<Event>, DbError> {
        if to_values.is_empty() {
            return Ok(None);
        }

        // Value codes are small integers, safe to inline into the IN list.
        let codes: Vec<String> = to_values.iter().map(|v| v.as_i64().to_string()).collect();
        let sql = format!(
            "SELECT id, object_id, clock, value, false_positive FROM events
             WHERE object_id = ?1 AND clock >= ?2 AND value IN ({})
             ORDER BY clock ASC, id ASC LIMIT 1",
            codes.join(",")
        );

        let conn = self.conn.lock().unwrap();
        let event = conn
            .query_row(&sql, params![object_id, format_db_time(ts)], event_from_row)
            .optional()?;

        Ok(event)
    }

    // --- Test samples ---

    /// Add test samples for an object in batch.
    pub fn add_samples(&self, object_id: i64, samples: &[TestSample]) -> Result<(), DbError> {
        if samples.is_empty() {
            return Ok(());
        }

        let conn = self.conn.lock().unwrap();
        let tx = conn.unchecked_transaction()?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO test_samples (object_id, clock, passed) VALUES (?1, ?2, ?3)",
            )?;

            for s in samples {
                stmt.execute(params![object_id, format_db_time(s.clock), s.passed as i64])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Get test samples for an object within `[from, to]`, both ends
    /// inclusive, in ascending clock order.
    pub fn samples_in_window(
        &self,
        object_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<TestSample>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT clock, passed FROM test_samples
             WHERE object_id = ?1 AND clock >= ?2 AND clock <= ?3
             ORDER BY clock ASC, id ASC",
        )?;

        let samples = stmt
            .query_map(
                params![object_id, format_db_time(from), format_db_time(to)],
                |row| {
                    let clock_str: String = row.get(0)?;
                    let passed: i64 = row.get(1)?;
                    Ok(TestSample {
                        clock: parse_db_time(&clock_str).unwrap_or_else(Utc::now),
                        passed: passed != 0,
                    })
                },
            )?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(samples)
    }

    // --- Service registry ---

    /// Get all registered services.
    pub fn get_services(&self) -> Result<Vec<Service>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT kind, object_id, measurement_interval_seconds, sla_threshold_minutes
             FROM services ORDER BY kind",
        )?;

        let rows = stmt
            .query_map([], |row| {
                let kind: String = row.get(0)?;
                let interval: Option<i64> = row.get(2)?;
                let threshold: Option<i64> = row.get(3)?;
                Ok((kind, row.get::<_, i64>(1)?, interval, threshold))
            })?
            .collect::<SqlResult<Vec<_>>>()?;

        let services = rows
            .into_iter()
            .filter_map(|(kind, object_id, interval, threshold)| {
                let kind = ServiceKind::from_str_opt(&kind)?;
                let sla = match (interval, threshold) {
                    (Some(i), Some(t)) => Some(SlaConfig {
                        measurement_interval_seconds: i,
                        sla_threshold_minutes: t,
                    }),
                    _ => None,
                };
                Some(Service {
                    kind,
                    object_id,
                    sla,
                })
            })
            .collect();

        Ok(services)
    }

    /// Get one registered service by kind.
    pub fn get_service(&self, kind: ServiceKind) -> Result<Service, DbError> {
        self.get_services()?
            .into_iter()
            .find(|s| s.kind == kind)
            .ok_or(DbError::NotFound)
    }

    /// Insert or replace a service registration.
    pub fn upsert_service(&self, service: &Service) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO services (kind, object_id, measurement_interval_seconds, sla_threshold_minutes)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(kind) DO UPDATE SET
             object_id=excluded.object_id,
             measurement_interval_seconds=excluded.measurement_interval_seconds,
             sla_threshold_minutes=excluded.sla_threshold_minutes",
            params![
                service.kind.as_str(),
                service.object_id,
                service.sla.map(|s| s.measurement_interval_seconds),
                service.sla.map(|s| s.sla_threshold_minutes),
            ],
        )?;
        Ok(())
    }
}

fn event_from_row(row: &rusqlite::Row<'_>) -> SqlResult<Event> {
    let clock_str: String = row.get(2)?;
    let value: i64 = row.get(3)?;
    let false_positive: i64 = row.get(4)?;
    Ok(Event {
        id: row.get(0)?,
        object_id: row.get(1)?,
        clock: parse_db_time(&clock_str).unwrap_or_else(Utc::now),
        value: TriggerValue::from_i64(value),
        false_positive: false_positive != 0,
    })
}

/// Format a datetime for storage; lexicographic order matches time order.
fn format_db_time(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S%.9f").to_string()
}

/// Parse a datetime string from the database.
fn parse_db_time(s: &str) -> Option<DateTime<Utc>> {
    // Try various formats
    let formats = [
        "%Y-%m-%d %H:%M:%S%.9f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.9fZ",
        "%Y-%m-%dT%H:%M:%SZ",
    ];

    for fmt in &formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    // Try ISO 8601
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    None
}
