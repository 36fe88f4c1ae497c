//! HTTP request handlers for the report API.

use super::AppState;
use crate::db::{Event, Service, ServiceKind, TestSample};
use crate::report::{
    aggregate_services, incidents_with_tests, Incident, ServiceAggregate, ServiceOutcome,
};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Incident detail view
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct IncidentsQuery {
    pub object_id: i64,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IncidentsResponse {
    pub object_id: i64,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub incidents: Vec<Incident>,
}

pub async fn handle_get_incidents(
    State(state): State<AppState>,
    Query(query): Query<IncidentsQuery>,
) -> impl IntoResponse {
    // Parse time range; default to the trailing rolling window.
    let to = query
        .to
        .as_ref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    let from = query
        .from
        .as_ref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| to - ChronoDuration::seconds(state.config.rolling_window_seconds));

    if from >= to {
        return (StatusCode::BAD_REQUEST, "from must precede to").into_response();
    }

    match incidents_with_tests(state.store.as_ref(), query.object_id, from, to) {
        Ok(incidents) => Json(IncidentsResponse {
            object_id: query.object_id,
            from,
            to,
            incidents,
        })
        .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

// ============================================================================
// SLA summary view
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SlaEntry {
    Ok {
        #[serde(flatten)]
        aggregate: ServiceAggregate,
        sla_threshold_seconds: i64,
    },
    ConfigurationMissing,
    Error {
        message: String,
    },
}

pub async fn handle_get_sla(State(state): State<AppState>) -> impl IntoResponse {
    let now = Utc::now();
    let outcomes = match aggregate_services(
        state.store.clone(),
        now,
        state.config.rolling_window_seconds,
    )
    .await
    {
        Ok(o) => o,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };

    let entries: BTreeMap<ServiceKind, SlaEntry> = outcomes
        .into_iter()
        .map(|(kind, outcome)| {
            let entry = match outcome {
                ServiceOutcome::Aggregate(aggregate) => {
                    let sla_threshold_seconds = aggregate.sla_threshold_seconds();
                    SlaEntry::Ok {
                        aggregate,
                        sla_threshold_seconds,
                    }
                }
                ServiceOutcome::MissingConfiguration => SlaEntry::ConfigurationMissing,
                ServiceOutcome::Failed(e) => SlaEntry::Error {
                    message: e.to_string(),
                },
            };
            (kind, entry)
        })
        .collect();

    Json(entries).into_response()
}

// ============================================================================
// Service registry
// ============================================================================

pub async fn handle_get_services(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.get_services() {
        Ok(services) => Json(services).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

pub async fn handle_upsert_service(
    State(state): State<AppState>,
    Json(service): Json<Service>,
) -> impl IntoResponse {
    if service.object_id <= 0 {
        return (StatusCode::BAD_REQUEST, "object_id must be positive").into_response();
    }
    if let Some(sla) = &service.sla {
        if sla.measurement_interval_seconds <= 0 || sla.sla_threshold_minutes <= 0 {
            return (StatusCode::BAD_REQUEST, "SLA parameters must be positive").into_response();
        }
    }

    match state.store.upsert_service(&service) {
        Ok(()) => Json(service).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

// ============================================================================
// Ingestion
// ============================================================================

pub async fn handle_add_events(
    State(state): State<AppState>,
    Json(events): Json<Vec<Event>>,
) -> impl IntoResponse {
    match state.store.add_events(&events) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct SampleBatch {
    pub object_id: i64,
    pub samples: Vec<TestSample>,
}

pub async fn handle_add_samples(
    State(state): State<AppState>,
    Json(batch): Json<SampleBatch>,
) -> impl IntoResponse {
    match state.store.add_samples(batch.object_id, &batch.samples) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
