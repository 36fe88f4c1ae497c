//! Database model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Observed state of an availability trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerValue {
    Up,
    Down,
    Unknown,
}

impl TriggerValue {
    /// Collapse UNKNOWN into UP for change detection.
    ///
    /// Only DOWN opens or sustains an incident; an UNKNOWN reading is
    /// equivalent to UP as far as state transitions are concerned.
    pub fn effective(self) -> EffectiveValue {
        match self {
            TriggerValue::Down => EffectiveValue::Down,
            TriggerValue::Up | TriggerValue::Unknown => EffectiveValue::Up,
        }
    }

    /// Encode for storage.
    pub fn as_i64(self) -> i64 {
        match self {
            TriggerValue::Up => 0,
            TriggerValue::Down => 1,
            TriggerValue::Unknown => 2,
        }
    }

    /// Decode from storage. Unrecognized codes read as UNKNOWN.
    pub fn from_i64(v: i64) -> Self {
        match v {
            0 => TriggerValue::Up,
            1 => TriggerValue::Down,
            _ => TriggerValue::Unknown,
        }
    }
}

/// A trigger value after collapsing UNKNOWN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectiveValue {
    Up,
    Down,
}

/// One state-change event of an availability trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Row id; also the stable tie-breaker for equal clocks.
    #[serde(default)]
    pub id: i64,
    pub object_id: i64,
    pub clock: DateTime<Utc>,
    pub value: TriggerValue,
    #[serde(default)]
    pub false_positive: bool,
}

/// One executed availability measurement, independent of the event stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSample {
    pub clock: DateTime<Utc>,
    pub passed: bool,
}

/// A monitored service capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServiceKind {
    Dns,
    Dnssec,
    Rdds,
    Epp,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 4] = [
        ServiceKind::Dns,
        ServiceKind::Dnssec,
        ServiceKind::Rdds,
        ServiceKind::Epp,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ServiceKind::Dns => "DNS",
            ServiceKind::Dnssec => "DNSSEC",
            ServiceKind::Rdds => "RDDS",
            ServiceKind::Epp => "EPP",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "DNS" => Some(ServiceKind::Dns),
            "DNSSEC" => Some(ServiceKind::Dnssec),
            "RDDS" => Some(ServiceKind::Rdds),
            "EPP" => Some(ServiceKind::Epp),
            _ => None,
        }
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SLA parameters for one service kind.
///
/// These come from configuration, never derived from the event stream.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SlaConfig {
    pub measurement_interval_seconds: i64,
    pub sla_threshold_minutes: i64,
}

/// A registered service: which trigger object carries its availability, and
/// its SLA configuration if known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub kind: ServiceKind,
    pub object_id: i64,
    pub sla: Option<SlaConfig>,
}
