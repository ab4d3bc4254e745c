use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::events::AutomationEvent;

/// Outcome recorded for one flow execution attempt.
///
/// Note that a run halted by an unmet condition or a deferred delay is
/// recorded as `success`; only block errors produce `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Success,
    Failed,
    Scheduled,
}

impl LogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStatus::Success => "success",
            LogStatus::Failed => "failed",
            LogStatus::Scheduled => "scheduled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "success" => Some(LogStatus::Success),
            "failed" => Some(LogStatus::Failed),
            "scheduled" => Some(LogStatus::Scheduled),
            _ => None,
        }
    }
}

/// Append-only execution record. One row per flow execution attempt, plus
/// one `scheduled` row per deferred delay. Rows are never rewritten; the
/// single exception is the `resumed_at` claim marker the sweeper sets on
/// `scheduled` rows (see `resume`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationLog {
    pub id: Uuid,
    pub flow_id: Uuid,
    pub organization_id: Uuid,
    pub status: LogStatus,
    pub trigger_data: JsonValue,
    pub result: Option<JsonValue>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub resumed_at: Option<DateTime<Utc>>,
}

/// Insert payload for a log row; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewAutomationLog {
    pub flow_id: Uuid,
    pub organization_id: Uuid,
    pub status: LogStatus,
    pub trigger_data: JsonValue,
    pub result: Option<JsonValue>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Trace persisted into a log row's `result` column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunTrace {
    pub logs: Vec<String>,
    pub duration_ms: i64,
}

/// `trigger_data` envelope of a `scheduled` log row: everything needed to
/// re-enter the flow at the block after the deferring delay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledContinuation {
    pub event: AutomationEvent,
    pub resume_block_index: usize,
    pub execute_at: DateTime<Utc>,
}
