use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value as JsonValue};
use tracing::debug;

use crate::events::AutomationEvent;
use crate::models::{AutomationFlow, RunTrace};

/// Transient per-run state, owned by exactly one flow execution.
///
/// `variables` starts as the event payload plus the event's envelope fields
/// and grows as action blocks merge their outputs, so later blocks and
/// templates can reference earlier results.
pub struct ExecutionContext {
    pub event: AutomationEvent,
    pub flow: AutomationFlow,
    pub variables: Map<String, JsonValue>,
    pub logs: Vec<String>,
    pub started_at: DateTime<Utc>,
}

impl ExecutionContext {
    pub fn new(flow: AutomationFlow, event: AutomationEvent) -> Self {
        let mut variables = event.payload.clone();
        variables.insert("event_type".to_string(), json!(event.event_type.as_str()));
        variables.insert("entity_id".to_string(), json!(event.entity_id));
        variables.insert("entity_type".to_string(), json!(event.entity_type));
        variables.insert(
            "organization_id".to_string(),
            json!(event.organization_id),
        );
        variables.insert("user_id".to_string(), json!(event.user_id));
        variables.insert("timestamp".to_string(), json!(event.timestamp));

        Self {
            event,
            flow,
            variables,
            logs: Vec::new(),
            started_at: Utc::now(),
        }
    }

    /// Append one human-readable line to the run trace.
    pub fn log(&mut self, line: impl Into<String>) {
        let line = line.into();
        debug!(flow = %self.flow.name, "{line}");
        self.logs.push(line);
    }

    /// Shallow-merge an action's output into the run variables.
    pub fn merge_output(&mut self, output: Map<String, JsonValue>) {
        for (key, value) in output {
            self.variables.insert(key, value);
        }
    }

    pub fn trace(&self, completed_at: DateTime<Utc>) -> RunTrace {
        RunTrace {
            logs: self.logs.clone(),
            duration_ms: (completed_at - self.started_at).num_milliseconds(),
        }
    }
}
