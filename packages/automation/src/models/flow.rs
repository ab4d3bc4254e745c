use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use tracing::warn;
use uuid::Uuid;

use crate::error::{BlockDecodeError, TriggerParseError};
use crate::events::AutomationEvent;
use crate::template;

/// Flow lifecycle status. Only `active` flows are eligible for execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowStatus {
    Active,
    Paused,
    Draft,
    Archived,
}

impl FlowStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(FlowStatus::Active),
            "paused" => Some(FlowStatus::Paused),
            "draft" => Some(FlowStatus::Draft),
            "archived" => Some(FlowStatus::Archived),
            _ => None,
        }
    }
}

/// An organization-authored automation definition.
///
/// Mutated by the engine only through `record_flow_run` (run counter and
/// `last_run`); blocks are authored elsewhere and read-only here.
#[derive(Debug, Clone)]
pub struct AutomationFlow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub status: FlowStatus,
    pub trigger: TriggerConfig,
    pub blocks: Vec<FlowBlock>,
    pub run_count: i64,
    pub last_run: Option<DateTime<Utc>>,
}

impl AutomationFlow {
    /// Whether this flow should run for `event`: active, trigger event name
    /// matches, and the optional `field=value` condition holds against the
    /// event payload (string equality only at the trigger level).
    pub fn matches(&self, event: &AutomationEvent) -> bool {
        if self.status != FlowStatus::Active {
            return false;
        }
        if self.trigger.event != event.event_type.as_str() {
            return false;
        }
        match &self.trigger.condition {
            None => true,
            Some(raw) => match TriggerCondition::parse(raw) {
                Ok(condition) => condition.matches(event),
                Err(err) => {
                    warn!(flow_id = %self.id, %err, "unparseable trigger condition, flow skipped");
                    false
                }
            },
        }
    }
}

/// The trigger half of a flow: which event fires it, plus an optional
/// single equality condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// A parsed `field=value` trigger condition. The field is a dotted path
/// into the event payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerCondition {
    pub field: String,
    pub value: String,
}

impl TriggerCondition {
    pub fn parse(raw: &str) -> Result<Self, TriggerParseError> {
        let (field, value) = raw.split_once('=').ok_or_else(|| TriggerParseError {
            raw: raw.to_string(),
        })?;
        let field = field.trim();
        if field.is_empty() {
            return Err(TriggerParseError {
                raw: raw.to_string(),
            });
        }
        Ok(Self {
            field: field.to_string(),
            value: value.trim().to_string(),
        })
    }

    pub fn matches(&self, event: &AutomationEvent) -> bool {
        match template::lookup_path(&event.payload, &self.field) {
            Some(actual) => template::value_to_string(actual) == self.value,
            None => false,
        }
    }
}

/// One pipeline step of a flow, decoded from the stored
/// `{id, type, label, config}` shape into a typed `BlockKind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawBlock", into = "RawBlock")]
pub struct FlowBlock {
    pub id: String,
    pub label: String,
    pub kind: BlockKind,
}

/// Typed block payloads. The `trigger` block is stored metadata only and is
/// never executed.
#[derive(Debug, Clone)]
pub enum BlockKind {
    Trigger,
    Delay(DelayConfig),
    Condition(ConditionConfig),
    Action(ActionConfig),
}

impl BlockKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            BlockKind::Trigger => "trigger",
            BlockKind::Delay(_) => "delay",
            BlockKind::Condition(_) => "condition",
            BlockKind::Action(_) => "action",
        }
    }
}

/// Stored wire shape of a block row, used only at the decode boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawBlock {
    id: String,
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    label: String,
    #[serde(default)]
    config: JsonValue,
}

impl TryFrom<RawBlock> for FlowBlock {
    type Error = BlockDecodeError;

    fn try_from(raw: RawBlock) -> Result<Self, Self::Error> {
        let kind = match raw.block_type.as_str() {
            "trigger" => BlockKind::Trigger,
            "delay" => BlockKind::Delay(decode_config(&raw)?),
            "condition" => BlockKind::Condition(decode_config(&raw)?),
            "action" => BlockKind::Action(decode_config(&raw)?),
            other => {
                return Err(BlockDecodeError::UnknownType {
                    block_id: raw.id,
                    block_type: other.to_string(),
                })
            }
        };
        Ok(FlowBlock {
            id: raw.id,
            label: raw.label,
            kind,
        })
    }
}

impl From<FlowBlock> for RawBlock {
    fn from(block: FlowBlock) -> Self {
        let (block_type, config) = match block.kind {
            BlockKind::Trigger => ("trigger", JsonValue::Object(Default::default())),
            BlockKind::Delay(config) => {
                ("delay", serde_json::to_value(config).unwrap_or_default())
            }
            BlockKind::Condition(config) => {
                ("condition", serde_json::to_value(config).unwrap_or_default())
            }
            BlockKind::Action(config) => {
                ("action", serde_json::to_value(config).unwrap_or_default())
            }
        };
        RawBlock {
            id: block.id,
            block_type: block_type.to_string(),
            label: block.label,
            config,
        }
    }
}

fn decode_config<T: DeserializeOwned>(raw: &RawBlock) -> Result<T, BlockDecodeError> {
    serde_json::from_value(raw.config.clone()).map_err(|source| BlockDecodeError::InvalidConfig {
        block_id: raw.id.clone(),
        block_type: raw.block_type.clone(),
        source,
    })
}

/// Delay block config. The three fields are summed to a total in minutes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DelayConfig {
    #[serde(default)]
    pub delay_minutes: i64,
    #[serde(default)]
    pub delay_hours: i64,
    #[serde(default)]
    pub delay_days: i64,
}

impl DelayConfig {
    pub fn total_minutes(&self) -> i64 {
        self.delay_minutes + self.delay_hours * 60 + self.delay_days * 1440
    }
}

/// Condition block config: dotted `field` path into the run variables,
/// compared against `value` with `operator`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionConfig {
    pub field: String,
    #[serde(default)]
    pub operator: ConditionOperator,
    #[serde(default)]
    pub value: JsonValue,
}

/// Comparison operators for condition blocks. Operator names the engine
/// does not know collapse to `Other`, which evaluates to pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConditionOperator {
    #[default]
    Equals,
    NotEquals,
    Contains,
    GreaterThan,
    LessThan,
    Exists,
    NotExists,
    Other,
}

impl ConditionOperator {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "equals" | "eq" => ConditionOperator::Equals,
            "not_equals" | "neq" => ConditionOperator::NotEquals,
            "contains" => ConditionOperator::Contains,
            "greater_than" | "gt" => ConditionOperator::GreaterThan,
            "less_than" | "lt" => ConditionOperator::LessThan,
            "exists" => ConditionOperator::Exists,
            "not_exists" => ConditionOperator::NotExists,
            _ => ConditionOperator::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionOperator::Equals => "equals",
            ConditionOperator::NotEquals => "not_equals",
            ConditionOperator::Contains => "contains",
            ConditionOperator::GreaterThan => "greater_than",
            ConditionOperator::LessThan => "less_than",
            ConditionOperator::Exists => "exists",
            ConditionOperator::NotExists => "not_exists",
            ConditionOperator::Other => "unknown",
        }
    }
}

impl Serialize for ConditionOperator {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ConditionOperator {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(ConditionOperator::parse(&raw))
    }
}

/// Action block config, tagged by the `action` name. One variant per
/// executor, each with its own typed fields. Per-action fields stay
/// optional: a missing recipient or status is an expected runtime failure
/// (`ActionResult { success: false }`), not a decode error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionConfig {
    SendEmail {
        #[serde(default)]
        template: Option<String>,
        #[serde(default)]
        to: Option<String>,
        #[serde(default)]
        subject: Option<String>,
        #[serde(default)]
        body: Option<String>,
    },
    #[serde(alias = "create_notification")]
    SendNotification {
        #[serde(default)]
        user_id: Option<Uuid>,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        body: Option<String>,
        #[serde(default)]
        severity: Option<String>,
    },
    CreateInvoice,
    SendInvoice {
        #[serde(default)]
        invoice_id: Option<Uuid>,
    },
    UpdateJobStatus {
        #[serde(default)]
        job_id: Option<Uuid>,
        #[serde(default)]
        status: Option<String>,
    },
    AssignJob {
        #[serde(default)]
        job_id: Option<Uuid>,
        #[serde(default)]
        assignee_id: Option<Uuid>,
    },
    CreateTask {
        #[serde(default)]
        job_id: Option<Uuid>,
        #[serde(default)]
        title: Option<String>,
    },
    SendWebhook {
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        method: Option<String>,
        #[serde(default)]
        headers: Option<HashMap<String, String>>,
    },
    LogAudit {
        #[serde(default, rename = "audit_action")]
        action: Option<String>,
    },
    UpdateInventory {
        #[serde(default)]
        item_id: Option<Uuid>,
        #[serde(default)]
        quantity_change: i64,
    },
    SendSms {
        #[serde(default)]
        to: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
}

impl ActionConfig {
    pub fn name(&self) -> &'static str {
        match self {
            ActionConfig::SendEmail { .. } => "send_email",
            ActionConfig::SendNotification { .. } => "send_notification",
            ActionConfig::CreateInvoice => "create_invoice",
            ActionConfig::SendInvoice { .. } => "send_invoice",
            ActionConfig::UpdateJobStatus { .. } => "update_job_status",
            ActionConfig::AssignJob { .. } => "assign_job",
            ActionConfig::CreateTask { .. } => "create_task",
            ActionConfig::SendWebhook { .. } => "send_webhook",
            ActionConfig::LogAudit { .. } => "log_audit",
            ActionConfig::UpdateInventory { .. } => "update_inventory",
            ActionConfig::SendSms { .. } => "send_sms",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::AutomationEvent;
    use serde_json::json;

    fn decode_block(value: JsonValue) -> Result<FlowBlock, serde_json::Error> {
        serde_json::from_value(value)
    }

    #[test]
    fn decodes_delay_block() {
        let block = decode_block(json!({
            "id": "b2",
            "type": "delay",
            "label": "Wait a day",
            "config": { "delay_days": 1, "delay_hours": 2 }
        }))
        .unwrap();

        match block.kind {
            BlockKind::Delay(config) => assert_eq!(config.total_minutes(), 1560),
            other => panic!("expected delay, got {}", other.type_name()),
        }
    }

    #[test]
    fn decodes_condition_with_operator_alias() {
        let block = decode_block(json!({
            "id": "b3",
            "type": "condition",
            "config": { "field": "status", "operator": "eq", "value": "done" }
        }))
        .unwrap();

        match block.kind {
            BlockKind::Condition(config) => {
                assert_eq!(config.operator, ConditionOperator::Equals);
                assert_eq!(config.value, json!("done"));
            }
            other => panic!("expected condition, got {}", other.type_name()),
        }
    }

    #[test]
    fn unknown_operator_collapses_to_other() {
        let config: ConditionConfig = serde_json::from_value(json!({
            "field": "status",
            "operator": "matches_regex",
            "value": "x"
        }))
        .unwrap();
        assert_eq!(config.operator, ConditionOperator::Other);
    }

    #[test]
    fn decodes_action_block_with_alias() {
        let block = decode_block(json!({
            "id": "b4",
            "type": "action",
            "config": { "action": "create_notification", "title": "Job done" }
        }))
        .unwrap();

        match block.kind {
            BlockKind::Action(ActionConfig::SendNotification { title, .. }) => {
                assert_eq!(title.as_deref(), Some("Job done"));
            }
            other => panic!("expected notification action, got {}", other.type_name()),
        }
    }

    #[test]
    fn unknown_block_type_fails_decode() {
        let err = decode_block(json!({
            "id": "b9",
            "type": "loop",
            "config": {}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("unknown type"));
    }

    #[test]
    fn unknown_action_name_fails_decode() {
        let err = decode_block(json!({
            "id": "b5",
            "type": "action",
            "config": { "action": "launch_rocket" }
        }))
        .unwrap_err();
        assert!(err.to_string().contains("invalid config"));
    }

    #[test]
    fn trigger_condition_parses_field_and_value() {
        let condition = TriggerCondition::parse("status=done").unwrap();
        assert_eq!(condition.field, "status");
        assert_eq!(condition.value, "done");

        assert!(TriggerCondition::parse("no equals sign").is_err());
        assert!(TriggerCondition::parse("=value").is_err());
    }

    #[test]
    fn flow_matches_on_event_and_payload_condition() {
        let org = Uuid::new_v4();
        let flow = AutomationFlow {
            id: Uuid::new_v4(),
            organization_id: org,
            name: "Notify on done".to_string(),
            status: FlowStatus::Active,
            trigger: TriggerConfig {
                event: "job.status_change".to_string(),
                condition: Some("status=done".to_string()),
            },
            blocks: vec![],
            run_count: 0,
            last_run: None,
        };

        let done = AutomationEvent::job_status_change(org, Uuid::new_v4(), "scheduled", "done", None);
        let pending =
            AutomationEvent::job_status_change(org, Uuid::new_v4(), "scheduled", "pending", None);

        assert!(flow.matches(&done));
        assert!(!flow.matches(&pending));
    }

    #[test]
    fn inactive_flow_never_matches() {
        let org = Uuid::new_v4();
        let mut flow = AutomationFlow {
            id: Uuid::new_v4(),
            organization_id: org,
            name: "Paused".to_string(),
            status: FlowStatus::Paused,
            trigger: TriggerConfig {
                event: "job.completed".to_string(),
                condition: None,
            },
            blocks: vec![],
            run_count: 0,
            last_run: None,
        };

        let event = AutomationEvent::job_completed(org, Uuid::new_v4(), None);
        assert!(!flow.matches(&event));

        flow.status = FlowStatus::Active;
        assert!(flow.matches(&event));
    }
}
