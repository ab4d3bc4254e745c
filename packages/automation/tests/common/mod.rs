//! Shared builders for the automation engine tests.

#![allow(dead_code)]

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use uuid::Uuid;

use automation_core::models::{
    ActionConfig, AutomationFlow, BlockKind, ConditionConfig, ConditionOperator, DelayConfig,
    FlowBlock, FlowStatus, InventoryItem, Job, OrgMember, Profile, TriggerConfig,
};
use automation_core::{Config, FlowEngine, MemoryStore};

pub fn engine(store: &Arc<MemoryStore>) -> FlowEngine {
    FlowEngine::new(store.clone(), &Config::default())
}

pub fn engine_with_config(store: &Arc<MemoryStore>, config: &Config) -> FlowEngine {
    FlowEngine::new(store.clone(), config)
}

pub fn flow(org: Uuid, name: &str, event: &str, blocks: Vec<FlowBlock>) -> AutomationFlow {
    AutomationFlow {
        id: Uuid::new_v4(),
        organization_id: org,
        name: name.to_string(),
        status: FlowStatus::Active,
        trigger: TriggerConfig {
            event: event.to_string(),
            condition: None,
        },
        blocks,
        run_count: 0,
        last_run: None,
    }
}

pub fn flow_with_condition(
    org: Uuid,
    name: &str,
    event: &str,
    condition: &str,
    blocks: Vec<FlowBlock>,
) -> AutomationFlow {
    let mut flow = flow(org, name, event, blocks);
    flow.trigger.condition = Some(condition.to_string());
    flow
}

pub fn trigger_block() -> FlowBlock {
    FlowBlock {
        id: "trigger".to_string(),
        label: "Trigger".to_string(),
        kind: BlockKind::Trigger,
    }
}

pub fn action_block(id: &str, config: ActionConfig) -> FlowBlock {
    FlowBlock {
        id: id.to_string(),
        label: String::new(),
        kind: BlockKind::Action(config),
    }
}

pub fn condition_block(
    id: &str,
    field: &str,
    operator: ConditionOperator,
    value: JsonValue,
) -> FlowBlock {
    FlowBlock {
        id: id.to_string(),
        label: String::new(),
        kind: BlockKind::Condition(ConditionConfig {
            field: field.to_string(),
            operator,
            value,
        }),
    }
}

pub fn delay_block(id: &str, minutes: i64) -> FlowBlock {
    FlowBlock {
        id: id.to_string(),
        label: String::new(),
        kind: BlockKind::Delay(DelayConfig {
            delay_minutes: minutes,
            ..Default::default()
        }),
    }
}

pub fn audit_action(id: &str) -> FlowBlock {
    action_block(id, ActionConfig::LogAudit { action: None })
}

pub fn job(org: Uuid, title: &str, revenue: i64) -> Job {
    Job {
        id: Uuid::new_v4(),
        organization_id: org,
        title: title.to_string(),
        status: "scheduled".to_string(),
        client_id: None,
        assignee_id: None,
        revenue: Decimal::from(revenue),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn member(org: Uuid, role: &str, status: &str) -> OrgMember {
    OrgMember {
        organization_id: org,
        user_id: Uuid::new_v4(),
        role: role.to_string(),
        status: status.to_string(),
    }
}

pub fn profile(id: Uuid, email: Option<&str>, phone: Option<&str>) -> Profile {
    Profile {
        id,
        full_name: Some("Test User".to_string()),
        email: email.map(str::to_string),
        phone: phone.map(str::to_string),
    }
}

pub fn inventory_item(org: Uuid, name: &str, quantity: i64, min_quantity: i64) -> InventoryItem {
    InventoryItem {
        id: Uuid::new_v4(),
        organization_id: org,
        name: name.to_string(),
        quantity,
        min_quantity,
        stock_level: InventoryItem::derived_stock_level(quantity, min_quantity).to_string(),
    }
}

/// Trace lines stored in a log row's `result` column.
pub fn trace_lines(result: &Option<JsonValue>) -> Vec<String> {
    result
        .as_ref()
        .and_then(|value| value.get("logs"))
        .and_then(|logs| logs.as_array())
        .map(|lines| {
            lines
                .iter()
                .filter_map(|line| line.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
