//! `log_audit` executor: records that an automation acted on the
//! organization.

use serde_json::json;

use crate::engine::ExecutionContext;
use crate::models::NewAuditEntry;
use crate::store::AutomationStore;

use super::ActionResult;

pub(crate) async fn log_audit(
    store: &dyn AutomationStore,
    ctx: &mut ExecutionContext,
    action: Option<&str>,
) -> ActionResult {
    let action = action
        .map(str::to_string)
        .unwrap_or_else(|| format!("automation.{}", ctx.event.event_type));

    let entry = NewAuditEntry {
        organization_id: ctx.event.organization_id,
        user_id: ctx.event.user_id,
        action: action.clone(),
        entity_type: ctx.event.entity_type.clone(),
        entity_id: ctx.event.entity_id,
        details: json!({
            "event": ctx.event.event_type.as_str(),
            "flow": ctx.flow.name,
            "payload": ctx.event.payload,
        }),
    };

    if let Err(err) = store.insert_audit_entry(entry).await {
        return ActionResult::fail(format!("failed to insert audit entry: {err:#}"));
    }

    ctx.log(format!("Audit entry `{action}` recorded"));
    ActionResult::ok()
}
