//! `send_notification` executor: in-app notification rows, with admin/owner
//! fan-out when no explicit recipient is configured.

use serde_json::json;
use uuid::Uuid;

use crate::engine::ExecutionContext;
use crate::models::NewNotification;
use crate::store::AutomationStore;
use crate::template;

use super::ActionResult;

pub(crate) async fn send_notification(
    store: &dyn AutomationStore,
    ctx: &mut ExecutionContext,
    user_id: Option<Uuid>,
    title: Option<&str>,
    body: Option<&str>,
    severity: Option<&str>,
) -> ActionResult {
    let Some(title) = title else {
        return ActionResult::fail("send_notification requires a title");
    };

    let title = template::render(title, &ctx.variables);
    let body = template::render(body.unwrap_or_default(), &ctx.variables);
    let severity = severity.unwrap_or("info").to_string();

    let recipients: Vec<Uuid> = match user_id {
        Some(id) => vec![id],
        None => match store.list_admin_members(ctx.event.organization_id).await {
            Ok(members) => members.into_iter().map(|member| member.user_id).collect(),
            Err(err) => {
                return ActionResult::fail(format!("failed to load organization admins: {err:#}"))
            }
        },
    };

    for recipient in &recipients {
        let notification = NewNotification {
            organization_id: ctx.event.organization_id,
            user_id: *recipient,
            title: title.clone(),
            body: body.clone(),
            severity: severity.clone(),
        };
        if let Err(err) = store.insert_notification(notification).await {
            return ActionResult::fail(format!("failed to insert notification: {err:#}"));
        }
    }

    ctx.log(format!("Notified {} recipient(s)", recipients.len()));
    ActionResult::ok_with(json!({ "notified_count": recipients.len() }))
}
