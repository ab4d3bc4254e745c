//! `send_sms` executor.
//!
//! No SMS transport is wired yet: the executor resolves a recipient and
//! interpolates the message, then reports a simulated delivery. It fails
//! only when no phone number resolves, keeping flow semantics stable for
//! when a real provider lands.

use serde_json::json;
use tracing::info;

use crate::engine::ExecutionContext;
use crate::template;

use super::ActionResult;

pub(crate) async fn send_sms(
    ctx: &mut ExecutionContext,
    to: Option<&str>,
    message: Option<&str>,
) -> ActionResult {
    let configured = to
        .map(|raw| template::render(raw, &ctx.variables))
        .filter(|rendered| !rendered.trim().is_empty() && !rendered.contains("{{"));

    let recipient = configured.or_else(|| {
        ctx.variables
            .get("client_phone")
            .and_then(|value| value.as_str())
            .map(str::to_string)
    });

    let Some(recipient) = recipient else {
        return ActionResult::fail("no phone number resolved");
    };

    let message = template::render(message.unwrap_or_default(), &ctx.variables);

    info!(to = %recipient, "SMS delivery simulated (no provider configured)");
    ctx.log(format!("SMS to {recipient} simulated: {message}"));
    ActionResult::ok_with(json!({ "sms_to": recipient }))
}
