//! `send_webhook` executor: delivers a structured event envelope to a
//! caller-supplied URL.

use reqwest::Method;
use serde_json::json;
use std::collections::HashMap;

use crate::engine::ExecutionContext;

use super::ActionResult;

/// Header identifying which flow produced a delivery.
pub const FLOW_HEADER: &str = "X-Fieldline-Flow";

pub(crate) async fn send_webhook(
    http: &reqwest::Client,
    ctx: &mut ExecutionContext,
    url: Option<&str>,
    method: Option<&str>,
    headers: Option<&HashMap<String, String>>,
) -> ActionResult {
    let Some(url) = url else {
        return ActionResult::fail("send_webhook requires a url");
    };

    let method = method
        .and_then(|name| Method::from_bytes(name.to_uppercase().as_bytes()).ok())
        .unwrap_or(Method::POST);

    let envelope = json!({
        "event": ctx.event.event_type.as_str(),
        "entity_type": ctx.event.entity_type,
        "entity_id": ctx.event.entity_id,
        "organization_id": ctx.event.organization_id,
        "payload": ctx.event.payload,
        "flow_name": ctx.flow.name,
        "timestamp": ctx.event.timestamp,
    });

    let mut request = http
        .request(method.clone(), url)
        .header(FLOW_HEADER, ctx.flow.id.to_string())
        .json(&envelope);
    if let Some(headers) = headers {
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
    }

    match request.send().await {
        Ok(response) => {
            let status = response.status();
            if status.is_success() {
                ctx.log(format!("Webhook {method} {url} returned {status}"));
                ActionResult::ok_with(json!({ "webhook_status": status.as_u16() }))
            } else {
                let body = response.text().await.unwrap_or_default();
                ActionResult::fail(format!("webhook returned {status}: {body}"))
            }
        }
        Err(err) => ActionResult::fail(format!("webhook request failed: {err}")),
    }
}
