//! Action executors: the side-effecting half of the engine.
//!
//! Each executor performs one external effect and reports through a uniform
//! `ActionResult`. Expected failure modes (missing config, entities that
//! don't exist, upstream rejections) are returned as `success: false`, never
//! panicked; only genuinely unexpected faults propagate as errors from the
//! store or HTTP layers and are converted here as well.

mod audit;
mod email;
mod inventory;
mod invoice;
mod job;
mod notification;
mod sms;
mod webhook;

pub use email::EmailClient;

use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::engine::ExecutionContext;
use crate::models::ActionConfig;
use crate::store::AutomationStore;

/// Uniform executor return value. `output` is shallow-merged into the run
/// variables so later blocks can reference it.
#[derive(Debug, Clone, Default)]
pub struct ActionResult {
    pub success: bool,
    pub error: Option<String>,
    pub output: Option<Map<String, JsonValue>>,
}

impl ActionResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            output: None,
        }
    }

    /// Success carrying output variables. Accepts a `json!({...})` object.
    pub fn ok_with(output: JsonValue) -> Self {
        Self {
            success: true,
            error: None,
            output: output.as_object().cloned(),
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            output: None,
        }
    }
}

/// Owns the effect clients and dispatches a typed action config to its
/// executor.
pub struct Actions {
    store: Arc<dyn AutomationStore>,
    email: EmailClient,
    http: reqwest::Client,
}

impl Actions {
    pub fn new(store: Arc<dyn AutomationStore>, config: &Config) -> Self {
        let http = reqwest::Client::new();
        Self {
            email: EmailClient::new(config, http.clone()),
            store,
            http,
        }
    }

    pub async fn execute(&self, config: &ActionConfig, ctx: &mut ExecutionContext) -> ActionResult {
        match config {
            ActionConfig::SendEmail {
                template,
                to,
                subject,
                body,
            } => {
                email::send_email(
                    self.store.as_ref(),
                    &self.email,
                    ctx,
                    template.as_deref(),
                    to.as_deref(),
                    subject.as_deref(),
                    body.as_deref(),
                )
                .await
            }
            ActionConfig::SendNotification {
                user_id,
                title,
                body,
                severity,
            } => {
                notification::send_notification(
                    self.store.as_ref(),
                    ctx,
                    *user_id,
                    title.as_deref(),
                    body.as_deref(),
                    severity.as_deref(),
                )
                .await
            }
            ActionConfig::CreateInvoice => invoice::create_invoice(self.store.as_ref(), ctx).await,
            ActionConfig::SendInvoice { invoice_id } => {
                invoice::send_invoice(self.store.as_ref(), ctx, *invoice_id).await
            }
            ActionConfig::UpdateJobStatus { job_id, status } => {
                job::update_job_status(self.store.as_ref(), ctx, *job_id, status.as_deref()).await
            }
            ActionConfig::AssignJob {
                job_id,
                assignee_id,
            } => job::assign_job(self.store.as_ref(), ctx, *job_id, *assignee_id).await,
            ActionConfig::CreateTask { job_id, title } => {
                job::create_task(self.store.as_ref(), ctx, *job_id, title.as_deref()).await
            }
            ActionConfig::SendWebhook {
                url,
                method,
                headers,
            } => {
                webhook::send_webhook(
                    &self.http,
                    ctx,
                    url.as_deref(),
                    method.as_deref(),
                    headers.as_ref(),
                )
                .await
            }
            ActionConfig::LogAudit { action } => {
                audit::log_audit(self.store.as_ref(), ctx, action.as_deref()).await
            }
            ActionConfig::UpdateInventory {
                item_id,
                quantity_change,
            } => {
                inventory::update_inventory(self.store.as_ref(), ctx, *item_id, *quantity_change)
                    .await
            }
            ActionConfig::SendSms { to, message } => {
                sms::send_sms(ctx, to.as_deref(), message.as_deref()).await
            }
        }
    }
}

/// Job id for job-scoped actions: the triggering event's entity when it is a
/// job, else a `job_id` variable from the payload or a prior block output.
pub(crate) fn event_job_id(ctx: &ExecutionContext) -> Option<Uuid> {
    if ctx.event.entity_type.as_deref() == Some("job") {
        if let Some(id) = ctx.event.entity_id {
            return Some(id);
        }
    }
    variables_uuid(ctx, "job_id")
}

/// Parse a UUID out of the run variables, tolerating both string and
/// already-typed values.
pub(crate) fn variables_uuid(ctx: &ExecutionContext, key: &str) -> Option<Uuid> {
    ctx.variables
        .get(key)
        .and_then(|value| serde_json::from_value::<Uuid>(value.clone()).ok())
}
