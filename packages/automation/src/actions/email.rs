//! `send_email` executor and its provider client.
//!
//! The provider boundary is a Resend-style HTTP API: bearer-token auth, JSON
//! body `{from, to, subject, html}`. A missing API key fails this action
//! only, never the engine.

use anyhow::{bail, Result};
use serde_json::json;
use tracing::info;

use crate::config::Config;
use crate::engine::ExecutionContext;
use crate::store::AutomationStore;
use crate::template;

use super::{event_job_id, ActionResult};

#[derive(Clone)]
pub struct EmailClient {
    client: reqwest::Client,
    api_key: Option<String>,
    from: String,
    api_url: String,
}

impl EmailClient {
    pub fn new(config: &Config, client: reqwest::Client) -> Self {
        Self {
            client,
            api_key: config.resend_api_key.clone(),
            from: config.email_from.clone(),
            api_url: config.email_api_url.clone(),
        }
    }

    pub async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()> {
        let Some(api_key) = &self.api_key else {
            bail!("email provider is not configured (RESEND_API_KEY missing)");
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(&json!({
                "from": self.from,
                "to": to,
                "subject": subject,
                "html": html,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("email provider returned {status}: {body}");
        }

        info!(%to, "automation email sent");
        Ok(())
    }
}

pub(crate) async fn send_email(
    store: &dyn AutomationStore,
    email: &EmailClient,
    ctx: &mut ExecutionContext,
    template_name: Option<&str>,
    to: Option<&str>,
    subject: Option<&str>,
    body: Option<&str>,
) -> ActionResult {
    let Some(to) = to else {
        return ActionResult::fail("send_email requires a `to` recipient");
    };

    // {{client_email}} and friends resolve from the run variables; the
    // assignee's address needs a profile lookup through the store.
    let mut recipient = template::render(to, &ctx.variables);
    if recipient.contains("{{assignee_email}}") {
        match resolve_assignee_email(store, ctx).await {
            Ok(Some(address)) => {
                recipient = recipient.replace("{{assignee_email}}", &address);
            }
            Ok(None) => {}
            Err(err) => return ActionResult::fail(format!("assignee lookup failed: {err:#}")),
        }
    }

    let recipient = recipient.trim().to_string();
    if recipient.is_empty() || recipient.contains("{{") {
        return ActionResult::fail("no email recipient resolved");
    }

    if let Some(name) = template_name {
        ctx.log(format!("Using email template `{name}`"));
    }
    let subject = template::render(subject.unwrap_or("Update from Fieldline"), &ctx.variables);
    let html = template::render(body.unwrap_or_default(), &ctx.variables);

    match email.send(&recipient, &subject, &html).await {
        Ok(()) => {
            ctx.log(format!("Email sent to {recipient}"));
            ActionResult::ok_with(json!({ "email_to": recipient }))
        }
        Err(err) => ActionResult::fail(format!("{err:#}")),
    }
}

async fn resolve_assignee_email(
    store: &dyn AutomationStore,
    ctx: &ExecutionContext,
) -> Result<Option<String>> {
    let Some(job_id) = event_job_id(ctx) else {
        return Ok(None);
    };
    let Some(job) = store.find_job(job_id).await? else {
        return Ok(None);
    };
    let Some(assignee_id) = job.assignee_id else {
        return Ok(None);
    };
    Ok(store
        .find_profile(assignee_id)
        .await?
        .and_then(|profile| profile.email))
}
