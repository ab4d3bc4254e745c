//! Executor behavior: HTTP boundaries via wiremock, store side effects via
//! the in-memory store.

mod common;

use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use wiremock::matchers::{bearer_token, body_partial_json, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use automation_core::events::EventOpts;
use automation_core::models::{ActionConfig, LogStatus};
use automation_core::{AutomationEvent, Config, EventType, MemoryStore};

use common::*;

fn job_event_with_payload(org: Uuid, job_id: Uuid, payload: serde_json::Value) -> AutomationEvent {
    AutomationEvent::new(
        EventType::JobCompleted,
        org,
        payload.as_object().cloned().unwrap_or_default(),
        EventOpts {
            entity_type: Some("job".to_string()),
            entity_id: Some(job_id),
            ..Default::default()
        },
    )
}

#[tokio::test]
async fn webhook_delivers_structured_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header_exists("X-Fieldline-Flow"))
        .and(body_partial_json(json!({
            "event": "job.completed",
            "flow_name": "Webhook flow",
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let org = Uuid::new_v4();
    let store = Arc::new(MemoryStore::new());
    store.add_flow(flow(
        org,
        "Webhook flow",
        "job.completed",
        vec![
            trigger_block(),
            action_block(
                "b1",
                ActionConfig::SendWebhook {
                    url: Some(format!("{}/hook", server.uri())),
                    method: None,
                    headers: None,
                },
            ),
        ],
    ));
    let engine = engine(&store);

    let summary = engine
        .process_event(&AutomationEvent::job_completed(org, Uuid::new_v4(), None))
        .await;

    assert_eq!(summary.flows_executed, 1);
    assert_eq!(store.logs_with_status(LogStatus::Success).len(), 1);
}

#[tokio::test]
async fn webhook_failure_embeds_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let org = Uuid::new_v4();
    let store = Arc::new(MemoryStore::new());
    store.add_flow(flow(
        org,
        "Webhook flow",
        "job.completed",
        vec![
            trigger_block(),
            action_block(
                "b1",
                ActionConfig::SendWebhook {
                    url: Some(server.uri()),
                    method: None,
                    headers: None,
                },
            ),
        ],
    ));
    let engine = engine(&store);

    engine
        .process_event(&AutomationEvent::job_completed(org, Uuid::new_v4(), None))
        .await;

    let failed = store.logs_with_status(LogStatus::Failed);
    assert_eq!(failed.len(), 1);
    let error = failed[0].error.as_deref().unwrap();
    assert!(error.contains("500"), "error was: {error}");
    assert!(error.contains("upstream exploded"), "error was: {error}");
}

#[tokio::test]
async fn email_sends_through_provider_with_interpolated_recipient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/emails"))
        .and(bearer_token("test-key"))
        .and(body_partial_json(json!({
            "to": "client@acme.test",
            "subject": "Job done for Acme",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "email-1" })))
        .expect(1)
        .mount(&server)
        .await;

    let config = Config {
        resend_api_key: Some("test-key".to_string()),
        email_api_url: format!("{}/emails", server.uri()),
        ..Config::default()
    };

    let org = Uuid::new_v4();
    let store = Arc::new(MemoryStore::new());
    store.add_flow(flow(
        org,
        "Email client",
        "job.completed",
        vec![
            trigger_block(),
            action_block(
                "b1",
                ActionConfig::SendEmail {
                    template: None,
                    to: Some("{{client_email}}".to_string()),
                    subject: Some("Job done for {{client_name}}".to_string()),
                    body: Some("<p>All wrapped up.</p>".to_string()),
                },
            ),
        ],
    ));
    let engine = engine_with_config(&store, &config);

    let event = job_event_with_payload(
        org,
        Uuid::new_v4(),
        json!({ "client_email": "client@acme.test", "client_name": "Acme" }),
    );
    let summary = engine.process_event(&event).await;

    assert_eq!(summary.flows_executed, 1);
    assert!(summary.errors.is_empty());
}

#[tokio::test]
async fn email_fails_closed_without_credentials() {
    let org = Uuid::new_v4();
    let store = Arc::new(MemoryStore::new());
    store.add_flow(flow(
        org,
        "Email client",
        "job.completed",
        vec![
            trigger_block(),
            action_block(
                "b1",
                ActionConfig::SendEmail {
                    template: None,
                    to: Some("someone@acme.test".to_string()),
                    subject: None,
                    body: None,
                },
            ),
        ],
    ));
    // Default config carries no API key.
    let engine = engine(&store);

    engine
        .process_event(&AutomationEvent::job_completed(org, Uuid::new_v4(), None))
        .await;

    let failed = store.logs_with_status(LogStatus::Failed);
    assert_eq!(failed.len(), 1);
    assert!(failed[0]
        .error
        .as_deref()
        .unwrap()
        .contains("not configured"));
}

#[tokio::test]
async fn email_resolves_assignee_address_through_the_store() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "to": "tech@fieldline.app" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let config = Config {
        resend_api_key: Some("test-key".to_string()),
        email_api_url: server.uri(),
        ..Config::default()
    };

    let org = Uuid::new_v4();
    let store = Arc::new(MemoryStore::new());
    let assignee = Uuid::new_v4();
    let mut job = job(org, "Boiler service", 150);
    job.assignee_id = Some(assignee);
    let job_id = job.id;
    store.add_job(job);
    store.add_profile(profile(assignee, Some("tech@fieldline.app"), None));

    store.add_flow(flow(
        org,
        "Email assignee",
        "job.completed",
        vec![
            trigger_block(),
            action_block(
                "b1",
                ActionConfig::SendEmail {
                    template: None,
                    to: Some("{{assignee_email}}".to_string()),
                    subject: Some("Job closed".to_string()),
                    body: None,
                },
            ),
        ],
    ));
    let engine = engine_with_config(&store, &config);

    let summary = engine
        .process_event(&AutomationEvent::job_completed(org, job_id, None))
        .await;

    assert_eq!(summary.flows_executed, 1);
    assert!(summary.errors.is_empty());
}

#[tokio::test]
async fn email_with_no_resolvable_recipient_fails_closed() {
    let org = Uuid::new_v4();
    let store = Arc::new(MemoryStore::new());
    store.add_flow(flow(
        org,
        "Email client",
        "job.completed",
        vec![
            trigger_block(),
            action_block(
                "b1",
                ActionConfig::SendEmail {
                    template: None,
                    to: Some("{{client_email}}".to_string()),
                    subject: None,
                    body: None,
                },
            ),
        ],
    ));
    let engine = engine(&store);

    // Payload has no client_email, so the token never resolves.
    engine
        .process_event(&AutomationEvent::job_completed(org, Uuid::new_v4(), None))
        .await;

    let failed = store.logs_with_status(LogStatus::Failed);
    assert_eq!(failed.len(), 1);
    assert_eq!(
        failed[0].error.as_deref(),
        Some("no email recipient resolved")
    );
}

#[tokio::test]
async fn create_invoice_then_send_invoice_chains_through_variables() {
    let org = Uuid::new_v4();
    let store = Arc::new(MemoryStore::new());
    let job = job(org, "Boiler replacement", 200);
    let job_id = job.id;
    store.add_job(job);

    store.add_flow(flow(
        org,
        "Invoice on completion",
        "job.completed",
        vec![
            trigger_block(),
            action_block("b1", ActionConfig::CreateInvoice),
            action_block("b2", ActionConfig::SendInvoice { invoice_id: None }),
        ],
    ));
    let engine = engine(&store);

    let summary = engine
        .process_event(&AutomationEvent::job_completed(org, job_id, None))
        .await;

    assert_eq!(summary.flows_executed, 1);
    assert!(summary.errors.is_empty());

    let invoices = store.invoices();
    assert_eq!(invoices.len(), 1);
    assert_eq!(invoices[0].number, "INV-0001");
    // Second block found the id in the run variables and marked it sent.
    assert_eq!(invoices[0].status, "sent");
    assert_eq!(invoices[0].subtotal, Decimal::from(200));
    assert_eq!(invoices[0].tax, Decimal::from(20));
    assert_eq!(invoices[0].total, Decimal::from(220));

    let line_items = store.invoice_line_items();
    assert_eq!(line_items.len(), 1);
    assert_eq!(line_items[0].description, "Boiler replacement");

    let kinds: Vec<String> = store
        .invoice_events()
        .into_iter()
        .map(|event| event.kind)
        .collect();
    assert_eq!(kinds, vec!["created", "sent"]);
}

#[tokio::test]
async fn invoice_numbers_continue_the_organization_sequence() {
    let org = Uuid::new_v4();
    let store = Arc::new(MemoryStore::new());
    let job = job(org, "Annual service", 100);
    let job_id = job.id;
    store.add_job(job);

    // Seed the organization's most recent invoice.
    store.add_invoice(automation_core::models::Invoice {
        id: Uuid::new_v4(),
        organization_id: org,
        job_id: None,
        number: "INV-0042".to_string(),
        status: "paid".to_string(),
        subtotal: Decimal::from(50),
        tax: Decimal::from(5),
        total: Decimal::from(55),
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    });

    store.add_flow(flow(
        org,
        "Invoice on completion",
        "job.completed",
        vec![trigger_block(), action_block("b1", ActionConfig::CreateInvoice)],
    ));
    let engine = engine(&store);

    engine
        .process_event(&AutomationEvent::job_completed(org, job_id, None))
        .await;

    let numbers: Vec<String> = store
        .invoices()
        .into_iter()
        .map(|invoice| invoice.number)
        .collect();
    assert!(numbers.contains(&"INV-0043".to_string()), "got {numbers:?}");
}

#[tokio::test]
async fn create_invoice_fails_when_job_is_missing() {
    let org = Uuid::new_v4();
    let store = Arc::new(MemoryStore::new());
    store.add_flow(flow(
        org,
        "Invoice on completion",
        "job.completed",
        vec![trigger_block(), action_block("b1", ActionConfig::CreateInvoice)],
    ));
    let engine = engine(&store);

    engine
        .process_event(&AutomationEvent::job_completed(org, Uuid::new_v4(), None))
        .await;

    let failed = store.logs_with_status(LogStatus::Failed);
    assert_eq!(failed.len(), 1);
    assert!(failed[0].error.as_deref().unwrap().contains("not found"));
    assert!(store.invoices().is_empty());
}

#[tokio::test]
async fn notification_fans_out_to_active_admins_and_owners() {
    let org = Uuid::new_v4();
    let store = Arc::new(MemoryStore::new());
    let admin = member(org, "admin", "active");
    let owner = member(org, "owner", "active");
    let tech = member(org, "tech", "active");
    let invited = member(org, "admin", "invited");
    let admin_id = admin.user_id;
    let owner_id = owner.user_id;
    store.add_member(admin);
    store.add_member(owner);
    store.add_member(tech);
    store.add_member(invited);

    store.add_flow(flow(
        org,
        "Alert the office",
        "inventory.low_stock",
        vec![
            trigger_block(),
            action_block(
                "b1",
                ActionConfig::SendNotification {
                    user_id: None,
                    title: Some("{{item_name}} is low".to_string()),
                    body: Some("Only {{quantity}} left".to_string()),
                    severity: Some("warning".to_string()),
                },
            ),
        ],
    ));
    let engine = engine(&store);

    let event =
        AutomationEvent::inventory_low_stock(org, Uuid::new_v4(), "Copper pipe 15mm", 2, 10);
    let summary = engine.process_event(&event).await;

    assert_eq!(summary.flows_executed, 1);
    let notifications = store.notifications();
    assert_eq!(notifications.len(), 2);
    let recipients: Vec<Uuid> = notifications.iter().map(|n| n.user_id).collect();
    assert!(recipients.contains(&admin_id));
    assert!(recipients.contains(&owner_id));
    assert_eq!(notifications[0].title, "Copper pipe 15mm is low");
    assert_eq!(notifications[0].body, "Only 2 left");
    assert_eq!(notifications[0].severity, "warning");
}

#[tokio::test]
async fn inventory_delta_recomputes_stock_level() {
    let org = Uuid::new_v4();
    let store = Arc::new(MemoryStore::new());
    let item = inventory_item(org, "Copper pipe 15mm", 10, 5);
    let item_id = item.id;
    store.add_inventory_item(item);

    store.add_flow(flow(
        org,
        "Consume stock",
        "job.completed",
        vec![
            trigger_block(),
            action_block(
                "b1",
                ActionConfig::UpdateInventory {
                    item_id: Some(item_id),
                    quantity_change: -8,
                },
            ),
        ],
    ));
    let engine = engine(&store);

    engine
        .process_event(&AutomationEvent::job_completed(org, Uuid::new_v4(), None))
        .await;

    let item = store.inventory_item(item_id).unwrap();
    assert_eq!(item.quantity, 2);
    assert_eq!(item.stock_level, "low");
}

#[tokio::test]
async fn inventory_drained_to_zero_goes_critical() {
    let org = Uuid::new_v4();
    let store = Arc::new(MemoryStore::new());
    let item = inventory_item(org, "PTFE tape", 3, 5);
    let item_id = item.id;
    store.add_inventory_item(item);

    store.add_flow(flow(
        org,
        "Consume stock",
        "job.completed",
        vec![
            trigger_block(),
            action_block(
                "b1",
                ActionConfig::UpdateInventory {
                    item_id: Some(item_id),
                    quantity_change: -3,
                },
            ),
        ],
    ));
    let engine = engine(&store);

    engine
        .process_event(&AutomationEvent::job_completed(org, Uuid::new_v4(), None))
        .await;

    let item = store.inventory_item(item_id).unwrap();
    assert_eq!(item.quantity, 0);
    assert_eq!(item.stock_level, "critical");
}

#[tokio::test]
async fn update_job_status_appends_activity() {
    let org = Uuid::new_v4();
    let store = Arc::new(MemoryStore::new());
    let job = job(org, "Gutter repair", 80);
    let job_id = job.id;
    store.add_job(job);

    store.add_flow(flow(
        org,
        "Archive on completion",
        "job.completed",
        vec![
            trigger_block(),
            action_block(
                "b1",
                ActionConfig::UpdateJobStatus {
                    job_id: None,
                    status: Some("archived".to_string()),
                },
            ),
        ],
    ));
    let engine = engine(&store);

    engine
        .process_event(&AutomationEvent::job_completed(org, job_id, None))
        .await;

    assert_eq!(store.job(job_id).unwrap().status, "archived");
    let activity = store.job_activity();
    assert_eq!(activity.len(), 1);
    assert_eq!(activity[0].kind, "status_change");
    assert!(activity[0].note.contains("archived"));
}

#[tokio::test]
async fn create_task_defaults_to_incomplete() {
    let org = Uuid::new_v4();
    let store = Arc::new(MemoryStore::new());
    let job = job(org, "Install radiators", 400);
    let job_id = job.id;
    store.add_job(job);

    store.add_flow(flow(
        org,
        "Checklist on completion",
        "job.completed",
        vec![
            trigger_block(),
            action_block(
                "b1",
                ActionConfig::CreateTask {
                    job_id: None,
                    title: Some("Collect customer signature".to_string()),
                },
            ),
        ],
    ));
    let engine = engine(&store);

    engine
        .process_event(&AutomationEvent::job_completed(org, job_id, None))
        .await;

    let subtasks = store.job_subtasks();
    assert_eq!(subtasks.len(), 1);
    assert_eq!(subtasks[0].title, "Collect customer signature");
    assert!(!subtasks[0].completed);
}

#[tokio::test]
async fn sms_is_simulated_when_a_phone_resolves() {
    let org = Uuid::new_v4();
    let store = Arc::new(MemoryStore::new());
    store.add_flow(flow(
        org,
        "Text the client",
        "job.completed",
        vec![
            trigger_block(),
            action_block(
                "b1",
                ActionConfig::SendSms {
                    to: None,
                    message: Some("Hi {{client_name}}, your job is done".to_string()),
                },
            ),
        ],
    ));
    let engine = engine(&store);

    let event = job_event_with_payload(
        org,
        Uuid::new_v4(),
        json!({ "client_phone": "+15551230000", "client_name": "Ana" }),
    );
    let summary = engine.process_event(&event).await;

    assert_eq!(summary.flows_executed, 1);
    let logs = store.logs_with_status(LogStatus::Success);
    assert_eq!(logs.len(), 1);
    assert!(trace_lines(&logs[0].result)
        .iter()
        .any(|line| line.contains("SMS to +15551230000")));
}

#[tokio::test]
async fn sms_fails_without_a_phone_number() {
    let org = Uuid::new_v4();
    let store = Arc::new(MemoryStore::new());
    store.add_flow(flow(
        org,
        "Text the client",
        "job.completed",
        vec![
            trigger_block(),
            action_block(
                "b1",
                ActionConfig::SendSms {
                    to: None,
                    message: Some("hello".to_string()),
                },
            ),
        ],
    ));
    let engine = engine(&store);

    engine
        .process_event(&AutomationEvent::job_completed(org, Uuid::new_v4(), None))
        .await;

    let failed = store.logs_with_status(LogStatus::Failed);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].error.as_deref(), Some("no phone number resolved"));
}

#[tokio::test]
async fn audit_entry_captures_event_and_flow() {
    let org = Uuid::new_v4();
    let store = Arc::new(MemoryStore::new());
    store.add_flow(flow(
        org,
        "Audit trail",
        "invoice.paid",
        vec![
            trigger_block(),
            action_block(
                "b1",
                ActionConfig::LogAudit {
                    action: Some("invoice.paid.automation".to_string()),
                },
            ),
        ],
    ));
    let engine = engine(&store);

    let event = AutomationEvent::invoice_paid(org, Uuid::new_v4(), "220.00");
    engine.process_event(&event).await;

    let entries = store.audit_entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, "invoice.paid.automation");
    assert_eq!(entries[0].entity_type.as_deref(), Some("invoice"));
    assert_eq!(entries[0].details["flow"], "Audit trail");
    assert_eq!(entries[0].details["event"], "invoice.paid");
}
