//! In-memory `AutomationStore` for tests and local development.
//!
//! Every write is recorded so tests can assert on executor side effects;
//! `fail_flow_listing` simulates an unreachable store for the dispatcher's
//! never-throws contract.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::models::{
    AutomationFlow, AutomationLog, InventoryItem, Invoice, Job, LogStatus, NewAuditEntry,
    NewAutomationLog, NewInvoice, NewInvoiceEvent, NewInvoiceLineItem, NewJobActivity,
    NewJobSubtask, NewNotification, OrgMember, Profile,
};

use super::AutomationStore;

#[derive(Default)]
struct State {
    flows: Vec<AutomationFlow>,
    logs: Vec<AutomationLog>,
    jobs: HashMap<Uuid, Job>,
    invoices: Vec<Invoice>,
    invoice_line_items: Vec<NewInvoiceLineItem>,
    invoice_events: Vec<NewInvoiceEvent>,
    notifications: Vec<NewNotification>,
    members: Vec<OrgMember>,
    profiles: HashMap<Uuid, Profile>,
    inventory: HashMap<Uuid, InventoryItem>,
    audit_entries: Vec<NewAuditEntry>,
    job_activity: Vec<NewJobActivity>,
    job_subtasks: Vec<NewJobSubtask>,
    fail_flow_listing: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Seeding
    // =========================================================================

    pub fn add_flow(&self, flow: AutomationFlow) {
        self.state.lock().unwrap().flows.push(flow);
    }

    pub fn add_job(&self, job: Job) {
        self.state.lock().unwrap().jobs.insert(job.id, job);
    }

    pub fn add_member(&self, member: OrgMember) {
        self.state.lock().unwrap().members.push(member);
    }

    pub fn add_profile(&self, profile: Profile) {
        self.state.lock().unwrap().profiles.insert(profile.id, profile);
    }

    pub fn add_inventory_item(&self, item: InventoryItem) {
        self.state.lock().unwrap().inventory.insert(item.id, item);
    }

    pub fn add_invoice(&self, invoice: Invoice) {
        self.state.lock().unwrap().invoices.push(invoice);
    }

    /// Make `list_active_flows` fail, simulating an unreachable store.
    pub fn fail_flow_listing(&self, fail: bool) {
        self.state.lock().unwrap().fail_flow_listing = fail;
    }

    // =========================================================================
    // Assertion accessors
    // =========================================================================

    pub fn logs(&self) -> Vec<AutomationLog> {
        self.state.lock().unwrap().logs.clone()
    }

    pub fn logs_with_status(&self, status: LogStatus) -> Vec<AutomationLog> {
        self.logs()
            .into_iter()
            .filter(|log| log.status == status)
            .collect()
    }

    pub fn run_count(&self, flow_id: Uuid) -> i64 {
        self.state
            .lock()
            .unwrap()
            .flows
            .iter()
            .find(|flow| flow.id == flow_id)
            .map(|flow| flow.run_count)
            .unwrap_or(0)
    }

    pub fn job(&self, job_id: Uuid) -> Option<Job> {
        self.state.lock().unwrap().jobs.get(&job_id).cloned()
    }

    pub fn invoices(&self) -> Vec<Invoice> {
        self.state.lock().unwrap().invoices.clone()
    }

    pub fn invoice_line_items(&self) -> Vec<NewInvoiceLineItem> {
        self.state.lock().unwrap().invoice_line_items.clone()
    }

    pub fn invoice_events(&self) -> Vec<NewInvoiceEvent> {
        self.state.lock().unwrap().invoice_events.clone()
    }

    pub fn notifications(&self) -> Vec<NewNotification> {
        self.state.lock().unwrap().notifications.clone()
    }

    pub fn audit_entries(&self) -> Vec<NewAuditEntry> {
        self.state.lock().unwrap().audit_entries.clone()
    }

    pub fn job_activity(&self) -> Vec<NewJobActivity> {
        self.state.lock().unwrap().job_activity.clone()
    }

    pub fn job_subtasks(&self) -> Vec<NewJobSubtask> {
        self.state.lock().unwrap().job_subtasks.clone()
    }

    pub fn inventory_item(&self, item_id: Uuid) -> Option<InventoryItem> {
        self.state.lock().unwrap().inventory.get(&item_id).cloned()
    }
}

#[async_trait]
impl AutomationStore for MemoryStore {
    async fn list_active_flows(&self, organization_id: Uuid) -> Result<Vec<AutomationFlow>> {
        let state = self.state.lock().unwrap();
        if state.fail_flow_listing {
            bail!("store unreachable");
        }
        Ok(state
            .flows
            .iter()
            .filter(|flow| {
                flow.organization_id == organization_id
                    && flow.status == crate::models::FlowStatus::Active
            })
            .cloned()
            .collect())
    }

    async fn find_flow(&self, flow_id: Uuid) -> Result<Option<AutomationFlow>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .flows
            .iter()
            .find(|flow| flow.id == flow_id)
            .cloned())
    }

    async fn record_flow_run(&self, flow_id: Uuid) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(flow) = state.flows.iter_mut().find(|flow| flow.id == flow_id) {
            flow.run_count += 1;
            flow.last_run = Some(Utc::now());
        }
        Ok(())
    }

    async fn insert_log(&self, log: NewAutomationLog) -> Result<AutomationLog> {
        let row = AutomationLog {
            id: Uuid::new_v4(),
            flow_id: log.flow_id,
            organization_id: log.organization_id,
            status: log.status,
            trigger_data: log.trigger_data,
            result: log.result,
            error: log.error,
            started_at: log.started_at,
            completed_at: log.completed_at,
            resumed_at: None,
        };
        self.state.lock().unwrap().logs.push(row.clone());
        Ok(row)
    }

    async fn claim_due_continuations(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<AutomationLog>> {
        let mut state = self.state.lock().unwrap();
        let mut claimed = Vec::new();
        for log in state.logs.iter_mut() {
            if claimed.len() as i64 >= limit {
                break;
            }
            if log.status != LogStatus::Scheduled || log.resumed_at.is_some() {
                continue;
            }
            let due = log
                .trigger_data
                .get("execute_at")
                .and_then(|value| {
                    serde_json::from_value::<DateTime<Utc>>(value.clone()).ok()
                })
                .map(|execute_at| execute_at <= now)
                .unwrap_or(false);
            if due {
                log.resumed_at = Some(now);
                claimed.push(log.clone());
            }
        }
        Ok(claimed)
    }

    async fn find_job(&self, job_id: Uuid) -> Result<Option<Job>> {
        Ok(self.state.lock().unwrap().jobs.get(&job_id).cloned())
    }

    async fn update_job_status(&self, job_id: Uuid, status: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(job) = state.jobs.get_mut(&job_id) {
            job.status = status.to_string();
            job.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn update_job_assignee(&self, job_id: Uuid, assignee_id: Option<Uuid>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(job) = state.jobs.get_mut(&job_id) {
            job.assignee_id = assignee_id;
            job.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn insert_job_activity(&self, activity: NewJobActivity) -> Result<()> {
        self.state.lock().unwrap().job_activity.push(activity);
        Ok(())
    }

    async fn insert_job_subtask(&self, subtask: NewJobSubtask) -> Result<()> {
        self.state.lock().unwrap().job_subtasks.push(subtask);
        Ok(())
    }

    async fn latest_invoice_number(&self, organization_id: Uuid) -> Result<Option<String>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .invoices
            .iter()
            .filter(|invoice| invoice.organization_id == organization_id)
            .max_by_key(|invoice| invoice.created_at)
            .map(|invoice| invoice.number.clone()))
    }

    async fn insert_invoice(&self, invoice: NewInvoice) -> Result<Invoice> {
        let now = Utc::now();
        let row = Invoice {
            id: Uuid::new_v4(),
            organization_id: invoice.organization_id,
            job_id: invoice.job_id,
            number: invoice.number,
            status: invoice.status,
            subtotal: invoice.subtotal,
            tax: invoice.tax,
            total: invoice.total,
            created_at: now,
            updated_at: now,
        };
        self.state.lock().unwrap().invoices.push(row.clone());
        Ok(row)
    }

    async fn insert_invoice_line_item(&self, item: NewInvoiceLineItem) -> Result<()> {
        self.state.lock().unwrap().invoice_line_items.push(item);
        Ok(())
    }

    async fn insert_invoice_event(&self, event: NewInvoiceEvent) -> Result<()> {
        self.state.lock().unwrap().invoice_events.push(event);
        Ok(())
    }

    async fn find_invoice(&self, invoice_id: Uuid) -> Result<Option<Invoice>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .invoices
            .iter()
            .find(|invoice| invoice.id == invoice_id)
            .cloned())
    }

    async fn mark_invoice_sent(&self, invoice_id: Uuid) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(invoice) = state.invoices.iter_mut().find(|inv| inv.id == invoice_id) {
            invoice.status = "sent".to_string();
            invoice.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn insert_notification(&self, notification: NewNotification) -> Result<()> {
        self.state.lock().unwrap().notifications.push(notification);
        Ok(())
    }

    async fn list_admin_members(&self, organization_id: Uuid) -> Result<Vec<OrgMember>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .members
            .iter()
            .filter(|member| {
                member.organization_id == organization_id && member.is_notifiable_admin()
            })
            .cloned()
            .collect())
    }

    async fn find_profile(&self, user_id: Uuid) -> Result<Option<Profile>> {
        Ok(self.state.lock().unwrap().profiles.get(&user_id).cloned())
    }

    async fn find_inventory_item(&self, item_id: Uuid) -> Result<Option<InventoryItem>> {
        Ok(self.state.lock().unwrap().inventory.get(&item_id).cloned())
    }

    async fn update_inventory_level(
        &self,
        item_id: Uuid,
        quantity: i64,
        stock_level: &str,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(item) = state.inventory.get_mut(&item_id) {
            item.quantity = quantity;
            item.stock_level = stock_level.to_string();
        }
        Ok(())
    }

    async fn insert_audit_entry(&self, entry: NewAuditEntry) -> Result<()> {
        self.state.lock().unwrap().audit_entries.push(entry);
        Ok(())
    }
}
