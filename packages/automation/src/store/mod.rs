//! Store boundary for the automation engine.
//!
//! Everything the engine and its executors persist goes through the
//! `AutomationStore` trait, injected as `Arc<dyn AutomationStore>` at
//! construction. Callers decide the credential scope of the client they
//! hand in; the engine holds no global state of its own.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    AutomationFlow, AutomationLog, InventoryItem, Invoice, Job, NewAuditEntry, NewAutomationLog,
    NewInvoice, NewInvoiceEvent, NewInvoiceLineItem, NewJobActivity, NewJobSubtask,
    NewNotification, OrgMember, Profile,
};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

#[async_trait]
pub trait AutomationStore: Send + Sync {
    // =========================================================================
    // Flows & logs
    // =========================================================================

    /// All `active` flows for an organization, blocks decoded. Rows whose
    /// blocks fail to decode are skipped with a warning.
    async fn list_active_flows(&self, organization_id: Uuid) -> Result<Vec<AutomationFlow>>;

    /// Load one flow by id (resume path).
    async fn find_flow(&self, flow_id: Uuid) -> Result<Option<AutomationFlow>>;

    /// Atomically bump `run_count` and stamp `last_run`.
    async fn record_flow_run(&self, flow_id: Uuid) -> Result<()>;

    /// Append one execution log row.
    async fn insert_log(&self, log: NewAutomationLog) -> Result<AutomationLog>;

    /// Claim up to `limit` `scheduled` rows whose `execute_at` has passed,
    /// marking each `resumed_at` so no other sweep picks it up again.
    async fn claim_due_continuations(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<AutomationLog>>;

    // =========================================================================
    // Jobs
    // =========================================================================

    async fn find_job(&self, job_id: Uuid) -> Result<Option<Job>>;
    async fn update_job_status(&self, job_id: Uuid, status: &str) -> Result<()>;
    async fn update_job_assignee(&self, job_id: Uuid, assignee_id: Option<Uuid>) -> Result<()>;
    async fn insert_job_activity(&self, activity: NewJobActivity) -> Result<()>;
    async fn insert_job_subtask(&self, subtask: NewJobSubtask) -> Result<()>;

    // =========================================================================
    // Invoices
    // =========================================================================

    /// Display number of the organization's most recent invoice, if any.
    async fn latest_invoice_number(&self, organization_id: Uuid) -> Result<Option<String>>;
    async fn insert_invoice(&self, invoice: NewInvoice) -> Result<Invoice>;
    async fn insert_invoice_line_item(&self, item: NewInvoiceLineItem) -> Result<()>;
    async fn insert_invoice_event(&self, event: NewInvoiceEvent) -> Result<()>;
    async fn find_invoice(&self, invoice_id: Uuid) -> Result<Option<Invoice>>;
    async fn mark_invoice_sent(&self, invoice_id: Uuid) -> Result<()>;

    // =========================================================================
    // People & notifications
    // =========================================================================

    async fn insert_notification(&self, notification: NewNotification) -> Result<()>;
    async fn list_admin_members(&self, organization_id: Uuid) -> Result<Vec<OrgMember>>;
    async fn find_profile(&self, user_id: Uuid) -> Result<Option<Profile>>;

    // =========================================================================
    // Inventory & audit
    // =========================================================================

    async fn find_inventory_item(&self, item_id: Uuid) -> Result<Option<InventoryItem>>;
    async fn update_inventory_level(
        &self,
        item_id: Uuid,
        quantity: i64,
        stock_level: &str,
    ) -> Result<()>;
    async fn insert_audit_entry(&self, entry: NewAuditEntry) -> Result<()>;
}
