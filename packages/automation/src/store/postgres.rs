//! PostgreSQL-backed `AutomationStore` built on sqlx.
//!
//! Flow and log rows carry JSONB columns (`trigger_config`, `blocks`,
//! `trigger_data`, `result`) decoded into typed models here, at the store
//! boundary.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::models::{
    AutomationFlow, AutomationLog, FlowBlock, FlowStatus, InventoryItem, Invoice, Job, LogStatus,
    NewAuditEntry, NewAutomationLog, NewInvoice, NewInvoiceEvent, NewInvoiceLineItem,
    NewJobActivity, NewJobSubtask, NewNotification, OrgMember, Profile, TriggerConfig,
};

use super::AutomationStore;

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct FlowRow {
    id: Uuid,
    organization_id: Uuid,
    name: String,
    status: String,
    trigger_config: JsonValue,
    blocks: JsonValue,
    run_count: i64,
    last_run: Option<DateTime<Utc>>,
}

impl FlowRow {
    fn decode(self) -> Result<AutomationFlow> {
        let status = FlowStatus::parse(&self.status)
            .with_context(|| format!("flow {} has unknown status `{}`", self.id, self.status))?;
        let trigger: TriggerConfig = serde_json::from_value(self.trigger_config)
            .with_context(|| format!("flow {} has invalid trigger config", self.id))?;
        let blocks: Vec<FlowBlock> = serde_json::from_value(self.blocks)
            .with_context(|| format!("flow {} has invalid blocks", self.id))?;

        Ok(AutomationFlow {
            id: self.id,
            organization_id: self.organization_id,
            name: self.name,
            status,
            trigger,
            blocks,
            run_count: self.run_count,
            last_run: self.last_run,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LogRow {
    id: Uuid,
    flow_id: Uuid,
    organization_id: Uuid,
    status: String,
    trigger_data: JsonValue,
    result: Option<JsonValue>,
    error: Option<String>,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    resumed_at: Option<DateTime<Utc>>,
}

impl LogRow {
    fn decode(self) -> Result<AutomationLog> {
        let status = LogStatus::parse(&self.status)
            .with_context(|| format!("log {} has unknown status `{}`", self.id, self.status))?;
        Ok(AutomationLog {
            id: self.id,
            flow_id: self.flow_id,
            organization_id: self.organization_id,
            status,
            trigger_data: self.trigger_data,
            result: self.result,
            error: self.error,
            started_at: self.started_at,
            completed_at: self.completed_at,
            resumed_at: self.resumed_at,
        })
    }
}

#[async_trait]
impl AutomationStore for PostgresStore {
    async fn list_active_flows(&self, organization_id: Uuid) -> Result<Vec<AutomationFlow>> {
        let rows = sqlx::query_as::<_, FlowRow>(
            r#"
            SELECT id, organization_id, name, status, trigger_config, blocks,
                   run_count, last_run
            FROM automation_flows
            WHERE organization_id = $1
              AND status = 'active'
            ORDER BY created_at
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        let mut flows = Vec::with_capacity(rows.len());
        for row in rows {
            let flow_id = row.id;
            match row.decode() {
                Ok(flow) => flows.push(flow),
                // Invalid configuration is caught here, at load time; the
                // flow cannot be half-executed so it is not a candidate.
                Err(err) => warn!(%flow_id, error = %err, "skipping undecodable flow"),
            }
        }
        Ok(flows)
    }

    async fn find_flow(&self, flow_id: Uuid) -> Result<Option<AutomationFlow>> {
        let row = sqlx::query_as::<_, FlowRow>(
            r#"
            SELECT id, organization_id, name, status, trigger_config, blocks,
                   run_count, last_run
            FROM automation_flows
            WHERE id = $1
            "#,
        )
        .bind(flow_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(FlowRow::decode).transpose()
    }

    async fn record_flow_run(&self, flow_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE automation_flows
             SET run_count = run_count + 1, last_run = NOW()
             WHERE id = $1",
        )
        .bind(flow_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_log(&self, log: NewAutomationLog) -> Result<AutomationLog> {
        let row = sqlx::query_as::<_, LogRow>(
            r#"
            INSERT INTO automation_logs (
                flow_id, organization_id, status, trigger_data, result,
                error, started_at, completed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, flow_id, organization_id, status, trigger_data,
                      result, error, started_at, completed_at, resumed_at
            "#,
        )
        .bind(log.flow_id)
        .bind(log.organization_id)
        .bind(log.status.as_str())
        .bind(&log.trigger_data)
        .bind(&log.result)
        .bind(&log.error)
        .bind(log.started_at)
        .bind(log.completed_at)
        .fetch_one(&self.pool)
        .await?;

        row.decode()
    }

    async fn claim_due_continuations(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<AutomationLog>> {
        let rows = sqlx::query_as::<_, LogRow>(
            r#"
            UPDATE automation_logs
            SET resumed_at = NOW()
            WHERE id IN (
                SELECT id
                FROM automation_logs
                WHERE status = 'scheduled'
                  AND resumed_at IS NULL
                  AND (trigger_data->>'execute_at')::timestamptz <= $1
                ORDER BY started_at
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, flow_id, organization_id, status, trigger_data,
                      result, error, started_at, completed_at, resumed_at
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LogRow::decode).collect()
    }

    async fn find_job(&self, job_id: Uuid) -> Result<Option<Job>> {
        let job = sqlx::query_as::<_, Job>(
            "SELECT id, organization_id, title, status, client_id, assignee_id,
                    revenue, created_at, updated_at
             FROM jobs
             WHERE id = $1",
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }

    async fn update_job_status(&self, job_id: Uuid, status: &str) -> Result<()> {
        sqlx::query("UPDATE jobs SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(job_id)
            .bind(status)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn update_job_assignee(&self, job_id: Uuid, assignee_id: Option<Uuid>) -> Result<()> {
        sqlx::query("UPDATE jobs SET assignee_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(job_id)
            .bind(assignee_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn insert_job_activity(&self, activity: NewJobActivity) -> Result<()> {
        sqlx::query(
            "INSERT INTO job_activity (job_id, kind, note, actor_id)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(activity.job_id)
        .bind(&activity.kind)
        .bind(&activity.note)
        .bind(activity.actor_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_job_subtask(&self, subtask: NewJobSubtask) -> Result<()> {
        sqlx::query(
            "INSERT INTO job_subtasks (job_id, title, completed)
             VALUES ($1, $2, $3)",
        )
        .bind(subtask.job_id)
        .bind(&subtask.title)
        .bind(subtask.completed)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn latest_invoice_number(&self, organization_id: Uuid) -> Result<Option<String>> {
        let number = sqlx::query_scalar::<_, String>(
            "SELECT number
             FROM invoices
             WHERE organization_id = $1
             ORDER BY created_at DESC
             LIMIT 1",
        )
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(number)
    }

    async fn insert_invoice(&self, invoice: NewInvoice) -> Result<Invoice> {
        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            INSERT INTO invoices (
                organization_id, job_id, number, status, subtotal, tax, total
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, organization_id, job_id, number, status, subtotal,
                      tax, total, created_at, updated_at
            "#,
        )
        .bind(invoice.organization_id)
        .bind(invoice.job_id)
        .bind(&invoice.number)
        .bind(&invoice.status)
        .bind(invoice.subtotal)
        .bind(invoice.tax)
        .bind(invoice.total)
        .fetch_one(&self.pool)
        .await?;

        Ok(invoice)
    }

    async fn insert_invoice_line_item(&self, item: NewInvoiceLineItem) -> Result<()> {
        sqlx::query(
            "INSERT INTO invoice_line_items (invoice_id, description, quantity, unit_price, amount)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(item.invoice_id)
        .bind(&item.description)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.amount)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_invoice_event(&self, event: NewInvoiceEvent) -> Result<()> {
        sqlx::query(
            "INSERT INTO invoice_events (invoice_id, kind, note)
             VALUES ($1, $2, $3)",
        )
        .bind(event.invoice_id)
        .bind(&event.kind)
        .bind(&event.note)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_invoice(&self, invoice_id: Uuid) -> Result<Option<Invoice>> {
        let invoice = sqlx::query_as::<_, Invoice>(
            "SELECT id, organization_id, job_id, number, status, subtotal, tax,
                    total, created_at, updated_at
             FROM invoices
             WHERE id = $1",
        )
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(invoice)
    }

    async fn mark_invoice_sent(&self, invoice_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE invoices SET status = 'sent', updated_at = NOW() WHERE id = $1")
            .bind(invoice_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn insert_notification(&self, notification: NewNotification) -> Result<()> {
        sqlx::query(
            "INSERT INTO notifications (organization_id, user_id, title, body, severity)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(notification.organization_id)
        .bind(notification.user_id)
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(&notification.severity)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_admin_members(&self, organization_id: Uuid) -> Result<Vec<OrgMember>> {
        let members = sqlx::query_as::<_, OrgMember>(
            "SELECT organization_id, user_id, role, status
             FROM organization_members
             WHERE organization_id = $1
               AND status = 'active'
               AND role IN ('admin', 'owner')",
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(members)
    }

    async fn find_profile(&self, user_id: Uuid) -> Result<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(
            "SELECT id, full_name, email, phone FROM profiles WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    async fn find_inventory_item(&self, item_id: Uuid) -> Result<Option<InventoryItem>> {
        let item = sqlx::query_as::<_, InventoryItem>(
            "SELECT id, organization_id, name, quantity, min_quantity, stock_level
             FROM inventory_items
             WHERE id = $1",
        )
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    async fn update_inventory_level(
        &self,
        item_id: Uuid,
        quantity: i64,
        stock_level: &str,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE inventory_items
             SET quantity = $2, stock_level = $3, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(item_id)
        .bind(quantity)
        .bind(stock_level)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_audit_entry(&self, entry: NewAuditEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO audit_log (organization_id, user_id, action, entity_type, entity_id, details)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(entry.organization_id)
        .bind(entry.user_id)
        .bind(&entry.action)
        .bind(&entry.entity_type)
        .bind(entry.entity_id)
        .bind(&entry.details)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
