//! Domain rows the action executors read and write. The owning domains
//! (jobs, invoicing, inventory, ...) live elsewhere in the product; the
//! automation engine only needs these projections of their tables.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// A field-service job.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Job {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub title: String,
    pub status: String,
    pub client_id: Option<Uuid>,
    pub assignee_id: Option<Uuid>,
    pub revenue: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Activity entry appended to a job's timeline.
#[derive(Debug, Clone)]
pub struct NewJobActivity {
    pub job_id: Uuid,
    pub kind: String,
    pub note: String,
    pub actor_id: Option<Uuid>,
}

/// A checklist subtask on a job.
#[derive(Debug, Clone)]
pub struct NewJobSubtask {
    pub job_id: Uuid,
    pub title: String,
    pub completed: bool,
}

/// An invoice row. `number` is the organization-sequential display id
/// (`INV-0042`), distinct from the primary key.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub job_id: Option<Uuid>,
    pub number: String,
    pub status: String,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub organization_id: Uuid,
    pub job_id: Option<Uuid>,
    pub number: String,
    pub status: String,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone)]
pub struct NewInvoiceLineItem {
    pub invoice_id: Uuid,
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub amount: Decimal,
}

/// Timeline event on an invoice (`created`, `sent`, ...).
#[derive(Debug, Clone)]
pub struct NewInvoiceEvent {
    pub invoice_id: Uuid,
    pub kind: String,
    pub note: String,
}

/// An in-app notification row.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub body: String,
    pub severity: String,
}

/// Organization membership, used for admin/owner fan-out.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrgMember {
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub status: String,
}

impl OrgMember {
    /// Whether this member receives organization-wide automation
    /// notifications.
    pub fn is_notifiable_admin(&self) -> bool {
        self.status == "active" && (self.role == "admin" || self.role == "owner")
    }
}

/// User profile projection for recipient resolution.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// A tracked inventory item with its derived stock level.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct InventoryItem {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub quantity: i64,
    pub min_quantity: i64,
    pub stock_level: String,
}

impl InventoryItem {
    /// Stock level derived from a quantity: `critical` at or below zero,
    /// `low` below the item's minimum, `ok` otherwise.
    pub fn derived_stock_level(quantity: i64, min_quantity: i64) -> &'static str {
        if quantity <= 0 {
            "critical"
        } else if quantity < min_quantity {
            "low"
        } else {
            "ok"
        }
    }
}

/// Audit log row recording that an automation acted on the organization.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub organization_id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub details: JsonValue,
}
