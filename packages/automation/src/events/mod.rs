use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};
use std::fmt;
use uuid::Uuid;

/// Coarse grouping of event types, mirroring the product's domain areas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Job,
    Client,
    Invoice,
    Schedule,
    Inventory,
    Form,
    Team,
    System,
}

/// The closed vocabulary of domain events the automation engine reacts to.
///
/// Wire names are dotted strings (`job.status_change`) — the same strings
/// flow builders put into a flow's trigger config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "job.created")]
    JobCreated,
    #[serde(rename = "job.status_change")]
    JobStatusChange,
    #[serde(rename = "job.assigned")]
    JobAssigned,
    #[serde(rename = "job.completed")]
    JobCompleted,
    #[serde(rename = "client.created")]
    ClientCreated,
    #[serde(rename = "invoice.created")]
    InvoiceCreated,
    #[serde(rename = "invoice.sent")]
    InvoiceSent,
    #[serde(rename = "invoice.paid")]
    InvoicePaid,
    #[serde(rename = "invoice.overdue")]
    InvoiceOverdue,
    #[serde(rename = "schedule.visit_upcoming")]
    ScheduleVisitUpcoming,
    #[serde(rename = "inventory.low_stock")]
    InventoryLowStock,
    #[serde(rename = "inventory.adjusted")]
    InventoryAdjusted,
    #[serde(rename = "form.submitted")]
    FormSubmitted,
    #[serde(rename = "team.member_joined")]
    TeamMemberJoined,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::JobCreated => "job.created",
            EventType::JobStatusChange => "job.status_change",
            EventType::JobAssigned => "job.assigned",
            EventType::JobCompleted => "job.completed",
            EventType::ClientCreated => "client.created",
            EventType::InvoiceCreated => "invoice.created",
            EventType::InvoiceSent => "invoice.sent",
            EventType::InvoicePaid => "invoice.paid",
            EventType::InvoiceOverdue => "invoice.overdue",
            EventType::ScheduleVisitUpcoming => "schedule.visit_upcoming",
            EventType::InventoryLowStock => "inventory.low_stock",
            EventType::InventoryAdjusted => "inventory.adjusted",
            EventType::FormSubmitted => "form.submitted",
            EventType::TeamMemberJoined => "team.member_joined",
        }
    }

    pub fn category(&self) -> EventCategory {
        match self {
            EventType::JobCreated
            | EventType::JobStatusChange
            | EventType::JobAssigned
            | EventType::JobCompleted => EventCategory::Job,
            EventType::ClientCreated => EventCategory::Client,
            EventType::InvoiceCreated
            | EventType::InvoiceSent
            | EventType::InvoicePaid
            | EventType::InvoiceOverdue => EventCategory::Invoice,
            EventType::ScheduleVisitUpcoming => EventCategory::Schedule,
            EventType::InventoryLowStock | EventType::InventoryAdjusted => {
                EventCategory::Inventory
            }
            EventType::FormSubmitted => EventCategory::Form,
            EventType::TeamMemberJoined => EventCategory::Team,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional event fields, for call sites that need more than the defaults.
#[derive(Debug, Clone, Default)]
pub struct EventOpts {
    pub user_id: Option<Uuid>,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub metadata: Option<Map<String, JsonValue>>,
}

/// An immutable fact describing something that happened in the product.
///
/// Constructed once by a factory when a domain action completes, consumed
/// exactly once per dispatch, and fanned out to zero or many flow runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationEvent {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub category: EventCategory,
    pub organization_id: Uuid,
    pub user_id: Option<Uuid>,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub payload: Map<String, JsonValue>,
    pub metadata: Option<Map<String, JsonValue>>,
    pub timestamp: DateTime<Utc>,
}

impl AutomationEvent {
    /// The single construction path every factory helper funnels through.
    pub fn new(
        event_type: EventType,
        organization_id: Uuid,
        payload: Map<String, JsonValue>,
        opts: EventOpts,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            category: event_type.category(),
            organization_id,
            user_id: opts.user_id,
            entity_type: opts.entity_type,
            entity_id: opts.entity_id,
            payload,
            metadata: opts.metadata,
            timestamp: Utc::now(),
        }
    }

    /// Compact JSON summary persisted in automation log rows.
    pub fn summary(&self) -> JsonValue {
        json!({
            "event": self.event_type.as_str(),
            "entity_type": self.entity_type,
            "entity_id": self.entity_id,
            "payload": self.payload,
        })
    }

    // =========================================================================
    // Factory helpers (call-site ergonomics only; all funnel through `new`)
    // =========================================================================

    /// A job moved between statuses.
    pub fn job_status_change(
        organization_id: Uuid,
        job_id: Uuid,
        old_status: &str,
        new_status: &str,
        user_id: Option<Uuid>,
    ) -> Self {
        Self::new(
            EventType::JobStatusChange,
            organization_id,
            object(json!({
                "job_id": job_id,
                "old_status": old_status,
                "new_status": new_status,
                "status": new_status,
            })),
            EventOpts {
                user_id,
                entity_type: Some("job".to_string()),
                entity_id: Some(job_id),
                ..Default::default()
            },
        )
    }

    /// A job was assigned to (or unassigned from) a team member.
    pub fn job_assigned(organization_id: Uuid, job_id: Uuid, assignee_id: Option<Uuid>) -> Self {
        Self::new(
            EventType::JobAssigned,
            organization_id,
            object(json!({
                "job_id": job_id,
                "assignee_id": assignee_id,
            })),
            EventOpts {
                entity_type: Some("job".to_string()),
                entity_id: Some(job_id),
                ..Default::default()
            },
        )
    }

    /// A job reached its terminal `done` status.
    pub fn job_completed(organization_id: Uuid, job_id: Uuid, user_id: Option<Uuid>) -> Self {
        Self::new(
            EventType::JobCompleted,
            organization_id,
            object(json!({
                "job_id": job_id,
                "status": "done",
            })),
            EventOpts {
                user_id,
                entity_type: Some("job".to_string()),
                entity_id: Some(job_id),
                ..Default::default()
            },
        )
    }

    /// An invoice was created for a job.
    pub fn invoice_created(organization_id: Uuid, invoice_id: Uuid, job_id: Option<Uuid>) -> Self {
        Self::new(
            EventType::InvoiceCreated,
            organization_id,
            object(json!({
                "invoice_id": invoice_id,
                "job_id": job_id,
            })),
            EventOpts {
                entity_type: Some("invoice".to_string()),
                entity_id: Some(invoice_id),
                ..Default::default()
            },
        )
    }

    /// An invoice was paid.
    pub fn invoice_paid(organization_id: Uuid, invoice_id: Uuid, amount: &str) -> Self {
        Self::new(
            EventType::InvoicePaid,
            organization_id,
            object(json!({
                "invoice_id": invoice_id,
                "amount": amount,
            })),
            EventOpts {
                entity_type: Some("invoice".to_string()),
                entity_id: Some(invoice_id),
                ..Default::default()
            },
        )
    }

    /// An invoice passed its due date without payment.
    pub fn invoice_overdue(organization_id: Uuid, invoice_id: Uuid, days_overdue: i64) -> Self {
        Self::new(
            EventType::InvoiceOverdue,
            organization_id,
            object(json!({
                "invoice_id": invoice_id,
                "days_overdue": days_overdue,
            })),
            EventOpts {
                entity_type: Some("invoice".to_string()),
                entity_id: Some(invoice_id),
                ..Default::default()
            },
        )
    }

    /// An inventory item fell below its minimum quantity.
    pub fn inventory_low_stock(
        organization_id: Uuid,
        item_id: Uuid,
        name: &str,
        quantity: i64,
        min_quantity: i64,
    ) -> Self {
        Self::new(
            EventType::InventoryLowStock,
            organization_id,
            object(json!({
                "item_id": item_id,
                "item_name": name,
                "quantity": quantity,
                "min_quantity": min_quantity,
            })),
            EventOpts {
                entity_type: Some("inventory_item".to_string()),
                entity_id: Some(item_id),
                ..Default::default()
            },
        )
    }

    /// A client-facing form was submitted.
    pub fn form_submitted(organization_id: Uuid, form_id: Uuid, job_id: Option<Uuid>) -> Self {
        Self::new(
            EventType::FormSubmitted,
            organization_id,
            object(json!({
                "form_id": form_id,
                "job_id": job_id,
            })),
            EventOpts {
                entity_type: Some("form".to_string()),
                entity_id: Some(form_id),
                ..Default::default()
            },
        )
    }
}

fn object(value: JsonValue) -> Map<String, JsonValue> {
    match value {
        JsonValue::Object(map) => map,
        _ => Map::new(),
    }
}
