//! `create_invoice` and `send_invoice` executors.

use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

use crate::engine::ExecutionContext;
use crate::models::{NewInvoice, NewInvoiceEvent, NewInvoiceLineItem};
use crate::store::AutomationStore;

use super::{event_job_id, variables_uuid, ActionResult};

pub(crate) async fn create_invoice(
    store: &dyn AutomationStore,
    ctx: &mut ExecutionContext,
) -> ActionResult {
    let Some(job_id) = event_job_id(ctx) else {
        return ActionResult::fail("create_invoice requires a job-scoped event");
    };

    let job = match store.find_job(job_id).await {
        Ok(Some(job)) => job,
        Ok(None) => return ActionResult::fail(format!("job {job_id} not found")),
        Err(err) => return ActionResult::fail(format!("failed to load job: {err:#}")),
    };

    let latest = match store.latest_invoice_number(ctx.event.organization_id).await {
        Ok(latest) => latest,
        Err(err) => {
            return ActionResult::fail(format!("failed to load latest invoice number: {err:#}"))
        }
    };
    let number = next_invoice_number(latest.as_deref());

    let subtotal = job.revenue;
    let tax = (subtotal * Decimal::from(10) / Decimal::from(100)).round_dp(2);
    let total = subtotal + tax;

    let invoice = match store
        .insert_invoice(NewInvoice {
            organization_id: ctx.event.organization_id,
            job_id: Some(job.id),
            number,
            status: "draft".to_string(),
            subtotal,
            tax,
            total,
        })
        .await
    {
        Ok(invoice) => invoice,
        Err(err) => return ActionResult::fail(format!("failed to insert invoice: {err:#}")),
    };

    if let Err(err) = store
        .insert_invoice_line_item(NewInvoiceLineItem {
            invoice_id: invoice.id,
            description: job.title.clone(),
            quantity: 1,
            unit_price: subtotal,
            amount: subtotal,
        })
        .await
    {
        return ActionResult::fail(format!("failed to insert invoice line item: {err:#}"));
    }

    if let Err(err) = store
        .insert_invoice_event(NewInvoiceEvent {
            invoice_id: invoice.id,
            kind: "created".to_string(),
            note: format!("Created by automation `{}`", ctx.flow.name),
        })
        .await
    {
        return ActionResult::fail(format!("failed to insert invoice event: {err:#}"));
    }

    ctx.log(format!(
        "Invoice {} created for job `{}` (total {})",
        invoice.number, job.title, invoice.total
    ));
    ActionResult::ok_with(json!({
        "invoice_id": invoice.id,
        "invoice_number": invoice.number,
    }))
}

pub(crate) async fn send_invoice(
    store: &dyn AutomationStore,
    ctx: &mut ExecutionContext,
    invoice_id: Option<Uuid>,
) -> ActionResult {
    // Config wins; otherwise a prior create_invoice block left the id in the
    // run variables.
    let Some(invoice_id) = invoice_id.or_else(|| variables_uuid(ctx, "invoice_id")) else {
        return ActionResult::fail("send_invoice requires an invoice id");
    };

    let invoice = match store.find_invoice(invoice_id).await {
        Ok(Some(invoice)) => invoice,
        Ok(None) => return ActionResult::fail(format!("invoice {invoice_id} not found")),
        Err(err) => return ActionResult::fail(format!("failed to load invoice: {err:#}")),
    };

    if let Err(err) = store.mark_invoice_sent(invoice.id).await {
        return ActionResult::fail(format!("failed to mark invoice sent: {err:#}"));
    }

    if let Err(err) = store
        .insert_invoice_event(NewInvoiceEvent {
            invoice_id: invoice.id,
            kind: "sent".to_string(),
            note: format!("Sent by automation `{}`", ctx.flow.name),
        })
        .await
    {
        return ActionResult::fail(format!("failed to insert invoice event: {err:#}"));
    }

    ctx.log(format!("Invoice {} marked sent", invoice.number));
    ActionResult::ok_with(json!({ "invoice_status": "sent" }))
}

/// Next sequential display number: increment the numeric suffix of the
/// organization's most recent invoice, starting at `INV-0001`.
fn next_invoice_number(latest: Option<&str>) -> String {
    let last = latest
        .and_then(|number| number.rsplit('-').next())
        .and_then(|digits| digits.parse::<u64>().ok())
        .unwrap_or(0);
    format!("INV-{:04}", last + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoice_numbers_increment_from_latest() {
        assert_eq!(next_invoice_number(None), "INV-0001");
        assert_eq!(next_invoice_number(Some("INV-0042")), "INV-0043");
        assert_eq!(next_invoice_number(Some("INV-9999")), "INV-10000");
    }

    #[test]
    fn unparseable_numbers_restart_the_sequence() {
        assert_eq!(next_invoice_number(Some("DRAFT")), "INV-0001");
        assert_eq!(next_invoice_number(Some("INV-")), "INV-0001");
    }
}
