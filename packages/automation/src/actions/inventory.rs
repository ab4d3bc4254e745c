//! `update_inventory` executor: applies a quantity delta and recomputes the
//! derived stock level.

use serde_json::json;
use uuid::Uuid;

use crate::engine::ExecutionContext;
use crate::models::InventoryItem;
use crate::store::AutomationStore;

use super::{variables_uuid, ActionResult};

pub(crate) async fn update_inventory(
    store: &dyn AutomationStore,
    ctx: &mut ExecutionContext,
    item_id: Option<Uuid>,
    quantity_change: i64,
) -> ActionResult {
    let from_event = || {
        (ctx.event.entity_type.as_deref() == Some("inventory_item"))
            .then_some(ctx.event.entity_id)
            .flatten()
    };
    let Some(item_id) = item_id
        .or_else(from_event)
        .or_else(|| variables_uuid(ctx, "item_id"))
    else {
        return ActionResult::fail("update_inventory requires an item id");
    };

    let item = match store.find_inventory_item(item_id).await {
        Ok(Some(item)) => item,
        Ok(None) => return ActionResult::fail(format!("inventory item {item_id} not found")),
        Err(err) => return ActionResult::fail(format!("failed to load inventory item: {err:#}")),
    };

    let quantity = item.quantity + quantity_change;
    let stock_level = InventoryItem::derived_stock_level(quantity, item.min_quantity);

    if let Err(err) = store
        .update_inventory_level(item_id, quantity, stock_level)
        .await
    {
        return ActionResult::fail(format!("failed to update inventory item: {err:#}"));
    }

    ctx.log(format!(
        "Inventory `{}` {} -> {} ({})",
        item.name, item.quantity, quantity, stock_level
    ));
    ActionResult::ok_with(json!({
        "quantity": quantity,
        "stock_level": stock_level,
    }))
}
