use esim_engine::events::{CatalogSyncedEvent, EventHandlers, EventHooks, OrderStatusChangedEvent};
use futures::future::BoxFuture;
use log::*;

pub const EVENT_BUFFER_SIZE: usize = 25;

/// Assigns the server's event handlers.
///
/// 1. OrderStatusChangedEvent - logged, so that provisioning failures are visible to operators.
/// 2. CatalogSyncedEvent - logs the merge outcome for the provider.
pub fn create_event_handlers() -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_order_status_changed(on_order_status_changed);
    hooks.on_catalog_synced(on_catalog_synced);
    EventHandlers::new(EVENT_BUFFER_SIZE, hooks)
}

fn on_order_status_changed(ev: OrderStatusChangedEvent) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        let new_status = ev.new_status();
        info!("📬️ Order {} moved from {} to {new_status}", ev.order.display_order_id, ev.old_status);
    })
}

fn on_catalog_synced(ev: CatalogSyncedEvent) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        info!(
            "📬️ {} catalog synced at {}. {} created, {} updated, {} deactivated in the unified catalog",
            ev.provider, ev.synced_at, ev.merge.created, ev.merge.updated, ev.merge.deactivated
        );
    })
}
