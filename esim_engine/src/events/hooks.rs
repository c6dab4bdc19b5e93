use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{CatalogSyncedEvent, EventHandler, EventProducer, Handler, OrderStatusChangedEvent};

/// The publishing ends of every registered hook. Cheap to clone; hand one copy to each component.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_status_changed_producer: Vec<EventProducer<OrderStatusChangedEvent>>,
    pub catalog_synced_producer: Vec<EventProducer<CatalogSyncedEvent>>,
}

impl EventProducers {
    pub async fn publish_order_status_changed(&self, event: OrderStatusChangedEvent) {
        for producer in &self.order_status_changed_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_catalog_synced(&self, event: CatalogSyncedEvent) {
        for producer in &self.catalog_synced_producer {
            producer.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_order_status_changed: Option<EventHandler<OrderStatusChangedEvent>>,
    pub on_catalog_synced: Option<EventHandler<CatalogSyncedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_order_status_changed = hooks.on_order_status_changed.map(|f| EventHandler::new(buffer_size, f));
        let on_catalog_synced = hooks.on_catalog_synced.map(|f| EventHandler::new(buffer_size, f));
        Self { on_order_status_changed, on_catalog_synced }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_status_changed {
            result.order_status_changed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_catalog_synced {
            result.catalog_synced_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_status_changed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_catalog_synced {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_status_changed: Option<Handler<OrderStatusChangedEvent>>,
    pub on_catalog_synced: Option<Handler<CatalogSyncedEvent>>,
}

impl EventHooks {
    pub fn on_order_status_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderStatusChangedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_status_changed = Some(Arc::new(f));
        self
    }

    pub fn on_catalog_synced<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(CatalogSyncedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_catalog_synced = Some(Arc::new(f));
        self
    }
}
