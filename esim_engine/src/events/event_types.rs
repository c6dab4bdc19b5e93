use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    adapters::SyncResult,
    catalog::MergeReport,
    db_types::{Order, OrderStatusType},
};

/// Published by the order poller when a provider reports a terminal status for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChangedEvent {
    pub order: Order,
    pub old_status: OrderStatusType,
}

impl OrderStatusChangedEvent {
    pub fn new(order: Order, old_status: OrderStatusType) -> Self {
        Self { order, old_status }
    }

    pub fn new_status(&self) -> OrderStatusType {
        self.order.status
    }
}

/// Published by the catalog sync after a provider's packages were stored and merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSyncedEvent {
    pub provider: String,
    pub synced_at: DateTime<Utc>,
    pub sync: SyncResult,
    pub merge: MergeReport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    OrderStatusChanged(OrderStatusChangedEvent),
    CatalogSynced(CatalogSyncedEvent),
}
