use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    adapters::{ProviderAdapter, ProviderError, ProviderRegistry},
    db::traits::{cursor_key, CatalogManagement, OrderManagement, SettingsStore, StorageError},
    db_types::{Order, OrderStatusType},
    events::{EventProducers, OrderStatusChangedEvent},
    scheduler::{Clock, JobError, ScheduledJob},
};

pub const ORDER_STATUS_JOB_NAME: &str = "order_status";

#[derive(Debug, Clone, Error)]
pub enum PollError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Order {order} references provider #{provider_id}, which does not exist")]
    UnknownProvider { order: String, provider_id: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderPollerConfig {
    /// Orders younger than this are left alone, giving the provider time to register them.
    pub grace_period: chrono::Duration,
    /// How many times a failed order is sent back to `processing`.
    pub max_retries: i64,
    pub adapter_timeout: Duration,
}

impl Default for OrderPollerConfig {
    fn default() -> Self {
        Self { grace_period: chrono::Duration::minutes(2), max_retries: 1, adapter_timeout: Duration::from_secs(30) }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollReport {
    pub checked: u64,
    pub completed: u64,
    pub failed: u64,
    pub unchanged: u64,
    pub errors: u64,
    pub retried: u64,
}

enum PollOutcome {
    Advanced(OrderStatusType),
    Unchanged,
}

/// Advances non-terminal orders using the status reported by their provider.
pub struct OrderStatusPoller<B> {
    db: B,
    registry: Arc<ProviderRegistry>,
    clock: Arc<dyn Clock>,
    config: OrderPollerConfig,
    producers: EventProducers,
}

impl<B> OrderStatusPoller<B>
where B: OrderManagement + CatalogManagement + SettingsStore
{
    pub fn new(db: B, registry: Arc<ProviderRegistry>, clock: Arc<dyn Clock>, config: OrderPollerConfig) -> Self {
        Self { db, registry, clock, config, producers: EventProducers::default() }
    }

    pub fn with_producers(mut self, producers: EventProducers) -> Self {
        self.producers = producers;
        self
    }

    pub async fn run_poll_pass(&self) -> Result<PollReport, StorageError> {
        let mut report = PollReport::default();
        self.retry_failed_orders(&mut report).await?;

        let now = self.clock.now();
        let orders = self
            .db
            .fetch_orders_by_status(&[OrderStatusType::Pending, OrderStatusType::Processing])
            .await?
            .into_iter()
            .filter(|o| past_grace_period(o, now, self.config.grace_period))
            .collect::<Vec<_>>();
        debug!("📦️ {} orders are waiting on their provider", orders.len());
        let mut slugs = HashMap::new();
        for order in orders {
            report.checked += 1;
            match self.poll_order(&order, &mut slugs).await {
                Ok(PollOutcome::Advanced(OrderStatusType::Completed)) => report.completed += 1,
                Ok(PollOutcome::Advanced(_)) => report.failed += 1,
                Ok(PollOutcome::Unchanged) => report.unchanged += 1,
                Err(e) => {
                    warn!("📦️ Could not poll order {}: {e}", order.display_order_id);
                    report.errors += 1;
                },
            }
        }
        self.db.write_cursor(&cursor_key(ORDER_STATUS_JOB_NAME), self.clock.now()).await?;
        info!(
            "📦️ Order poll complete. {} checked, {} completed, {} failed, {} unchanged, {} errors, {} retried",
            report.checked, report.completed, report.failed, report.unchanged, report.errors, report.retried
        );
        Ok(report)
    }

    async fn retry_failed_orders(&self, report: &mut PollReport) -> Result<(), StorageError> {
        if self.config.max_retries <= 0 {
            return Ok(());
        }
        for order in self.db.fetch_retryable_orders(self.config.max_retries).await? {
            match self.db.retry_order(order.id).await {
                Ok(o) => {
                    info!("📦️ Order {} sent back to processing (attempt {})", o.display_order_id, o.retry_count);
                    report.retried += 1;
                },
                Err(e) => {
                    warn!("📦️ Could not retry order {}: {e}", order.display_order_id);
                    report.errors += 1;
                },
            }
        }
        Ok(())
    }

    async fn poll_order(&self, order: &Order, slugs: &mut HashMap<i64, String>) -> Result<PollOutcome, PollError> {
        let adapter = self.adapter_for(order, slugs).await?;
        let status = match tokio::time::timeout(
            self.config.adapter_timeout,
            adapter.get_order_status(&order.provider_order_ref),
        )
        .await
        {
            Ok(status) => status?,
            Err(_) => {
                let secs = self.config.adapter_timeout.as_secs();
                return Err(ProviderError::Transient(format!("No response within {secs}s")).into());
            },
        };
        if !status.is_terminal() || status == order.status {
            trace!("📦️ Order {} is still {status} at the provider", order.display_order_id);
            return Ok(PollOutcome::Unchanged);
        }
        let updated = self.db.update_order_status(order.id, status).await?;
        info!("📦️ Order {} is now {status}", updated.display_order_id);
        self.producers.publish_order_status_changed(OrderStatusChangedEvent::new(updated, order.status)).await;
        Ok(PollOutcome::Advanced(status))
    }

    async fn adapter_for(
        &self,
        order: &Order,
        slugs: &mut HashMap<i64, String>,
    ) -> Result<Arc<dyn ProviderAdapter>, PollError> {
        let slug = match slugs.get(&order.provider_id) {
            Some(slug) => slug.clone(),
            None => {
                let provider = self.db.fetch_provider(order.provider_id).await?.ok_or_else(|| {
                    PollError::UnknownProvider { order: order.display_order_id.clone(), provider_id: order.provider_id }
                })?;
                slugs.insert(order.provider_id, provider.slug.clone());
                provider.slug
            },
        };
        Ok(self.registry.get(&slug).map_err(ProviderError::from)?)
    }
}

#[async_trait]
impl<B> ScheduledJob for OrderStatusPoller<B>
where B: OrderManagement + CatalogManagement + SettingsStore
{
    fn name(&self) -> &str {
        ORDER_STATUS_JOB_NAME
    }

    async fn run(&self) -> Result<(), JobError> {
        self.run_poll_pass().await?;
        Ok(())
    }
}

/// True if the order is old enough to be polled at `now`.
pub fn past_grace_period(order: &Order, now: DateTime<Utc>, grace_period: chrono::Duration) -> bool {
    order.created_at <= now - grace_period
}
