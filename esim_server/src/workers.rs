use std::{sync::Arc, time::Duration};

use esim_engine::{
    adapters::ProviderRegistry,
    catalog::CatalogSyncOrchestrator,
    events::EventProducers,
    notifications::{PushNotifier, UsageThresholdNotifier},
    orders::{OrderPollerConfig, OrderStatusPoller},
    scheduler::{Clock, Scheduler},
    SqliteDatabase,
};
use log::*;

use crate::config::ScheduleConfig;

pub type CatalogSync = CatalogSyncOrchestrator<SqliteDatabase>;

/// The three periodic jobs. Each runs on its own interval and never overlaps with itself.
pub struct Workers {
    pub catalog: Scheduler<Arc<CatalogSync>, SqliteDatabase>,
    pub orders: Scheduler<OrderStatusPoller<SqliteDatabase>, SqliteDatabase>,
    /// `None` when push delivery is not configured
    pub usage: Option<Scheduler<UsageThresholdNotifier<SqliteDatabase>, SqliteDatabase>>,
}

impl Workers {
    /// Starts the timer loops. Do not call this outside a tokio runtime.
    pub fn start(&self) {
        self.catalog.start();
        self.orders.start();
        match &self.usage {
            Some(usage) => usage.start(),
            None => info!("🕰️ Usage notifications are not scheduled"),
        }
    }

    pub fn stop(&self) {
        self.catalog.stop();
        self.orders.stop();
        if let Some(usage) = &self.usage {
            usage.stop();
        }
    }
}

/// Everything the workers share with the rest of the server.
pub struct WorkerContext {
    pub db: SqliteDatabase,
    pub providers: Arc<ProviderRegistry>,
    pub notifier: Option<Arc<dyn PushNotifier>>,
    pub producers: EventProducers,
    pub clock: Arc<dyn Clock>,
}

/// Builds the schedulers. The catalog orchestrator is shared with the manual sync endpoint, so both use one code path.
pub fn create_workers(ctx: WorkerContext, catalog: Arc<CatalogSync>, schedules: &ScheduleConfig) -> Workers {
    let WorkerContext { db, providers, notifier, producers, clock } = ctx;
    let catalog = Scheduler::new(catalog, db.clone(), Arc::clone(&clock), schedules.catalog_sync_interval);

    let poller_config = OrderPollerConfig {
        grace_period: to_chrono(schedules.order_grace_period),
        max_retries: schedules.order_max_retries,
        adapter_timeout: schedules.adapter_timeout,
    };
    let poller = OrderStatusPoller::new(db.clone(), Arc::clone(&providers), Arc::clone(&clock), poller_config)
        .with_producers(producers);
    let orders = Scheduler::new(poller, db.clone(), Arc::clone(&clock), schedules.order_poll_interval);

    let usage = notifier.map(|notifier| {
        let job = UsageThresholdNotifier::new(
            db.clone(),
            providers,
            notifier,
            Arc::clone(&clock),
            schedules.adapter_timeout,
        );
        Scheduler::new(job, db, clock, schedules.usage_notify_interval)
    });
    Workers { catalog, orders, usage }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|e| {
        warn!("🕰️ {}s cannot be used as a grace period ({e}). Using 2 minutes.", d.as_secs());
        chrono::Duration::minutes(2)
    })
}
