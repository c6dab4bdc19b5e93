use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    adapters::{ProviderAdapter, ProviderRegistry, UsageData},
    db::traits::{
        cursor_key,
        CatalogManagement,
        NotificationStateManagement,
        OrderManagement,
        SettingsStore,
        StorageError,
    },
    db_types::{Order, OrderStatusType, UserNotificationState},
    notifications::{low_data_notification, low_data_payload, PushNotifier},
    scheduler::{Clock, JobError, ScheduledJob},
};

pub const USAGE_NOTIFICATION_JOB_NAME: &str = "usage_notification";

/// Usage percentages that trigger a notification, in ascending order.
pub const LOW_DATA_THRESHOLDS: [i64; 4] = [10, 80, 90, 95];

/// Once a level was announced, the same level is announced again only after this long.
pub const RENOTIFY_AFTER_HOURS: i64 = 24;

/// The highest threshold reached by `percentage_used`, if any.
pub fn crossed_level(percentage_used: f64) -> Option<i64> {
    if !percentage_used.is_finite() {
        return None;
    }
    LOW_DATA_THRESHOLDS.iter().rev().copied().find(|&t| percentage_used >= t as f64)
}

/// A higher level than last announced always notifies. The same level notifies again once the renotify window has
/// passed. A lower level never does.
pub fn should_notify(level: i64, state: &UserNotificationState, now: DateTime<Utc>) -> bool {
    if level > state.last_low_data_level {
        return true;
    }
    if level < state.last_low_data_level {
        return false;
    }
    match state.last_low_data_notified_at {
        None => true,
        Some(at) => now - at > chrono::Duration::hours(RENOTIFY_AFTER_HOURS),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationReport {
    pub examined: u64,
    pub notified: u64,
    pub skipped: u64,
    pub errors: u64,
}

enum Outcome {
    Notified(i64),
    Skipped(&'static str),
}

/// Turns usage telemetry into low-data push notifications, at most one per level per renotify window.
pub struct UsageThresholdNotifier<B> {
    db: B,
    registry: Arc<ProviderRegistry>,
    notifier: Arc<dyn PushNotifier>,
    clock: Arc<dyn Clock>,
    adapter_timeout: Duration,
}

impl<B> UsageThresholdNotifier<B>
where B: OrderManagement + CatalogManagement + NotificationStateManagement + SettingsStore
{
    pub fn new(
        db: B,
        registry: Arc<ProviderRegistry>,
        notifier: Arc<dyn PushNotifier>,
        clock: Arc<dyn Clock>,
        adapter_timeout: Duration,
    ) -> Self {
        Self { db, registry, notifier, clock, adapter_timeout }
    }

    pub async fn run_notification_pass(&self) -> Result<NotificationReport, StorageError> {
        let orders = self
            .db
            .fetch_orders_by_status(&[OrderStatusType::Completed])
            .await?
            .into_iter()
            .filter(|o| o.iccid.as_deref().is_some_and(|i| !i.is_empty()))
            .collect::<Vec<_>>();
        let mut report = NotificationReport::default();
        let mut slugs = HashMap::new();
        for order in &orders {
            report.examined += 1;
            match self.process_order(order, &mut slugs).await {
                Ok(Outcome::Notified(level)) => {
                    debug!("📲️ User {} notified of {level}% usage on order {}", order.user_id, order.display_order_id);
                    report.notified += 1;
                },
                Ok(Outcome::Skipped(reason)) => {
                    trace!("📲️ Order {} skipped: {reason}", order.display_order_id);
                    report.skipped += 1;
                },
                Err(e) => {
                    warn!("📲️ Usage check for order {} failed: {e}", order.display_order_id);
                    report.errors += 1;
                },
            }
        }
        self.db.write_cursor(&cursor_key(USAGE_NOTIFICATION_JOB_NAME), self.clock.now()).await?;
        info!(
            "📲️ Usage notification pass complete. {} examined, {} notified, {} skipped, {} errors",
            report.examined, report.notified, report.skipped, report.errors
        );
        Ok(report)
    }

    async fn process_order(&self, order: &Order, slugs: &mut HashMap<i64, String>) -> Result<Outcome, String> {
        let Some(iccid) = order.iccid.as_deref() else {
            return Ok(Outcome::Skipped("no iccid"));
        };
        let Some(state) = self.db.fetch_notification_state(&order.user_id).await.map_err(|e| e.to_string())? else {
            return Ok(Outcome::Skipped("no notification preferences"));
        };
        let Some(token) = state.low_data_token() else {
            return Ok(Outcome::Skipped("notifications disabled or no push token"));
        };
        let usage = self.usage_for(order, iccid, slugs).await?;
        if !usage.is_valid() {
            return Ok(Outcome::Skipped("invalid usage reading"));
        }
        let Some(level) = crossed_level(usage.percentage_used) else {
            return Ok(Outcome::Skipped("below every threshold"));
        };
        let now = self.clock.now();
        if !should_notify(level, &state, now) {
            return Ok(Outcome::Skipped("already notified"));
        }
        let notification = low_data_notification(level);
        let data = low_data_payload(level, iccid);
        self.notifier.send(token, &notification, &data).await.map_err(|e| e.to_string())?;
        self.db.record_low_data_notification(&order.user_id, level, now).await.map_err(|e| e.to_string())?;
        Ok(Outcome::Notified(level))
    }

    async fn usage_for(
        &self,
        order: &Order,
        iccid: &str,
        slugs: &mut HashMap<i64, String>,
    ) -> Result<UsageData, String> {
        let adapter = self.adapter_for(order.provider_id, slugs).await?;
        match tokio::time::timeout(self.adapter_timeout, adapter.get_usage_data(iccid)).await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(_) => Err(format!("No usage data within {}s", self.adapter_timeout.as_secs())),
        }
    }

    async fn adapter_for(
        &self,
        provider_id: i64,
        slugs: &mut HashMap<i64, String>,
    ) -> Result<Arc<dyn ProviderAdapter>, String> {
        let slug = match slugs.get(&provider_id) {
            Some(slug) => slug.clone(),
            None => {
                let provider = self
                    .db
                    .fetch_provider(provider_id)
                    .await
                    .map_err(|e| e.to_string())?
                    .ok_or_else(|| format!("Provider #{provider_id} does not exist"))?;
                slugs.insert(provider_id, provider.slug.clone());
                provider.slug
            },
        };
        self.registry.get(&slug).map_err(|e| e.to_string())
    }
}

#[async_trait]
impl<B> ScheduledJob for UsageThresholdNotifier<B>
where B: OrderManagement + CatalogManagement + NotificationStateManagement + SettingsStore
{
    fn name(&self) -> &str {
        USAGE_NOTIFICATION_JOB_NAME
    }

    async fn run(&self) -> Result<(), JobError> {
        self.run_notification_pass().await?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn state(level: i64, notified_at: Option<DateTime<Utc>>) -> UserNotificationState {
        UserNotificationState {
            user_id: "u1".into(),
            fcm_token: Some("token".into()),
            notify_low_data: true,
            last_low_data_notified_at: notified_at,
            last_low_data_level: level,
        }
    }

    #[test]
    fn levels() {
        assert_eq!(crossed_level(5.0), None);
        assert_eq!(crossed_level(10.0), Some(10));
        assert_eq!(crossed_level(70.0), Some(10));
        assert_eq!(crossed_level(81.0), Some(80));
        assert_eq!(crossed_level(94.9), Some(90));
        assert_eq!(crossed_level(100.0), Some(95));
        assert_eq!(crossed_level(f64::NAN), None);
        assert_eq!(crossed_level(-3.0), None);
    }

    #[test]
    fn dedup_rules() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        assert!(should_notify(10, &state(0, None), now));
        assert!(should_notify(80, &state(10, Some(now)), now));
        assert!(!should_notify(80, &state(80, Some(now - Duration::hours(1))), now));
        assert!(!should_notify(80, &state(80, Some(now - Duration::hours(24))), now));
        assert!(should_notify(80, &state(80, Some(now - Duration::hours(25))), now));
        assert!(!should_notify(10, &state(80, Some(now - Duration::days(30))), now));
    }
}
