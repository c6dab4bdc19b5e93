use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    adapters::{ProviderError, ProviderRegistry, SyncResult},
    catalog::{MergeReport, UnifiedCatalogMerge},
    db::traits::{cursor_key, CatalogManagement, SettingsStore, StorageError},
    db_types::Provider,
    events::{CatalogSyncedEvent, EventProducers},
    scheduler::{Clock, JobError, RunningGuard, ScheduledJob},
};

pub const CATALOG_JOB_NAME: &str = "catalog";

#[derive(Debug, Clone, Error)]
pub enum CatalogSyncError {
    #[error("A catalog sync pass is already running")]
    AlreadyRunning,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// The outcome of syncing one provider within a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSyncResult {
    pub provider: String,
    pub success: bool,
    pub packages_synced: u64,
    pub packages_updated: u64,
    pub packages_removed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge: Option<MergeReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ProviderSyncResult {
    fn failed(provider: &str, message: String) -> Self {
        Self {
            provider: provider.to_string(),
            success: false,
            packages_synced: 0,
            packages_updated: 0,
            packages_removed: 0,
            merge: None,
            error_message: Some(message),
        }
    }
}

/// The outcome of a full pass. `success` only reports that the pass itself ran; per-provider failures are in
/// `providers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSyncReport {
    pub success: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub providers: Vec<ProviderSyncResult>,
}

impl CatalogSyncReport {
    pub fn failed_providers(&self) -> impl Iterator<Item = &ProviderSyncResult> {
        self.providers.iter().filter(|p| !p.success)
    }
}

/// Pulls every enabled provider's catalog, one provider at a time, and folds the results into the unified catalog.
///
/// The scheduler and the manual sync endpoint both call [`CatalogSyncOrchestrator::run_sync_pass`]. At most one pass
/// runs at a time, whoever started it; a second caller gets [`CatalogSyncError::AlreadyRunning`].
pub struct CatalogSyncOrchestrator<B> {
    db: B,
    registry: Arc<ProviderRegistry>,
    merge: UnifiedCatalogMerge<B>,
    clock: Arc<dyn Clock>,
    adapter_timeout: Duration,
    producers: EventProducers,
    running: AtomicBool,
}

impl<B> CatalogSyncOrchestrator<B>
where B: CatalogManagement + SettingsStore
{
    pub fn new(db: B, registry: Arc<ProviderRegistry>, clock: Arc<dyn Clock>, adapter_timeout: Duration) -> Self {
        let merge = UnifiedCatalogMerge::new(db.clone());
        Self {
            db,
            registry,
            merge,
            clock,
            adapter_timeout,
            producers: EventProducers::default(),
            running: AtomicBool::new(false),
        }
    }

    pub fn with_producers(mut self, producers: EventProducers) -> Self {
        self.producers = producers;
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn run_sync_pass(&self) -> Result<CatalogSyncReport, CatalogSyncError> {
        if self.running.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            info!("🔄️ A catalog sync pass is already running");
            return Err(CatalogSyncError::AlreadyRunning);
        }
        let _guard = RunningGuard::new(&self.running);
        let started_at = self.clock.now();
        let providers = self.db.fetch_enabled_providers().await?;
        info!("🔄️ Catalog sync started for {} providers", providers.len());
        let mut results = Vec::with_capacity(providers.len());
        for provider in &providers {
            let result = self.sync_provider(provider).await;
            match &result.error_message {
                None => info!(
                    "🔄️ {} synced. {} packages, {} updated, {} removed",
                    provider.slug, result.packages_synced, result.packages_updated, result.packages_removed
                ),
                Some(e) => warn!("🔄️ Catalog sync for {} failed: {e}", provider.slug),
            }
            results.push(result);
        }
        if let Err(e) = self.merge.merge_disabled_providers().await {
            warn!("🔄️ Could not re-evaluate the catalog entries of disabled providers. {e}");
        }
        self.registry.clear_cache();
        let finished_at = self.clock.now();
        self.db.write_cursor(&cursor_key(CATALOG_JOB_NAME), finished_at).await?;
        let failures = results.iter().filter(|r| !r.success).count();
        info!("🔄️ Catalog sync finished. {} providers succeeded, {failures} failed", results.len() - failures);
        Ok(CatalogSyncReport { success: true, started_at, finished_at, providers: results })
    }

    async fn sync_provider(&self, provider: &Provider) -> ProviderSyncResult {
        let slug = provider.slug.as_str();
        let sync = match self.fetch_catalog(slug).await {
            Ok(sync) => sync,
            Err(e) => return ProviderSyncResult::failed(slug, e.to_string()),
        };
        if let Some(message) = sync.error_message.clone() {
            return ProviderSyncResult::failed(slug, message);
        }
        let synced_at = self.clock.now();
        let merge = match self.record_success(provider, synced_at).await {
            Ok(()) => self.merge.merge_provider(slug).await,
            Err(e) => return ProviderSyncResult::failed(slug, e.to_string()),
        };
        let merge = match merge {
            Ok(report) => report,
            Err(e) => {
                let mut result = ProviderSyncResult::failed(slug, format!("Catalog merge failed. {e}"));
                result.packages_synced = sync.packages_synced;
                result.packages_updated = sync.packages_updated;
                result.packages_removed = sync.packages_removed;
                return result;
            },
        };
        let event = CatalogSyncedEvent { provider: slug.to_string(), synced_at, sync: sync.clone(), merge };
        self.producers.publish_catalog_synced(event).await;
        ProviderSyncResult {
            provider: slug.to_string(),
            success: true,
            packages_synced: sync.packages_synced,
            packages_updated: sync.packages_updated,
            packages_removed: sync.packages_removed,
            merge: Some(merge),
            error_message: None,
        }
    }

    async fn fetch_catalog(&self, slug: &str) -> Result<SyncResult, ProviderError> {
        let adapter = self.registry.get(slug)?;
        match tokio::time::timeout(self.adapter_timeout, adapter.sync_packages()).await {
            Ok(result) => result,
            Err(_) => {
                Err(ProviderError::Transient(format!("No response within {}s", self.adapter_timeout.as_secs())))
            },
        }
    }

    async fn record_success(&self, provider: &Provider, synced_at: DateTime<Utc>) -> Result<(), StorageError> {
        self.db.mark_provider_synced(provider.id, synced_at).await?;
        self.db.write_cursor(&cursor_key(&provider.slug), synced_at).await
    }
}

#[async_trait]
impl<B> ScheduledJob for CatalogSyncOrchestrator<B>
where B: CatalogManagement + SettingsStore
{
    fn name(&self) -> &str {
        CATALOG_JOB_NAME
    }

    async fn run(&self) -> Result<(), JobError> {
        match self.run_sync_pass().await {
            Ok(_) | Err(CatalogSyncError::AlreadyRunning) => Ok(()),
            Err(CatalogSyncError::Storage(e)) => Err(e.into()),
        }
    }
}
