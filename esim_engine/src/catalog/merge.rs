use std::{cmp::Ordering, collections::BTreeSet};

use log::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    db::traits::{CatalogManagement, StorageError},
    db_types::{CatalogKey, CatalogOffer, NewUnifiedPackage, UpsertResult},
};

#[derive(Debug, Clone, Error)]
pub enum MergeError {
    #[error("Provider {0} does not exist")]
    UnknownProvider(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    pub created: u64,
    pub updated: u64,
    pub deactivated: u64,
}

impl MergeReport {
    pub fn has_changes(&self) -> bool {
        self.created + self.updated + self.deactivated > 0
    }
}

/// Orders offers from most to least attractive: lowest customer price, then preferred providers, then the lowest
/// provider id. The package id settles duplicates within a provider so the ordering is total.
pub fn compare_offers(a: &CatalogOffer, b: &CatalogOffer) -> Ordering {
    a.customer_price()
        .cmp(&b.customer_price())
        .then_with(|| b.is_preferred.cmp(&a.is_preferred))
        .then_with(|| a.provider_id.cmp(&b.provider_id))
        .then_with(|| a.package_id.cmp(&b.package_id))
}

pub fn select_winner(offers: &[CatalogOffer]) -> Option<&CatalogOffer> {
    offers.iter().min_by(|a, b| compare_offers(a, b))
}

/// Folds one provider's raw packages into the cross-provider catalog.
pub struct UnifiedCatalogMerge<B> {
    db: B,
}

impl<B: CatalogManagement> UnifiedCatalogMerge<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Re-evaluates every catalog key the provider takes part in: keys of its active packages, and keys it currently
    /// wins (so that rows pointing at packages it no longer offers are handed to the next best offer or retired).
    pub async fn merge_provider(&self, slug: &str) -> Result<MergeReport, MergeError> {
        let provider = self
            .db
            .fetch_provider_by_slug(slug)
            .await?
            .ok_or_else(|| MergeError::UnknownProvider(slug.to_string()))?;
        let mut keys = self
            .db
            .fetch_active_packages(provider.id)
            .await?
            .iter()
            .map(|p| p.catalog_key())
            .collect::<BTreeSet<_>>();
        keys.extend(self.db.fetch_unified_for_provider(provider.id).await?.iter().map(|u| u.catalog_key()));
        trace!("🗂️ Merging {} catalog keys for {slug}", keys.len());
        let mut report = MergeReport::default();
        for key in keys {
            self.merge_key(&key, &mut report).await?;
        }
        info!(
            "🗂️ Catalog merge for {slug} complete. {} created, {} updated, {} deactivated",
            report.created, report.updated, report.deactivated
        );
        Ok(report)
    }

    /// Re-evaluates the catalog keys still won by disabled providers. Each is handed to the best enabled offer, or
    /// withdrawn when there is none.
    pub async fn merge_disabled_providers(&self) -> Result<MergeReport, MergeError> {
        let mut report = MergeReport::default();
        for provider in self.db.fetch_providers().await?.into_iter().filter(|p| !p.enabled) {
            let keys = self
                .db
                .fetch_unified_for_provider(provider.id)
                .await?
                .iter()
                .map(|u| u.catalog_key())
                .collect::<BTreeSet<_>>();
            if keys.is_empty() {
                continue;
            }
            debug!("🗂️ {} is disabled but still wins {} catalog keys", provider.slug, keys.len());
            for key in keys {
                self.merge_key(&key, &mut report).await?;
            }
        }
        if report.has_changes() {
            info!(
                "🗂️ Catalog entries of disabled providers re-evaluated. {} updated, {} deactivated",
                report.updated, report.deactivated
            );
        }
        Ok(report)
    }

    async fn merge_key(&self, key: &CatalogKey, report: &mut MergeReport) -> Result<(), StorageError> {
        let offers = self.db.fetch_offers_for_key(key).await?;
        match select_winner(&offers) {
            Some(winner) => {
                let row = NewUnifiedPackage {
                    key: key.clone(),
                    provider_id: winner.provider_id,
                    package_id: winner.package_id,
                    base_price: winner.price,
                    customer_price: winner.customer_price(),
                    currency: winner.currency.clone(),
                };
                match self.db.upsert_unified_package(row).await? {
                    UpsertResult::Created(id) => {
                        debug!("🗂️ {key} added to the catalog as #{id} at {}", winner.customer_price());
                        report.created += 1;
                    },
                    UpsertResult::Updated(id) => {
                        debug!("🗂️ Catalog entry #{id} ({key}) now sells at {}", winner.customer_price());
                        report.updated += 1;
                    },
                    UpsertResult::Unchanged(_) => {},
                }
            },
            None => {
                if self.db.deactivate_unified_package(key).await? {
                    debug!("🗂️ {key} has no live offers left and was withdrawn from the catalog");
                    report.deactivated += 1;
                }
            },
        }
        Ok(())
    }
}
