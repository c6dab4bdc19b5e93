//! Catalog synchronisation: pulling each provider's offers and merging them into the unified catalog.
mod merge;
mod orchestrator;

pub use merge::{compare_offers, select_winner, MergeError, MergeReport, UnifiedCatalogMerge};
pub use orchestrator::{
    CatalogSyncError,
    CatalogSyncOrchestrator,
    CatalogSyncReport,
    ProviderSyncResult,
    CATALOG_JOB_NAME,
};
