//! # Section Mapping Cache
//!
//! Item → section lookups are one request per item. The board refreshes
//! often and sees the same items again and again, so answers are kept in a
//! `moka` cache with a TTL (5 minutes by default).
//!
//! ```text
//! resolve([100, 200, 300])
//!   ├── 100 ─► cache hit
//!   ├── 200 ─► GET /v1/core-pos/sections/item/200 ─┐  concurrently
//!   └── 300 ─► GET /v1/core-pos/sections/item/300 ─┘
//!                    │
//!                    ▼
//!   SectionMap { 100: Grill, 200: Bar }     (300 failed → left unmapped)
//! ```
//!
//! "No section" answers are cached too. Failed lookups are not.

use std::sync::Arc;

use corepos_core::section::{SectionInfo, SectionMap};
use futures::future::join_all;
use moka::future::Cache;
use tracing::{debug, warn};

use crate::api::PosApi;
use crate::config::KitchenSettings;
use crate::error::ApiResult;

#[derive(Clone)]
pub struct SectionCache {
    items: Cache<i64, Option<SectionInfo>>,
    sections: Cache<(), Arc<Vec<SectionInfo>>>,
}

impl SectionCache {
    pub fn new(settings: &KitchenSettings) -> Self {
        SectionCache {
            items: Cache::builder()
                .max_capacity(settings.section_cache_capacity)
                .time_to_live(settings.section_cache_ttl())
                .build(),
            sections: Cache::builder()
                .max_capacity(1)
                .time_to_live(settings.section_cache_ttl())
                .build(),
        }
    }

    /// Section for one item, from the cache or the backend.
    pub async fn item_section(&self, api: &dyn PosApi, item_id: i64) -> ApiResult<Option<SectionInfo>> {
        if let Some(cached) = self.items.get(&item_id).await {
            debug!(item_id, "Section cache hit");
            return Ok(cached);
        }

        let section = api.item_section(item_id).await?;
        self.items.insert(item_id, section.clone()).await;
        Ok(section)
    }

    /// Resolves every id concurrently.
    ///
    /// Items without a section and items whose lookup failed are absent
    /// from the result; the projection then falls back to the section on
    /// the order line itself.
    pub async fn resolve(&self, api: &dyn PosApi, item_ids: &[i64]) -> SectionMap {
        let lookups = item_ids.iter().map(|&id| async move {
            (id, self.item_section(api, id).await)
        });

        let mut mapping = SectionMap::new();
        let mut failed = 0usize;
        for (item_id, result) in join_all(lookups).await {
            match result {
                Ok(Some(section)) => {
                    mapping.insert(item_id, section);
                }
                Ok(None) => {}
                Err(e) => {
                    failed += 1;
                    warn!(item_id, error = %e, "Section lookup failed");
                }
            }
        }

        debug!(requested = item_ids.len(), mapped = mapping.len(), failed, "Resolved sections");
        mapping
    }

    /// All sections, cached under the same TTL.
    pub async fn all_sections(&self, api: &dyn PosApi) -> ApiResult<Arc<Vec<SectionInfo>>> {
        if let Some(cached) = self.sections.get(&()).await {
            return Ok(cached);
        }
        let sections = Arc::new(api.list_sections().await?);
        self.sections.insert((), Arc::clone(&sections)).await;
        Ok(sections)
    }

    pub async fn invalidate_item(&self, item_id: i64) {
        self.items.invalidate(&item_id).await;
    }

    pub fn invalidate_all(&self) {
        self.items.invalidate_all();
        self.sections.invalidate_all();
    }
}

impl std::fmt::Debug for SectionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SectionCache")
            .field("items", &self.items.entry_count())
            .finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakePosApi;
    use crate::error::ApiError;
    use corepos_core::types::SectionType;

    fn grill() -> SectionInfo {
        SectionInfo { section_id: 1, section_type: SectionType::Kitchen, name: "Grill".into() }
    }

    fn api() -> FakePosApi {
        let api = FakePosApi::new();
        api.state().sections.insert(100, grill());
        api.state().sections.insert(
            200,
            SectionInfo { section_id: 2, section_type: SectionType::Bar, name: "Bar".into() },
        );
        api
    }

    #[tokio::test]
    async fn test_resolve_caches_answers() {
        let api = api();
        let cache = SectionCache::new(&KitchenSettings::default());

        let mapping = cache.resolve(&api, &[100, 200, 300]).await;
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping[&100], grill());
        assert_eq!(api.calls("item_section"), 3);

        // Hits, including the cached "no section" for 300.
        cache.resolve(&api, &[100, 200, 300]).await;
        assert_eq!(api.calls("item_section"), 3);

        cache.invalidate_item(100).await;
        cache.resolve(&api, &[100]).await;
        assert_eq!(api.calls("item_section"), 4);
    }

    #[tokio::test]
    async fn test_failed_lookup_left_unmapped_and_retried() {
        let api = api();
        api.fail("item_section", 1, ApiError::network("timeout"));
        let cache = SectionCache::new(&KitchenSettings::default());

        let mapping = cache.resolve(&api, &[100]).await;
        assert!(mapping.is_empty());

        let mapping = cache.resolve(&api, &[100]).await;
        assert_eq!(mapping.len(), 1);
        assert_eq!(api.calls("item_section"), 2);
    }

    #[tokio::test]
    async fn test_all_sections_cached() {
        let api = api();
        let cache = SectionCache::new(&KitchenSettings::default());

        assert_eq!(cache.all_sections(&api).await.unwrap().len(), 2);
        assert_eq!(cache.all_sections(&api).await.unwrap().len(), 2);
        assert_eq!(api.calls("list_sections"), 1);

        cache.invalidate_all();
        cache.all_sections(&api).await.unwrap();
        assert_eq!(api.calls("list_sections"), 2);
    }
}
