//! Cache-through read path.

use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::application::aggregation::StatsCalculator;
use crate::application::error::StatsError;
use crate::domain::filters::{FilterSet, StatsQuery};
use crate::domain::types::StatisticType;
use crate::infra::telemetry::{METRIC_CACHE_HIT, METRIC_CACHE_MISS, METRIC_STORE_ERROR};

use super::config::StatsCacheConfig;
use super::keys::derive_key;
use super::store::{StatsStore, StoreError};

/// Why a forced recomputation did not land in the store.
#[derive(Debug, Error)]
pub enum WarmError {
    #[error(transparent)]
    Stats(#[from] StatsError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Serves statistics from the store, computing and caching on a miss.
///
/// Concurrent misses on the same key each compute and write; the last
/// writer wins. Every failure on this path resolves to a value, never an
/// error: invalid filters and source failures read as 0, store failures
/// read as a miss.
pub struct StatsCache {
    config: StatsCacheConfig,
    store: Arc<dyn StatsStore>,
    calculator: Arc<StatsCalculator>,
}

impl StatsCache {
    pub fn new(
        config: StatsCacheConfig,
        store: Arc<dyn StatsStore>,
        calculator: Arc<StatsCalculator>,
    ) -> Self {
        Self {
            config,
            store,
            calculator,
        }
    }

    pub fn config(&self) -> &StatsCacheConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn StatsStore> {
        &self.store
    }

    pub fn calculator(&self) -> &Arc<StatsCalculator> {
        &self.calculator
    }

    #[instrument(skip(self, filters), fields(statistic = %statistic))]
    pub async fn get_or_compute(&self, statistic: StatisticType, filters: &FilterSet) -> u64 {
        let query = match filters.validate(statistic) {
            Ok(query) => query,
            Err(err) => {
                debug!(error = %err, "rejected statistic request");
                return 0;
            }
        };

        if !self.config.enabled {
            return self.compute(&query).await.unwrap_or(0);
        }

        let key = match derive_key(&self.config.namespace, &query) {
            Ok(key) => key,
            Err(err) => {
                warn!(error = %err, "cache key derivation failed; computing uncached");
                return self.compute(&query).await.unwrap_or(0);
            }
        };

        match self.store.get(&key) {
            Ok(Some(value)) => {
                counter!(METRIC_CACHE_HIT, "statistic" => statistic.as_str()).increment(1);
                debug!(key = %key, value, "statistic cache hit");
                return value;
            }
            Ok(None) => {
                counter!(METRIC_CACHE_MISS, "statistic" => statistic.as_str()).increment(1);
            }
            Err(err) => {
                counter!(METRIC_STORE_ERROR, "op" => "get").increment(1);
                warn!(key = %key, error = %err, "cache store read failed; treating as miss");
            }
        }

        let Some(value) = self.compute(&query).await else {
            return 0;
        };

        if let Err(err) = self.store.set(&key, value, self.config.ttl()) {
            counter!(METRIC_STORE_ERROR, "op" => "set").increment(1);
            warn!(key = %key, error = %err, "cache store write failed");
        }
        value
    }

    /// Compute `query` and overwrite `key` without consulting the store.
    pub async fn warm(&self, key: &str, query: &StatsQuery) -> Result<u64, WarmError> {
        let value = self.calculator.calculate_query(query).await?;
        self.store.set(key, value, self.config.ttl()).inspect_err(|_| {
            counter!(METRIC_STORE_ERROR, "op" => "set").increment(1);
        })?;
        Ok(value)
    }

    /// Source failures are never cached.
    async fn compute(&self, query: &StatsQuery) -> Option<u64> {
        match self.calculator.calculate_query(query).await {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(error = %err, "statistic computation failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::MemoryStore;
    use crate::domain::support::SupportConfig;
    use crate::domain::types::TemporalPartition;
    use crate::infra::memory::{CatalogItem, InMemoryCatalog};

    struct BrokenStore;

    impl StatsStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<u64>, StoreError> {
            Err(StoreError::Unavailable("offline".into()))
        }

        fn set(
            &self,
            _key: &str,
            _value: u64,
            _ttl: std::time::Duration,
        ) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("offline".into()))
        }

        fn delete_by_prefix(&self, _prefix: &str) -> Result<usize, StoreError> {
            Err(StoreError::Unavailable("offline".into()))
        }

        fn len(&self) -> Result<usize, StoreError> {
            Err(StoreError::Unavailable("offline".into()))
        }
    }

    fn catalog() -> Arc<InMemoryCatalog> {
        let support = SupportConfig::new().with_item_type("event", StatisticType::ALL);
        let catalog = InMemoryCatalog::new(support);
        catalog.add_category("venue");
        catalog.add_term("venue", 1, "Hall");
        for id in 1..=3 {
            catalog.add_item(
                CatalogItem::new(id, "event", TemporalPartition::Upcoming).with_terms("venue", [1]),
            );
        }
        Arc::new(catalog)
    }

    fn cache_over(
        store: Arc<dyn StatsStore>,
        config: StatsCacheConfig,
    ) -> (StatsCache, Arc<InMemoryCatalog>) {
        let catalog = catalog();
        let calculator = Arc::new(StatsCalculator::new(catalog.clone(), catalog.clone()));
        (StatsCache::new(config, store, calculator), catalog)
    }

    #[tokio::test]
    async fn hit_serves_stale_value_until_invalidated() {
        let store = Arc::new(MemoryStore::new(&StatsCacheConfig::default()));
        let (cache, catalog) = cache_over(store.clone(), StatsCacheConfig::default());
        let filters = FilterSet::new(TemporalPartition::Upcoming);

        assert_eq!(cache.get_or_compute(StatisticType::TotalItems, &filters).await, 3);
        catalog.add_item(CatalogItem::new(9, "event", TemporalPartition::Upcoming));
        assert_eq!(cache.get_or_compute(StatisticType::TotalItems, &filters).await, 3);

        store.delete_by_prefix("event_stats:").unwrap();
        assert_eq!(cache.get_or_compute(StatisticType::TotalItems, &filters).await, 4);
    }

    #[tokio::test]
    async fn store_failures_fall_back_to_computation() {
        let (cache, _) = cache_over(Arc::new(BrokenStore), StatsCacheConfig::default());
        let filters = FilterSet::new(TemporalPartition::Upcoming).with_term("venue", 1);
        assert_eq!(
            cache.get_or_compute(StatisticType::ItemsInCategory, &filters).await,
            3
        );
    }

    #[tokio::test]
    async fn source_errors_are_not_cached() {
        let store = Arc::new(MemoryStore::new(&StatsCacheConfig::default()));
        let (cache, catalog) = cache_over(store.clone(), StatsCacheConfig::default());
        let filters = FilterSet::new(TemporalPartition::Upcoming).with_term("venue", 1);

        catalog.set_failing_category(Some("venue"));
        assert_eq!(
            cache.get_or_compute(StatisticType::ItemsInCategory, &filters).await,
            0
        );
        assert_eq!(store.len().unwrap(), 0);

        catalog.set_failing_category(None);
        assert_eq!(
            cache.get_or_compute(StatisticType::ItemsInCategory, &filters).await,
            3
        );
    }

    #[tokio::test]
    async fn disabled_cache_never_writes() {
        let store = Arc::new(MemoryStore::new(&StatsCacheConfig::default()));
        let config = StatsCacheConfig {
            enabled: false,
            ..Default::default()
        };
        let (cache, _) = cache_over(store.clone(), config);

        let filters = FilterSet::new(TemporalPartition::Upcoming);
        assert_eq!(cache.get_or_compute(StatisticType::TotalItems, &filters).await, 3);
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn warm_overwrites_existing_entry() {
        let store = Arc::new(MemoryStore::new(&StatsCacheConfig::default()));
        let (cache, _) = cache_over(store.clone(), StatsCacheConfig::default());
        let query = StatsQuery::total_items(TemporalPartition::Upcoming);
        let key = derive_key("event_stats", &query).unwrap();

        store.set(&key, 99, cache.config().ttl()).unwrap();
        assert_eq!(cache.warm(&key, &query).await.unwrap(), 3);
        assert_eq!(store.get(&key).unwrap(), Some(3));
    }
}
