//! Statistics cache configuration.
//!
//! Built from the `[stats]` section of `event-stats.toml`.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::time::Duration;

use crate::application::transform::RoundingPolicy;
use crate::domain::types::StatisticType;

pub const DEFAULT_NAMESPACE: &str = "event_stats";
pub const DEFAULT_TTL_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_REGENERATION_DELAY_SECS: u64 = 60;
pub const DEFAULT_CROSS_CATEGORY_CAP: usize = 5;
pub const DEFAULT_STORE_CAPACITY: usize = 10_000;

#[derive(Debug, Clone)]
pub struct StatsCacheConfig {
    /// Serve reads through the cache store. When off, every read computes.
    pub enabled: bool,
    /// Prefix shared by every key; cleared as a whole on change.
    pub namespace: String,
    /// Lifetime of a cached value.
    pub ttl_seconds: u64,
    /// Debounce window between invalidation and regeneration.
    pub regeneration_delay_seconds: u64,
    /// Cross-category entries planned per ordered category pair.
    pub cross_category_cap: usize,
    /// Categories the planner never warms.
    pub excluded_categories: Vec<String>,
    /// Maximum entries held by the in-memory store.
    pub store_capacity: usize,
    /// Round a statistic down to a multiple before it is cached.
    pub rounding: BTreeMap<StatisticType, u64>,
}

impl Default for StatsCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: DEFAULT_NAMESPACE.to_string(),
            ttl_seconds: DEFAULT_TTL_SECS,
            regeneration_delay_seconds: DEFAULT_REGENERATION_DELAY_SECS,
            cross_category_cap: DEFAULT_CROSS_CATEGORY_CAP,
            excluded_categories: Vec::new(),
            store_capacity: DEFAULT_STORE_CAPACITY,
            rounding: BTreeMap::new(),
        }
    }
}

impl From<&crate::config::StatsSettings> for StatsCacheConfig {
    fn from(settings: &crate::config::StatsSettings) -> Self {
        Self {
            enabled: settings.enabled,
            namespace: settings.namespace.clone(),
            ttl_seconds: settings.ttl.as_secs(),
            regeneration_delay_seconds: settings.regeneration_delay.as_secs(),
            cross_category_cap: settings.cross_category_cap,
            excluded_categories: settings.excluded_categories.clone(),
            store_capacity: settings.store_capacity.get(),
            rounding: settings.rounding.clone(),
        }
    }
}

impl StatsCacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    pub fn regeneration_delay(&self) -> Duration {
        Duration::from_secs(self.regeneration_delay_seconds)
    }

    /// Store capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn store_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.store_capacity).unwrap_or(NonZeroUsize::MIN)
    }

    /// Rounding transform for the configured multiples, if any apply.
    pub fn rounding_policy(&self) -> Option<RoundingPolicy> {
        let policy = RoundingPolicy::new(self.rounding.clone());
        (!policy.is_empty()).then_some(policy)
    }
}
