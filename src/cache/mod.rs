//! Statistics cache.
//!
//! - **Read path**: [`StatsCache::get_or_compute`] checks the store, computes
//!   on a miss and writes the value back with the configured TTL.
//! - **Write path**: [`ChangeTrigger`] forwards upstream changes to the
//!   [`InvalidationCoordinator`], which clears the namespace and arms one
//!   debounced [`RegenerationRunner`] pass that re-warms the planned queries.
//!
//! ## Configuration
//!
//! ```toml
//! [stats]
//! enabled = true
//! namespace = "event_stats"
//! ttl_seconds = 86400
//! regeneration_delay_seconds = 60
//! cross_category_cap = 5
//! # ... see config.rs for all options
//! ```

mod accessor;
mod config;
mod coordinator;
mod events;
mod keys;
pub(crate) mod lock;
mod planner;
mod runner;
mod store;
mod trigger;

pub use accessor::{StatsCache, WarmError};
pub use config::{
    DEFAULT_CROSS_CATEGORY_CAP, DEFAULT_NAMESPACE, DEFAULT_REGENERATION_DELAY_SECS,
    DEFAULT_STORE_CAPACITY, DEFAULT_TTL_SECS, StatsCacheConfig,
};
pub use coordinator::{
    InvalidationCoordinator, InvalidationOutcome, PendingRegeneration, ScheduleOutcome,
};
pub use events::{ChangeEvent, ChangeSignal};
pub use keys::{KeyError, derive_key, namespace_prefix};
pub use planner::{RegenerationPlan, RegenerationPlanner};
pub use runner::{RegenerationFailure, RegenerationReport, RegenerationRunner};
pub use store::{CacheEntry, MemoryStore, StatsStore, StoreError};
pub use trigger::ChangeTrigger;
