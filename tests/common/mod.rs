//! Shared fixture: fifteen events tagged across two categories.
//!
//! | ids   | topic | venue | partition |
//! |-------|-------|-------|-----------|
//! | 1-4   | 1     | 11    | upcoming  |
//! | 5-6   | 1     | 12    | past      |
//! | 7     | 1     | 12    | upcoming  |
//! | 8     | 2     | 12    | past      |
//! | 9     | 2     | 12    | upcoming  |
//! | 10    | 3     | 13    | past      |
//! | 11-13 | -     | -     | past      |
//! | 14-15 | -     | -     | upcoming  |

#![allow(dead_code)]

use std::sync::Arc;

use event_stats::{
    application::aggregation::StatsCalculator,
    cache::{
        ChangeTrigger, InvalidationCoordinator, MemoryStore, RegenerationPlanner,
        RegenerationRunner, StatsCache, StatsCacheConfig,
    },
    domain::{
        support::SupportConfig,
        types::{ItemId, StatisticType, TemporalPartition, TermId},
    },
    infra::{
        memory::{CatalogItem, InMemoryCatalog},
        scheduler::ManualScheduler,
    },
    util::clock::ManualClock,
};

pub const TOPIC: &str = "topic";
pub const VENUE: &str = "venue";

pub const TOPIC_1: TermId = 1;
pub const TOPIC_2: TermId = 2;
pub const TOPIC_3: TermId = 3;
pub const VENUE_1: TermId = 11;
pub const VENUE_2: TermId = 12;
pub const VENUE_3: TermId = 13;

const NUMERIC: [i64; 15] = [10, 20, 5, 15, 30, 25, 40, 12, 8, 50, 7, 3, 1, 2, 4];

fn tagged(id: ItemId, partition: TemporalPartition, topic: TermId, venue: TermId) -> CatalogItem {
    CatalogItem::new(id, "event", partition)
        .with_terms(TOPIC, [topic])
        .with_terms(VENUE, [venue])
        .with_numeric(NUMERIC[(id - 1) as usize])
}

fn untagged(id: ItemId, partition: TemporalPartition) -> CatalogItem {
    CatalogItem::new(id, "event", partition).with_numeric(NUMERIC[(id - 1) as usize])
}

pub fn scenario_catalog() -> Arc<InMemoryCatalog> {
    use TemporalPartition::{Past, Upcoming};

    let catalog = InMemoryCatalog::new(
        SupportConfig::new().with_item_type("event", StatisticType::ALL),
    );
    for (id, name) in [(TOPIC_1, "Rust"), (TOPIC_2, "Databases"), (TOPIC_3, "Security")] {
        catalog.add_term(TOPIC, id, name);
    }
    for (id, name) in [(VENUE_1, "Hall"), (VENUE_2, "Annex"), (VENUE_3, "Rooftop")] {
        catalog.add_term(VENUE, id, name);
    }

    for id in 1..=4 {
        catalog.add_item(tagged(id, Upcoming, TOPIC_1, VENUE_1));
    }
    catalog.add_item(tagged(5, Past, TOPIC_1, VENUE_2));
    catalog.add_item(tagged(6, Past, TOPIC_1, VENUE_2));
    catalog.add_item(tagged(7, Upcoming, TOPIC_1, VENUE_2));
    catalog.add_item(tagged(8, Past, TOPIC_2, VENUE_2));
    catalog.add_item(tagged(9, Upcoming, TOPIC_2, VENUE_2));
    catalog.add_item(tagged(10, Past, TOPIC_3, VENUE_3));
    for id in 11..=13 {
        catalog.add_item(untagged(id, Past));
    }
    for id in 14..=15 {
        catalog.add_item(untagged(id, Upcoming));
    }

    Arc::new(catalog)
}

/// Full engine over the scenario catalog with a virtual clock and scheduler.
pub struct Harness {
    pub config: StatsCacheConfig,
    pub catalog: Arc<InMemoryCatalog>,
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryStore>,
    pub cache: Arc<StatsCache>,
    pub scheduler: Arc<ManualScheduler>,
    pub coordinator: Arc<InvalidationCoordinator>,
    pub trigger: ChangeTrigger,
}

impl Harness {
    pub fn new(config: StatsCacheConfig) -> Self {
        let catalog = scenario_catalog();
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(MemoryStore::with_clock(&config, clock.clone()));
        let calculator = Arc::new(StatsCalculator::new(catalog.clone(), catalog.clone()));
        let cache = Arc::new(StatsCache::new(config.clone(), store.clone(), calculator));
        let planner =
            RegenerationPlanner::new(&config, catalog.clone(), catalog.clone(), catalog.clone());
        let runner = Arc::new(RegenerationRunner::new(cache.clone(), planner));
        let scheduler = Arc::new(ManualScheduler::new());
        let coordinator = Arc::new(InvalidationCoordinator::new(
            config.clone(),
            store.clone(),
            scheduler.clone(),
            runner,
        ));
        let trigger = ChangeTrigger::new(config.clone(), catalog.clone(), coordinator.clone());

        Self {
            config,
            catalog,
            clock,
            store,
            cache,
            scheduler,
            coordinator,
            trigger,
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new(StatsCacheConfig::default())
    }
}
