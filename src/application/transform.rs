//! Post-processing hooks applied to every computed statistic.

use std::collections::BTreeMap;

use crate::domain::filters::StatsQuery;
use crate::domain::types::StatisticType;

/// Adjusts a computed value before it is cached or returned.
///
/// Transforms run inside the dispatcher, so a cold read and a pre-warmed
/// entry for the same query always carry the same value.
pub trait ValueTransform: Send + Sync {
    fn transform(&self, query: &StatsQuery, value: u64) -> u64;
}

/// Rounds selected statistics down to a multiple, e.g. 47 events -> "40+".
#[derive(Debug, Clone, Default)]
pub struct RoundingPolicy {
    multiples: BTreeMap<StatisticType, u64>,
}

impl RoundingPolicy {
    pub fn new(multiples: BTreeMap<StatisticType, u64>) -> Self {
        // a multiple of 0 or 1 is a no-op
        let multiples = multiples
            .into_iter()
            .filter(|(_, multiple)| *multiple > 1)
            .collect();
        Self { multiples }
    }

    pub fn is_empty(&self) -> bool {
        self.multiples.is_empty()
    }
}

impl ValueTransform for RoundingPolicy {
    fn transform(&self, query: &StatsQuery, value: u64) -> u64 {
        match self.multiples.get(&query.statistic) {
            Some(multiple) => value - value % multiple,
            None => value,
        }
    }
}
