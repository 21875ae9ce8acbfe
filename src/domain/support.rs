//! Which statistic types each item type exposes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::types::StatisticType;

/// Statistic toggles for a single item type.
pub type StatisticSupport = BTreeMap<StatisticType, bool>;

/// Snapshot of `item_type -> {statistic -> enabled}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupportConfig {
    item_types: BTreeMap<String, StatisticSupport>,
}

impl SupportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, item_type: impl Into<String>, support: StatisticSupport) {
        self.item_types.insert(item_type.into(), support);
    }

    pub fn with_item_type<I>(mut self, item_type: impl Into<String>, enabled: I) -> Self
    where
        I: IntoIterator<Item = StatisticType>,
    {
        let support = enabled.into_iter().map(|statistic| (statistic, true)).collect();
        self.insert(item_type, support);
        self
    }

    pub fn item_types(&self) -> impl Iterator<Item = &str> {
        self.item_types.keys().map(String::as_str)
    }

    pub fn get(&self, item_type: &str) -> Option<&StatisticSupport> {
        self.item_types.get(item_type)
    }

    /// True when at least one item type has any statistic enabled.
    pub fn any_enabled(&self) -> bool {
        self.item_types
            .values()
            .any(|support| support.values().any(|enabled| *enabled))
    }

    pub fn is_item_type_enabled(&self, item_type: &str) -> bool {
        self.item_types
            .get(item_type)
            .is_some_and(|support| support.values().any(|enabled| *enabled))
    }

    /// Item types with `statistic` switched on, in a stable order.
    pub fn item_types_for(&self, statistic: StatisticType) -> Vec<String> {
        self.item_types
            .iter()
            .filter(|(_, support)| support.get(&statistic).copied().unwrap_or(false))
            .map(|(item_type, _)| item_type.clone())
            .collect()
    }

    pub fn is_enabled(&self, statistic: StatisticType) -> bool {
        self.item_types
            .values()
            .any(|support| support.get(&statistic).copied().unwrap_or(false))
    }
}
