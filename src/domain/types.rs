use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::FilterError;

/// Identifier of a schedulable item (an event).
pub type ItemId = u64;

/// Identifier of a term within a category.
pub type TermId = u64;

/// The aggregation queries the engine knows how to answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatisticType {
    TotalItems,
    ItemsInCategory,
    ItemsInMultipleCategories,
    TotalTermsInCategory,
    CrossCategoryTerms,
    TotalNumericSum,
}

impl StatisticType {
    pub const ALL: [StatisticType; 6] = [
        StatisticType::TotalItems,
        StatisticType::ItemsInCategory,
        StatisticType::ItemsInMultipleCategories,
        StatisticType::TotalTermsInCategory,
        StatisticType::CrossCategoryTerms,
        StatisticType::TotalNumericSum,
    ];

    /// Stable tag written into cache keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            StatisticType::TotalItems => "total_items",
            StatisticType::ItemsInCategory => "items_in_category",
            StatisticType::ItemsInMultipleCategories => "items_in_multiple_categories",
            StatisticType::TotalTermsInCategory => "total_terms_in_category",
            StatisticType::CrossCategoryTerms => "cross_category_terms",
            StatisticType::TotalNumericSum => "total_numeric_sum",
        }
    }
}

impl fmt::Display for StatisticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatisticType {
    type Err = FilterError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        StatisticType::ALL
            .into_iter()
            .find(|statistic| statistic.as_str() == value)
            .ok_or_else(|| FilterError::UnknownStatistic(value.to_string()))
    }
}

/// Mandatory split of items into upcoming and past. There is no "all".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TemporalPartition {
    #[default]
    Upcoming,
    Past,
}

impl TemporalPartition {
    pub const BOTH: [TemporalPartition; 2] = [TemporalPartition::Upcoming, TemporalPartition::Past];

    pub fn as_str(&self) -> &'static str {
        match self {
            TemporalPartition::Upcoming => "upcoming",
            TemporalPartition::Past => "past",
        }
    }
}

impl fmt::Display for TemporalPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemporalPartition {
    type Err = FilterError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "upcoming" => Ok(TemporalPartition::Upcoming),
            "past" => Ok(TemporalPartition::Past),
            other => Err(FilterError::InvalidPartition(other.to_string())),
        }
    }
}

/// A term as reported by the data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub id: TermId,
    pub category: String,
    pub name: String,
    /// Number of qualifying items the term is attached to.
    pub item_count: u64,
}
