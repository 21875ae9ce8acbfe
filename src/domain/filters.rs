//! Filter grammar for statistic requests.
//!
//! `FilterSet` is the loose parameter bag handed in by callers. It is turned
//! into a `StatsQuery` by [`FilterSet::validate`], which is the only way to
//! obtain a query the cache and the aggregation layer accept. Ordered maps and
//! sets keep the validated form canonical, so logically identical requests
//! serialize (and therefore hash) identically.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::error::FilterError;
use super::types::{StatisticType, TemporalPartition, TermId};

/// Raw filters as supplied by the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSet {
    /// Kept as a raw string so missing and invalid values reach validation.
    pub temporal_partition: Option<String>,
    pub category: Option<String>,
    pub term_id: Option<TermId>,
    pub category_terms: BTreeMap<String, BTreeSet<TermId>>,
    pub count_category: Option<String>,
    pub filter_category: Option<String>,
}

impl FilterSet {
    pub fn new(partition: TemporalPartition) -> Self {
        Self {
            temporal_partition: Some(partition.as_str().to_string()),
            ..Default::default()
        }
    }

    pub fn with_partition_str(mut self, partition: impl Into<String>) -> Self {
        self.temporal_partition = Some(partition.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_term(mut self, category: impl Into<String>, term_id: TermId) -> Self {
        self.category = Some(category.into());
        self.term_id = Some(term_id);
        self
    }

    pub fn with_category_terms<I>(mut self, category: impl Into<String>, terms: I) -> Self
    where
        I: IntoIterator<Item = TermId>,
    {
        self.category_terms
            .entry(category.into())
            .or_default()
            .extend(terms);
        self
    }

    pub fn with_cross_category(
        mut self,
        count_category: impl Into<String>,
        filter_category: impl Into<String>,
        term_id: TermId,
    ) -> Self {
        self.count_category = Some(count_category.into());
        self.filter_category = Some(filter_category.into());
        self.term_id = Some(term_id);
        self
    }

    /// Request-layer defaulting: a missing partition becomes `upcoming`.
    ///
    /// Invalid values are left untouched so they still fail validation.
    pub fn or_default_partition(mut self) -> Self {
        if self.temporal_partition.is_none() {
            self.temporal_partition = Some(TemporalPartition::default().as_str().to_string());
        }
        self
    }

    /// Validate the filters for `statistic` and produce a canonical query.
    pub fn validate(&self, statistic: StatisticType) -> Result<StatsQuery, FilterError> {
        let partition = match self.temporal_partition.as_deref() {
            None => return Err(FilterError::MissingPartition),
            Some(raw) => raw.parse::<TemporalPartition>()?,
        };

        let restriction = match statistic {
            StatisticType::TotalItems => Restriction::None,
            StatisticType::ItemsInCategory => {
                let category = required(&self.category, statistic, "category")?;
                let term_id = self.term_id.ok_or(FilterError::MissingField {
                    statistic,
                    field: "term_id",
                })?;
                Restriction::Term { category, term_id }
            }
            StatisticType::ItemsInMultipleCategories => {
                if self.category_terms.is_empty() {
                    return Err(FilterError::MissingField {
                        statistic,
                        field: "category_terms",
                    });
                }
                Restriction::AllOf {
                    categories: self.checked_category_terms()?,
                }
            }
            StatisticType::TotalTermsInCategory => Restriction::Category {
                category: required(&self.category, statistic, "category")?,
            },
            StatisticType::CrossCategoryTerms => {
                let count_category = required(&self.count_category, statistic, "count_category")?;
                let filter_category =
                    required(&self.filter_category, statistic, "filter_category")?;
                let term_id = self.term_id.ok_or(FilterError::MissingField {
                    statistic,
                    field: "term_id",
                })?;
                if count_category == filter_category {
                    return Err(FilterError::SameCategory(count_category));
                }
                Restriction::CrossCategory {
                    count_category,
                    filter_category,
                    term_id,
                }
            }
            StatisticType::TotalNumericSum => {
                let single = non_empty(&self.category);
                match (single, self.category_terms.is_empty()) {
                    (Some(_), false) => return Err(FilterError::ConflictingFilters),
                    (Some(category), true) => match self.term_id {
                        Some(term_id) => Restriction::Term {
                            category: category.to_string(),
                            term_id,
                        },
                        None => {
                            return Err(FilterError::MissingField {
                                statistic,
                                field: "term_id",
                            });
                        }
                    },
                    (None, false) => Restriction::AllOf {
                        categories: self.checked_category_terms()?,
                    },
                    (None, true) => Restriction::None,
                }
            }
        };

        Ok(StatsQuery {
            statistic,
            partition,
            restriction,
        })
    }

    /// Category names are trimmed like the single-category fields; entries
    /// that trim to the same name are merged.
    fn checked_category_terms(&self) -> Result<BTreeMap<String, BTreeSet<TermId>>, FilterError> {
        let mut categories: BTreeMap<String, BTreeSet<TermId>> = BTreeMap::new();
        for (category, terms) in &self.category_terms {
            let category = category.trim();
            if category.is_empty() {
                return Err(FilterError::BlankCategory);
            }
            if terms.is_empty() {
                return Err(FilterError::EmptyCategoryTerms {
                    category: category.to_string(),
                });
            }
            categories
                .entry(category.to_string())
                .or_default()
                .extend(terms.iter().copied());
        }
        Ok(categories)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn required(
    value: &Option<String>,
    statistic: StatisticType,
    field: &'static str,
) -> Result<String, FilterError> {
    non_empty(value)
        .map(str::to_string)
        .ok_or(FilterError::MissingField { statistic, field })
}

/// The item restriction a validated query carries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Restriction {
    None,
    /// Items tagged with one term of one category.
    Term { category: String, term_id: TermId },
    /// Items matching at least one listed term in every listed category.
    AllOf {
        categories: BTreeMap<String, BTreeSet<TermId>>,
    },
    /// A whole category, used by term counting.
    Category { category: String },
    CrossCategory {
        count_category: String,
        filter_category: String,
        term_id: TermId,
    },
}

/// A validated (statistic, filters) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatsQuery {
    pub statistic: StatisticType,
    pub partition: TemporalPartition,
    pub restriction: Restriction,
}

impl StatsQuery {
    pub fn total_items(partition: TemporalPartition) -> Self {
        Self {
            statistic: StatisticType::TotalItems,
            partition,
            restriction: Restriction::None,
        }
    }

    pub fn total_numeric_sum(partition: TemporalPartition) -> Self {
        Self {
            statistic: StatisticType::TotalNumericSum,
            partition,
            restriction: Restriction::None,
        }
    }

    pub fn items_in_category(
        partition: TemporalPartition,
        category: impl Into<String>,
        term_id: TermId,
    ) -> Self {
        Self {
            statistic: StatisticType::ItemsInCategory,
            partition,
            restriction: Restriction::Term {
                category: category.into(),
                term_id,
            },
        }
    }

    pub fn terms_in_category(partition: TemporalPartition, category: impl Into<String>) -> Self {
        Self {
            statistic: StatisticType::TotalTermsInCategory,
            partition,
            restriction: Restriction::Category {
                category: category.into(),
            },
        }
    }

    pub fn cross_category(
        partition: TemporalPartition,
        count_category: impl Into<String>,
        filter_category: impl Into<String>,
        term_id: TermId,
    ) -> Self {
        Self {
            statistic: StatisticType::CrossCategoryTerms,
            partition,
            restriction: Restriction::CrossCategory {
                count_category: count_category.into(),
                filter_category: filter_category.into(),
                term_id,
            },
        }
    }

    /// Rebuild the raw filter set this query validates from.
    pub fn to_filter_set(&self) -> FilterSet {
        let filters = FilterSet::new(self.partition);
        match &self.restriction {
            Restriction::None => filters,
            Restriction::Term { category, term_id } => filters.with_term(category, *term_id),
            Restriction::AllOf { categories } => FilterSet {
                category_terms: categories.clone(),
                ..filters
            },
            Restriction::Category { category } => filters.with_category(category),
            Restriction::CrossCategory {
                count_category,
                filter_category,
                term_id,
            } => filters.with_cross_category(count_category, filter_category, *term_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_partition_is_rejected() {
        let filters = FilterSet::default();
        assert_eq!(
            filters.validate(StatisticType::TotalItems),
            Err(FilterError::MissingPartition)
        );
    }

    #[test]
    fn all_partition_is_rejected() {
        let filters = FilterSet::default().with_partition_str("all");
        assert!(matches!(
            filters.validate(StatisticType::TotalItems),
            Err(FilterError::InvalidPartition(_))
        ));
    }

    #[test]
    fn defaulting_only_fills_missing_partition() {
        let defaulted = FilterSet::default().or_default_partition();
        assert_eq!(defaulted.temporal_partition.as_deref(), Some("upcoming"));

        let invalid = FilterSet::default()
            .with_partition_str("someday")
            .or_default_partition();
        assert!(invalid.validate(StatisticType::TotalItems).is_err());
    }

    #[test]
    fn total_items_drops_stray_restrictions() {
        let plain = FilterSet::new(TemporalPartition::Past);
        let stray = FilterSet::new(TemporalPartition::Past).with_term("venue", 4);
        assert_eq!(
            plain.validate(StatisticType::TotalItems),
            stray.validate(StatisticType::TotalItems)
        );
    }

    #[test]
    fn items_in_category_requires_term() {
        let filters = FilterSet::new(TemporalPartition::Upcoming).with_category("topic");
        assert_eq!(
            filters.validate(StatisticType::ItemsInCategory),
            Err(FilterError::MissingField {
                statistic: StatisticType::ItemsInCategory,
                field: "term_id",
            })
        );
    }

    #[test]
    fn multi_category_rejects_empty_term_set() {
        let mut filters = FilterSet::new(TemporalPartition::Upcoming);
        filters
            .category_terms
            .insert("topic".to_string(), BTreeSet::new());
        assert!(matches!(
            filters.validate(StatisticType::ItemsInMultipleCategories),
            Err(FilterError::EmptyCategoryTerms { .. })
        ));
    }

    #[test]
    fn multi_category_insertion_order_is_irrelevant() {
        let first = FilterSet::new(TemporalPartition::Upcoming)
            .with_category_terms("topic", [3, 1])
            .with_category_terms("venue", [9]);
        let second = FilterSet::new(TemporalPartition::Upcoming)
            .with_category_terms("venue", [9])
            .with_category_terms("topic", [1, 3]);
        assert_eq!(first, second);
        assert_eq!(
            first.validate(StatisticType::ItemsInMultipleCategories),
            second.validate(StatisticType::ItemsInMultipleCategories)
        );
    }

    #[test]
    fn cross_category_rejects_same_category() {
        let filters =
            FilterSet::new(TemporalPartition::Upcoming).with_cross_category("topic", "topic", 2);
        assert_eq!(
            filters.validate(StatisticType::CrossCategoryTerms),
            Err(FilterError::SameCategory("topic".to_string()))
        );
    }

    #[test]
    fn numeric_sum_rejects_single_and_multi_together() {
        let filters = FilterSet::new(TemporalPartition::Past)
            .with_term("topic", 1)
            .with_category_terms("venue", [2]);
        assert_eq!(
            filters.validate(StatisticType::TotalNumericSum),
            Err(FilterError::ConflictingFilters)
        );
    }

    #[test]
    fn category_terms_keys_are_trimmed_and_merged() {
        let padded = FilterSet::new(TemporalPartition::Upcoming)
            .with_category_terms(" topic ", [1])
            .with_category_terms("topic", [2]);
        let plain =
            FilterSet::new(TemporalPartition::Upcoming).with_category_terms("topic", [1, 2]);

        assert_eq!(
            padded.validate(StatisticType::ItemsInMultipleCategories),
            plain.validate(StatisticType::ItemsInMultipleCategories)
        );
        assert_eq!(
            padded.validate(StatisticType::TotalNumericSum),
            plain.validate(StatisticType::TotalNumericSum)
        );
    }

    #[test]
    fn blank_category_terms_key_is_rejected() {
        let filters = FilterSet::new(TemporalPartition::Upcoming)
            .with_category_terms("topic", [1])
            .with_category_terms("  ", [2]);
        assert_eq!(
            filters.validate(StatisticType::ItemsInMultipleCategories),
            Err(FilterError::BlankCategory)
        );
    }

    #[test]
    fn query_rebuilds_equivalent_filter_set() {
        let query = StatsQuery::cross_category(TemporalPartition::Past, "venue", "topic", 7);
        let rebuilt = query.to_filter_set();
        assert_eq!(rebuilt.validate(query.statistic), Ok(query));
    }
}
