//! Regeneration planning.
//!
//! Enumerates the "common" queries worth pre-warming from the current
//! category universe and the enabled statistic types.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::application::repos::{CategoriesRepo, ItemsRepo, SupportConfigProvider};
use crate::domain::filters::StatsQuery;
use crate::domain::types::{StatisticType, TemporalPartition, TermId};

use super::config::StatsCacheConfig;
use super::runner::RegenerationFailure;

/// Partition recorded for entries the algorithms compute across partitions.
const PARTITION_INDEPENDENT: TemporalPartition = TemporalPartition::Upcoming;

const PER_CATEGORY: [StatisticType; 3] = [
    StatisticType::ItemsInCategory,
    StatisticType::TotalTermsInCategory,
    StatisticType::CrossCategoryTerms,
];

/// Work list for one regeneration pass.
#[derive(Debug, Default)]
pub struct RegenerationPlan {
    pub queries: Vec<StatsQuery>,
    /// Planning steps that could not run. Their entries are missing from
    /// `queries`.
    pub failures: Vec<RegenerationFailure>,
}

impl RegenerationPlan {
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }
}

pub struct RegenerationPlanner {
    categories: Arc<dyn CategoriesRepo>,
    items: Arc<dyn ItemsRepo>,
    support: Arc<dyn SupportConfigProvider>,
    excluded_categories: Vec<String>,
    cross_category_cap: usize,
}

impl RegenerationPlanner {
    pub fn new(
        config: &StatsCacheConfig,
        categories: Arc<dyn CategoriesRepo>,
        items: Arc<dyn ItemsRepo>,
        support: Arc<dyn SupportConfigProvider>,
    ) -> Self {
        Self {
            categories,
            items,
            support,
            excluded_categories: config.excluded_categories.clone(),
            cross_category_cap: config.cross_category_cap,
        }
    }

    /// Build the ordered work list.
    ///
    /// Order: partitioned totals, then per category its term count and its
    /// per-term counts, then capped cross-category entries per ordered pair.
    pub async fn plan(&self) -> RegenerationPlan {
        let mut plan = RegenerationPlan::default();

        let support = self.support.support_config();
        if !support.any_enabled() {
            debug!("no item type has statistics enabled; nothing to plan");
            return plan;
        }
        let enabled = |statistic: StatisticType| support.is_enabled(statistic);

        for partition in TemporalPartition::BOTH {
            if enabled(StatisticType::TotalItems) {
                plan.queries.push(StatsQuery::total_items(partition));
            }
            if enabled(StatisticType::TotalNumericSum) {
                plan.queries.push(StatsQuery::total_numeric_sum(partition));
            }
        }

        // item types whose items make a term worth warming
        let term_item_types: Vec<String> = PER_CATEGORY
            .iter()
            .flat_map(|statistic| support.item_types_for(*statistic))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if term_item_types.is_empty() {
            return plan;
        }

        let categories = match self.categories.get_categories(&self.excluded_categories).await {
            Ok(categories) => categories,
            Err(err) => {
                warn!(error = %err, "failed to list categories; per-category entries skipped");
                plan.failures.push(RegenerationFailure {
                    key: None,
                    statistic: None,
                    error: format!("failed to list categories: {err}"),
                });
                return plan;
            }
        };

        let mut terms_by_category: Vec<(String, Vec<TermId>)> =
            Vec::with_capacity(categories.len());
        for category in categories {
            match self.items.get_terms(&term_item_types, &category, true).await {
                Ok(terms) => {
                    let ids = terms.into_iter().map(|term| term.id).collect();
                    terms_by_category.push((category, ids));
                }
                Err(err) => {
                    warn!(
                        category = %category,
                        error = %err,
                        "failed to list terms; category skipped"
                    );
                    plan.failures.push(RegenerationFailure {
                        key: None,
                        statistic: None,
                        error: format!("failed to list terms of `{category}`: {err}"),
                    });
                }
            }
        }

        for (category, terms) in &terms_by_category {
            if enabled(StatisticType::TotalTermsInCategory) {
                plan.queries
                    .push(StatsQuery::terms_in_category(PARTITION_INDEPENDENT, category));
            }
            if enabled(StatisticType::ItemsInCategory) {
                for term_id in terms {
                    for partition in TemporalPartition::BOTH {
                        plan.queries
                            .push(StatsQuery::items_in_category(partition, category, *term_id));
                    }
                }
            }
        }

        if enabled(StatisticType::CrossCategoryTerms) && terms_by_category.len() > 1 {
            for (count_category, _) in &terms_by_category {
                for (filter_category, filter_terms) in &terms_by_category {
                    if count_category == filter_category {
                        continue;
                    }
                    for term_id in filter_terms.iter().take(self.cross_category_cap) {
                        plan.queries.push(StatsQuery::cross_category(
                            PARTITION_INDEPENDENT,
                            count_category,
                            filter_category,
                            *term_id,
                        ));
                    }
                }
            }
        }

        debug!(
            planned = plan.queries.len(),
            failures = plan.failures.len(),
            "regeneration plan built"
        );
        plan
    }
}
