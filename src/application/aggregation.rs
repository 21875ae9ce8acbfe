//! Aggregation dispatcher.
//!
//! Routes a validated query to one of four algorithms: item counting,
//! non-empty term counting, cross-category term counting, and numeric
//! field summation. Every path enforces the support preconditions first and
//! reports "unsupported" as zero rather than as an error.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::application::error::StatsError;
use crate::application::repos::{ItemFilter, ItemsRepo, SupportConfigProvider};
use crate::application::transform::ValueTransform;
use crate::domain::filters::{FilterSet, Restriction, StatsQuery};
use crate::domain::types::{StatisticType, TemporalPartition, TermId};

pub struct StatsCalculator {
    items: Arc<dyn ItemsRepo>,
    support: Arc<dyn SupportConfigProvider>,
    transforms: Vec<Arc<dyn ValueTransform>>,
}

impl StatsCalculator {
    pub fn new(items: Arc<dyn ItemsRepo>, support: Arc<dyn SupportConfigProvider>) -> Self {
        Self {
            items,
            support,
            transforms: Vec::new(),
        }
    }

    /// Register a transform; transforms run in registration order.
    pub fn with_transform(mut self, transform: Arc<dyn ValueTransform>) -> Self {
        self.transforms.push(transform);
        self
    }

    pub fn support(&self) -> &Arc<dyn SupportConfigProvider> {
        &self.support
    }

    pub fn items(&self) -> &Arc<dyn ItemsRepo> {
        &self.items
    }

    /// Compute a statistic from raw filters. Never fails: invalid input,
    /// unsupported statistics and data source errors all yield 0.
    pub async fn calculate(&self, statistic: StatisticType, filters: &FilterSet) -> u64 {
        let query = match filters.validate(statistic) {
            Ok(query) => query,
            Err(err) => {
                debug!(%statistic, error = %err, "rejected statistic request");
                return 0;
            }
        };

        match self.calculate_query(&query).await {
            Ok(value) => value,
            Err(err) => {
                warn!(%statistic, error = %err, "statistic computation failed");
                0
            }
        }
    }

    /// Compute a validated query, surfacing data source failures.
    #[instrument(skip(self), fields(statistic = %query.statistic, partition = %query.partition))]
    pub async fn calculate_query(&self, query: &StatsQuery) -> Result<u64, StatsError> {
        let support = self.support.support_config();
        if !support.any_enabled() {
            debug!("no item type has statistics enabled");
            return Ok(0);
        }

        let item_types = support.item_types_for(query.statistic);
        if item_types.is_empty() {
            debug!("statistic disabled for every item type");
            return Ok(0);
        }

        let raw = match query.statistic {
            StatisticType::TotalItems
            | StatisticType::ItemsInCategory
            | StatisticType::ItemsInMultipleCategories => {
                match item_filter(&query.restriction) {
                    Some(filter) => self.count_items(&item_types, query.partition, filter).await?,
                    None => return Ok(mismatched(query)),
                }
            }
            StatisticType::TotalTermsInCategory => match &query.restriction {
                Restriction::Category { category } => {
                    self.count_terms(&item_types, category).await?
                }
                _ => return Ok(mismatched(query)),
            },
            StatisticType::CrossCategoryTerms => match &query.restriction {
                Restriction::CrossCategory {
                    count_category,
                    filter_category,
                    term_id,
                } => {
                    self.count_cooccurring_terms(
                        &item_types,
                        count_category,
                        filter_category,
                        *term_id,
                    )
                    .await?
                }
                _ => return Ok(mismatched(query)),
            },
            StatisticType::TotalNumericSum => match item_filter(&query.restriction) {
                Some(filter) => self.sum_numeric(&item_types, query.partition, filter).await?,
                None => return Ok(mismatched(query)),
            },
        };

        let value = self
            .transforms
            .iter()
            .fold(raw, |value, transform| transform.transform(query, value));
        debug!(raw, value, "statistic computed");
        Ok(value)
    }

    async fn count_items(
        &self,
        item_types: &[String],
        partition: TemporalPartition,
        filter: ItemFilter<'_>,
    ) -> Result<u64, StatsError> {
        Ok(self.items.count_items(item_types, partition, filter).await?)
    }

    async fn count_terms(&self, item_types: &[String], category: &str) -> Result<u64, StatsError> {
        let terms = self.items.get_terms(item_types, category, true).await?;
        Ok(terms.len() as u64)
    }

    /// Distinct terms of `count_category` carried by items tagged with
    /// `term_id` in `filter_category`. Ignores the temporal partition.
    async fn count_cooccurring_terms(
        &self,
        item_types: &[String],
        count_category: &str,
        filter_category: &str,
        term_id: TermId,
    ) -> Result<u64, StatsError> {
        let items = self
            .items
            .items_matching_term(item_types, filter_category, term_id)
            .await?;

        let mut seen: BTreeSet<TermId> = BTreeSet::new();
        for item_id in items {
            let terms = self.items.terms_of_item(item_id, count_category).await?;
            seen.extend(terms);
        }

        Ok(seen.len() as u64)
    }

    async fn sum_numeric(
        &self,
        item_types: &[String],
        partition: TemporalPartition,
        filter: ItemFilter<'_>,
    ) -> Result<u64, StatsError> {
        let items = self
            .items
            .matching_items(item_types, partition, filter)
            .await?;

        let mut total: i64 = 0;
        for item_id in items {
            total = total.saturating_add(self.items.numeric_field_of(item_id).await?);
        }

        Ok(u64::try_from(total).unwrap_or(0))
    }
}

fn item_filter(restriction: &Restriction) -> Option<ItemFilter<'_>> {
    match restriction {
        Restriction::None => Some(ItemFilter::Any),
        Restriction::Term { category, term_id } => Some(ItemFilter::Term {
            category,
            term_id: *term_id,
        }),
        Restriction::AllOf { categories } => Some(ItemFilter::AllOf(categories)),
        Restriction::Category { .. } | Restriction::CrossCategory { .. } => None,
    }
}

fn mismatched(query: &StatsQuery) -> u64 {
    debug!(restriction = ?query.restriction, "restriction does not apply to statistic");
    0
}
