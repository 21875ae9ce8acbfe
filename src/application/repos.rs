//! Collaborator traits describing where items, terms, and support flags come from.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::support::{StatisticSupport, SupportConfig};
use crate::domain::types::{ItemId, TemporalPartition, Term, TermId};

#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("data source unavailable: {0}")]
    Unavailable(String),
    #[error("unknown category `{0}`")]
    UnknownCategory(String),
    #[error("unknown term {term_id} in category `{category}`")]
    UnknownTerm { category: String, term_id: TermId },
    #[error("unknown item {0}")]
    UnknownItem(ItemId),
}

impl SourceError {
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Item restriction understood by the data source.
#[derive(Debug, Clone, Copy)]
pub enum ItemFilter<'a> {
    Any,
    Term {
        category: &'a str,
        term_id: TermId,
    },
    /// At least one acceptable term in every listed category.
    AllOf(&'a BTreeMap<String, BTreeSet<TermId>>),
}

#[async_trait]
pub trait ItemsRepo: Send + Sync {
    async fn count_items(
        &self,
        item_types: &[String],
        partition: TemporalPartition,
        filter: ItemFilter<'_>,
    ) -> Result<u64, SourceError>;

    async fn matching_items(
        &self,
        item_types: &[String],
        partition: TemporalPartition,
        filter: ItemFilter<'_>,
    ) -> Result<Vec<ItemId>, SourceError>;

    /// Terms of `category`. `item_count` only counts items of `item_types`,
    /// and `only_non_empty` drops terms whose count is zero.
    async fn get_terms(
        &self,
        item_types: &[String],
        category: &str,
        only_non_empty: bool,
    ) -> Result<Vec<Term>, SourceError>;

    /// Items of `item_types` tagged with `term_id`, in any partition.
    async fn items_matching_term(
        &self,
        item_types: &[String],
        category: &str,
        term_id: TermId,
    ) -> Result<Vec<ItemId>, SourceError>;

    async fn terms_of_item(&self, item_id: ItemId, category: &str)
    -> Result<Vec<TermId>, SourceError>;

    async fn numeric_field_of(&self, item_id: ItemId) -> Result<i64, SourceError>;
}

#[async_trait]
pub trait CategoriesRepo: Send + Sync {
    /// Registered categories minus `exclude`, in a stable order.
    async fn get_categories(&self, exclude: &[String]) -> Result<Vec<String>, SourceError>;
}

pub trait SupportConfigProvider: Send + Sync {
    fn item_types(&self) -> Vec<String>;

    fn get_support_config(&self, item_type: &str) -> StatisticSupport;

    fn support_config(&self) -> SupportConfig {
        let mut config = SupportConfig::new();
        for item_type in self.item_types() {
            let support = self.get_support_config(&item_type);
            config.insert(item_type, support);
        }
        config
    }
}
