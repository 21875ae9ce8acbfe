//! In-memory catalog of items, categories, and terms.
//!
//! Backs the CLI (loaded from a TOML fixture) and the test suites. Implements
//! every collaborator trait the engine consumes.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::Deserialize;

use crate::application::repos::{
    CategoriesRepo, ItemFilter, ItemsRepo, SourceError, SupportConfigProvider,
};
use crate::cache::lock::{rw_read, rw_write};
use crate::domain::support::{StatisticSupport, SupportConfig};
use crate::domain::types::{ItemId, StatisticType, TemporalPartition, Term, TermId};

use super::error::InfraError;

const SOURCE: &str = "infra::memory";

/// A stored item and the terms it carries.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogItem {
    pub id: ItemId,
    pub item_type: String,
    pub partition: TemporalPartition,
    #[serde(default)]
    pub terms: BTreeMap<String, BTreeSet<TermId>>,
    /// Attendee count or an equivalent per-item number.
    #[serde(default)]
    pub numeric: i64,
}

impl CatalogItem {
    pub fn new(id: ItemId, item_type: impl Into<String>, partition: TemporalPartition) -> Self {
        Self {
            id,
            item_type: item_type.into(),
            partition,
            terms: BTreeMap::new(),
            numeric: 0,
        }
    }

    pub fn with_terms<I>(mut self, category: impl Into<String>, terms: I) -> Self
    where
        I: IntoIterator<Item = TermId>,
    {
        self.terms.entry(category.into()).or_default().extend(terms);
        self
    }

    pub fn with_numeric(mut self, value: i64) -> Self {
        self.numeric = value;
        self
    }

    fn is_one_of(&self, item_types: &[String]) -> bool {
        item_types.contains(&self.item_type)
    }

    fn has_term(&self, category: &str, term_id: TermId) -> bool {
        self.terms
            .get(category)
            .is_some_and(|terms| terms.contains(&term_id))
    }

    fn matches(&self, filter: ItemFilter<'_>) -> bool {
        match filter {
            ItemFilter::Any => true,
            ItemFilter::Term { category, term_id } => self.has_term(category, term_id),
            ItemFilter::AllOf(categories) => categories.iter().all(|(category, accepted)| {
                self.terms
                    .get(category)
                    .is_some_and(|terms| !terms.is_disjoint(accepted))
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureTerm {
    pub id: TermId,
    pub name: String,
}

/// On-disk catalog description.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogFixture {
    /// `item_type -> {statistic tag -> enabled}`.
    pub support: BTreeMap<String, BTreeMap<String, bool>>,
    pub categories: BTreeMap<String, Vec<FixtureTerm>>,
    pub items: Vec<CatalogItem>,
}

impl CatalogFixture {
    pub fn from_toml_str(raw: &str) -> Result<Self, InfraError> {
        toml::from_str(raw).map_err(|err| InfraError::fixture(err.to_string()))
    }

    pub async fn load(path: &Path) -> Result<Self, InfraError> {
        let raw = tokio::fs::read_to_string(path).await?;
        Self::from_toml_str(&raw)
    }

    fn support_config(&self) -> Result<SupportConfig, InfraError> {
        let mut support = SupportConfig::new();
        for (item_type, flags) in &self.support {
            let mut parsed = StatisticSupport::new();
            for (tag, enabled) in flags {
                let statistic = tag
                    .parse::<StatisticType>()
                    .map_err(|err| InfraError::fixture(format!("support.{item_type}: {err}")))?;
                parsed.insert(statistic, *enabled);
            }
            support.insert(item_type.clone(), parsed);
        }
        Ok(support)
    }
}

#[derive(Default)]
struct CatalogState {
    support: SupportConfig,
    terms: BTreeMap<String, BTreeMap<TermId, String>>,
    items: BTreeMap<ItemId, CatalogItem>,
    failing_category: Option<String>,
}

impl CatalogState {
    fn ensure_category(&self, category: &str) -> Result<(), SourceError> {
        if self.failing_category.as_deref() == Some(category) {
            return Err(SourceError::unavailable(format!(
                "category `{category}` is unreachable"
            )));
        }
        if !self.terms.contains_key(category) {
            return Err(SourceError::UnknownCategory(category.to_string()));
        }
        Ok(())
    }

    fn ensure_filter(&self, filter: ItemFilter<'_>) -> Result<(), SourceError> {
        match filter {
            ItemFilter::Any => Ok(()),
            ItemFilter::Term { category, .. } => self.ensure_category(category),
            ItemFilter::AllOf(categories) => categories
                .keys()
                .try_for_each(|category| self.ensure_category(category)),
        }
    }

    fn matching(
        &self,
        item_types: &[String],
        partition: TemporalPartition,
        filter: ItemFilter<'_>,
    ) -> Result<Vec<ItemId>, SourceError> {
        self.ensure_filter(filter)?;
        Ok(self
            .items
            .values()
            .filter(|item| item.is_one_of(item_types))
            .filter(|item| item.partition == partition)
            .filter(|item| item.matches(filter))
            .map(|item| item.id)
            .collect())
    }
}

pub struct InMemoryCatalog {
    state: RwLock<CatalogState>,
}

impl InMemoryCatalog {
    pub fn new(support: SupportConfig) -> Self {
        Self {
            state: RwLock::new(CatalogState {
                support,
                ..Default::default()
            }),
        }
    }

    pub fn from_fixture(fixture: CatalogFixture) -> Result<Self, InfraError> {
        let catalog = Self::new(fixture.support_config()?);
        for (category, terms) in fixture.categories {
            catalog.add_category(&category);
            for term in terms {
                catalog.add_term(&category, term.id, term.name);
            }
        }
        for item in fixture.items {
            catalog.add_item(item);
        }
        Ok(catalog)
    }

    pub fn add_category(&self, category: &str) {
        rw_write(&self.state, SOURCE, "add_category")
            .terms
            .entry(category.to_string())
            .or_default();
    }

    pub fn add_term(&self, category: &str, term_id: TermId, name: impl Into<String>) {
        rw_write(&self.state, SOURCE, "add_term")
            .terms
            .entry(category.to_string())
            .or_default()
            .insert(term_id, name.into());
    }

    pub fn add_item(&self, item: CatalogItem) {
        rw_write(&self.state, SOURCE, "add_item")
            .items
            .insert(item.id, item);
    }

    pub fn remove_item(&self, item_id: ItemId) -> Option<CatalogItem> {
        rw_write(&self.state, SOURCE, "remove_item")
            .items
            .remove(&item_id)
    }

    pub fn remove_category(&self, category: &str) {
        let mut state = rw_write(&self.state, SOURCE, "remove_category");
        state.terms.remove(category);
        for item in state.items.values_mut() {
            item.terms.remove(category);
        }
    }

    pub fn set_support(&self, support: SupportConfig) {
        rw_write(&self.state, SOURCE, "set_support").support = support;
    }

    /// Make every item lookup touching `category` fail as if the backing
    /// store were unreachable. Term listings keep working.
    pub fn set_failing_category(&self, category: Option<&str>) {
        rw_write(&self.state, SOURCE, "set_failing_category").failing_category =
            category.map(str::to_string);
    }

    pub fn item_count(&self) -> usize {
        rw_read(&self.state, SOURCE, "item_count").items.len()
    }
}

#[async_trait]
impl ItemsRepo for InMemoryCatalog {
    async fn count_items(
        &self,
        item_types: &[String],
        partition: TemporalPartition,
        filter: ItemFilter<'_>,
    ) -> Result<u64, SourceError> {
        let state = rw_read(&self.state, SOURCE, "count_items");
        Ok(state.matching(item_types, partition, filter)?.len() as u64)
    }

    async fn matching_items(
        &self,
        item_types: &[String],
        partition: TemporalPartition,
        filter: ItemFilter<'_>,
    ) -> Result<Vec<ItemId>, SourceError> {
        let state = rw_read(&self.state, SOURCE, "matching_items");
        state.matching(item_types, partition, filter)
    }

    async fn get_terms(
        &self,
        item_types: &[String],
        category: &str,
        only_non_empty: bool,
    ) -> Result<Vec<Term>, SourceError> {
        let state = rw_read(&self.state, SOURCE, "get_terms");
        let terms = state
            .terms
            .get(category)
            .ok_or_else(|| SourceError::UnknownCategory(category.to_string()))?;

        Ok(terms
            .iter()
            .map(|(id, name)| Term {
                id: *id,
                category: category.to_string(),
                name: name.clone(),
                item_count: state
                    .items
                    .values()
                    .filter(|item| item.is_one_of(item_types) && item.has_term(category, *id))
                    .count() as u64,
            })
            .filter(|term| !only_non_empty || term.item_count > 0)
            .collect())
    }

    async fn items_matching_term(
        &self,
        item_types: &[String],
        category: &str,
        term_id: TermId,
    ) -> Result<Vec<ItemId>, SourceError> {
        let state = rw_read(&self.state, SOURCE, "items_matching_term");
        state.ensure_category(category)?;
        let known = state
            .terms
            .get(category)
            .is_some_and(|terms| terms.contains_key(&term_id));
        if !known {
            return Err(SourceError::UnknownTerm {
                category: category.to_string(),
                term_id,
            });
        }

        Ok(state
            .items
            .values()
            .filter(|item| item.is_one_of(item_types) && item.has_term(category, term_id))
            .map(|item| item.id)
            .collect())
    }

    async fn terms_of_item(
        &self,
        item_id: ItemId,
        category: &str,
    ) -> Result<Vec<TermId>, SourceError> {
        let state = rw_read(&self.state, SOURCE, "terms_of_item");
        state.ensure_category(category)?;
        let item = state
            .items
            .get(&item_id)
            .ok_or(SourceError::UnknownItem(item_id))?;
        Ok(item
            .terms
            .get(category)
            .map(|terms| terms.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn numeric_field_of(&self, item_id: ItemId) -> Result<i64, SourceError> {
        let state = rw_read(&self.state, SOURCE, "numeric_field_of");
        state
            .items
            .get(&item_id)
            .map(|item| item.numeric)
            .ok_or(SourceError::UnknownItem(item_id))
    }
}

#[async_trait]
impl CategoriesRepo for InMemoryCatalog {
    async fn get_categories(&self, exclude: &[String]) -> Result<Vec<String>, SourceError> {
        let state = rw_read(&self.state, SOURCE, "get_categories");
        Ok(state
            .terms
            .keys()
            .filter(|category| !exclude.contains(category))
            .cloned()
            .collect())
    }
}

impl SupportConfigProvider for InMemoryCatalog {
    fn item_types(&self) -> Vec<String> {
        rw_read(&self.state, SOURCE, "item_types")
            .support
            .item_types()
            .map(str::to_string)
            .collect()
    }

    fn get_support_config(&self, item_type: &str) -> StatisticSupport {
        rw_read(&self.state, SOURCE, "get_support_config")
            .support
            .get(item_type)
            .cloned()
            .unwrap_or_default()
    }
}
