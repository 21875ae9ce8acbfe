use thiserror::Error;

use super::types::StatisticType;

/// Reasons a filter set is rejected before any key derivation or aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("temporal partition is missing")]
    MissingPartition,
    #[error("temporal partition `{0}` is not one of upcoming|past")]
    InvalidPartition(String),
    #[error("unknown statistic type `{0}`")]
    UnknownStatistic(String),
    #[error("statistic `{statistic}` requires `{field}`")]
    MissingField {
        statistic: StatisticType,
        field: &'static str,
    },
    #[error("category name must not be blank")]
    BlankCategory,
    #[error("category `{category}` lists no acceptable terms")]
    EmptyCategoryTerms { category: String },
    #[error("single-category and multi-category filters cannot be combined")]
    ConflictingFilters,
    #[error("count and filter category are both `{0}`")]
    SameCategory(String),
}
