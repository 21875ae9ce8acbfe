use thiserror::Error;

use crate::{application::repos::SourceError, config::LoadError, infra::error::InfraError};

/// Failures while computing a statistic.
#[derive(Debug, Clone, Error)]
pub enum StatsError {
    #[error(transparent)]
    Source(#[from] SourceError),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
