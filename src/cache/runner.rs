//! Regeneration runner.
//!
//! Executes a plan by recomputing every entry and writing it through,
//! bypassing the cache check. Entries fail independently.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::domain::types::StatisticType;
use crate::infra::telemetry::{METRIC_REGENERATE_MS, METRIC_REGENERATION_FAILURE};

use super::accessor::StatsCache;
use super::coordinator::PendingRegeneration;
use super::keys::derive_key;
use super::planner::{RegenerationPlan, RegenerationPlanner};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegenerationFailure {
    /// Cache key of the failed entry; absent for planning failures.
    pub key: Option<String>,
    pub statistic: Option<StatisticType>,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegenerationReport {
    pub planned: usize,
    pub warmed: usize,
    pub failures: Vec<RegenerationFailure>,
}

impl RegenerationReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for RegenerationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "planned={} warmed={} failed={}",
            self.planned,
            self.warmed,
            self.failures.len()
        )
    }
}

pub struct RegenerationRunner {
    cache: Arc<StatsCache>,
    planner: RegenerationPlanner,
    pending: PendingRegeneration,
}

impl RegenerationRunner {
    pub fn new(cache: Arc<StatsCache>, planner: RegenerationPlanner) -> Self {
        Self {
            cache,
            planner,
            pending: PendingRegeneration::default(),
        }
    }

    pub fn pending(&self) -> &PendingRegeneration {
        &self.pending
    }

    pub fn planner(&self) -> &RegenerationPlanner {
        &self.planner
    }

    /// Run one full regeneration pass.
    #[instrument(skip(self))]
    pub async fn run(&self) -> RegenerationReport {
        // released first so changes during the pass arm a new job
        self.pending.release();

        let started_at = Instant::now();
        let RegenerationPlan { queries, failures } = self.planner.plan().await;
        for _ in &failures {
            counter!(METRIC_REGENERATION_FAILURE, "stage" => "plan").increment(1);
        }

        let mut report = RegenerationReport {
            planned: queries.len(),
            warmed: 0,
            failures,
        };
        info!(planned = report.planned, "Statistics regeneration starting");

        let namespace = &self.cache.config().namespace;
        for query in &queries {
            let key = match derive_key(namespace, query) {
                Ok(key) => key,
                Err(err) => {
                    counter!(METRIC_REGENERATION_FAILURE, "stage" => "key").increment(1);
                    report.failures.push(RegenerationFailure {
                        key: None,
                        statistic: Some(query.statistic),
                        error: err.to_string(),
                    });
                    continue;
                }
            };

            match self.cache.warm(&key, query).await {
                Ok(_) => report.warmed += 1,
                Err(err) => {
                    counter!(METRIC_REGENERATION_FAILURE, "stage" => "compute").increment(1);
                    warn!(key = %key, error = %err, "regeneration entry failed; continuing");
                    report.failures.push(RegenerationFailure {
                        key: Some(key),
                        statistic: Some(query.statistic),
                        error: err.to_string(),
                    });
                }
            }
        }

        histogram!(METRIC_REGENERATE_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
        info!(
            planned = report.planned,
            warmed = report.warmed,
            failed = report.failures.len(),
            "Statistics regeneration complete"
        );
        report
    }
}
