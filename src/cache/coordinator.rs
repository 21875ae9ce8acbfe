//! Invalidation coordinator.
//!
//! Clears the statistics namespace on every change and arms at most one
//! deferred regeneration pass. The pending marker is shared with the
//! runner, which releases it before planning so a change arriving
//! mid-run schedules a fresh pass.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::FutureExt;
use metrics::counter;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::jobs::{DeferredScheduler, REGENERATION_JOB};
use crate::infra::telemetry::{
    METRIC_INVALIDATION, METRIC_REGENERATION_SCHEDULED, METRIC_STORE_ERROR,
};

use super::config::StatsCacheConfig;
use super::keys::namespace_prefix;
use super::runner::RegenerationRunner;
use super::store::StatsStore;

/// In-process marker for the single pending regeneration job.
#[derive(Debug, Clone, Default)]
pub struct PendingRegeneration(Arc<AtomicBool>);

impl PendingRegeneration {
    /// Claim the marker. Only one caller wins until it is released.
    pub fn try_claim(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn release(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Scheduled(Uuid),
    AlreadyPending,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationOutcome {
    /// Entries removed, or `None` when the store could not be cleared.
    pub cleared: Option<usize>,
    pub regeneration: ScheduleOutcome,
}

pub struct InvalidationCoordinator {
    config: StatsCacheConfig,
    store: Arc<dyn StatsStore>,
    scheduler: Arc<dyn DeferredScheduler>,
    runner: Arc<RegenerationRunner>,
    pending: PendingRegeneration,
}

impl InvalidationCoordinator {
    pub fn new(
        config: StatsCacheConfig,
        store: Arc<dyn StatsStore>,
        scheduler: Arc<dyn DeferredScheduler>,
        runner: Arc<RegenerationRunner>,
    ) -> Self {
        let pending = runner.pending().clone();
        Self {
            config,
            store,
            scheduler,
            runner,
            pending,
        }
    }

    /// React to any upstream change: clear the namespace, then make sure a
    /// regeneration pass is pending.
    pub fn on_change_signal(&self) -> InvalidationOutcome {
        counter!(METRIC_INVALIDATION).increment(1);

        let prefix = namespace_prefix(&self.config.namespace);
        let cleared = match self.store.delete_by_prefix(&prefix) {
            Ok(removed) => {
                debug!(namespace = %self.config.namespace, removed, "statistics namespace cleared");
                Some(removed)
            }
            Err(err) => {
                counter!(METRIC_STORE_ERROR, "op" => "delete_by_prefix").increment(1);
                warn!(
                    namespace = %self.config.namespace,
                    error = %err,
                    "failed to clear statistics namespace"
                );
                None
            }
        };

        InvalidationOutcome {
            cleared,
            regeneration: self.schedule_regeneration(),
        }
    }

    /// Arm the regeneration job unless one is already waiting.
    pub fn schedule_regeneration(&self) -> ScheduleOutcome {
        if self.scheduler.is_scheduled(REGENERATION_JOB) || !self.pending.try_claim() {
            debug!(job = REGENERATION_JOB, "regeneration already pending");
            return ScheduleOutcome::AlreadyPending;
        }

        let runner = Arc::clone(&self.runner);
        let task = async move {
            runner.run().await;
        }
        .boxed();

        let delay = self.config.regeneration_delay();
        match self.scheduler.schedule_once(REGENERATION_JOB, delay, task) {
            Ok(job_id) => {
                counter!(METRIC_REGENERATION_SCHEDULED).increment(1);
                info!(
                    job = REGENERATION_JOB,
                    %job_id,
                    delay_secs = delay.as_secs(),
                    "Statistics regeneration scheduled"
                );
                ScheduleOutcome::Scheduled(job_id)
            }
            Err(err) => {
                self.pending.release();
                warn!(job = REGENERATION_JOB, error = %err, "failed to schedule regeneration");
                ScheduleOutcome::Failed(err.to_string())
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_set() || self.scheduler.is_scheduled(REGENERATION_JOB)
    }

    pub fn runner(&self) -> &Arc<RegenerationRunner> {
        &self.runner
    }
}
