//! Deferred job interface.
//!
//! The engine never owns a timer. It hands a future to a scheduler and asks
//! it whether a named job is still waiting to fire.

use std::time::Duration;

use futures::future::BoxFuture;
use thiserror::Error;
use uuid::Uuid;

/// Name under which the debounced regeneration pass is scheduled.
pub const REGENERATION_JOB: &str = "event_stats.regenerate";

pub type DeferredTask = BoxFuture<'static, ()>;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("scheduler rejected job `{job}`: {reason}")]
    Rejected { job: String, reason: String },
}

pub trait DeferredScheduler: Send + Sync {
    /// Run `task` once after `delay`. Returns the id assigned to the job.
    fn schedule_once(
        &self,
        job: &'static str,
        delay: Duration,
        task: DeferredTask,
    ) -> Result<Uuid, ScheduleError>;

    fn is_scheduled(&self, job: &str) -> bool;
}
