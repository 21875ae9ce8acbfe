//! Deferred job schedulers.
//!
//! `TokioScheduler` fires jobs on the tokio timer. `ManualScheduler` keeps a
//! virtual clock and fires jobs only when told to, for embedders that drive
//! regeneration from their own loop and for tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use crate::application::jobs::{DeferredScheduler, DeferredTask, ScheduleError};
use crate::cache::lock::mutex_lock;

const SOURCE: &str = "infra::scheduler";

#[derive(Clone, Default)]
pub struct TokioScheduler {
    jobs: Arc<DashMap<String, Uuid>>,
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeferredScheduler for TokioScheduler {
    fn schedule_once(
        &self,
        job: &'static str,
        delay: Duration,
        task: DeferredTask,
    ) -> Result<Uuid, ScheduleError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|err| ScheduleError::Rejected {
                job: job.to_string(),
                reason: err.to_string(),
            })?;

        let job_id = Uuid::new_v4();
        self.jobs.insert(job.to_string(), job_id);

        let jobs = Arc::clone(&self.jobs);
        runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            // unregister before running so the task can re-arm the job
            jobs.remove_if(job, |_, current| *current == job_id);
            debug!(job, %job_id, "deferred job firing");
            task.await;
        });

        Ok(job_id)
    }

    fn is_scheduled(&self, job: &str) -> bool {
        self.jobs.contains_key(job)
    }
}

struct ManualJob {
    id: Uuid,
    name: &'static str,
    due_at: Duration,
    task: DeferredTask,
}

/// Scheduler driven by an explicit virtual clock.
#[derive(Default)]
pub struct ManualScheduler {
    jobs: Mutex<Vec<ManualJob>>,
    now: Mutex<Duration>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs waiting to fire.
    pub fn pending(&self) -> usize {
        mutex_lock(&self.jobs, SOURCE, "pending").len()
    }

    /// Remaining delay of the named job, if it is scheduled.
    pub fn remaining(&self, job: &str) -> Option<Duration> {
        let now = *mutex_lock(&self.now, SOURCE, "remaining.now");
        mutex_lock(&self.jobs, SOURCE, "remaining.jobs")
            .iter()
            .find(|scheduled| scheduled.name == job)
            .map(|scheduled| scheduled.due_at.saturating_sub(now))
    }

    /// Move the virtual clock forward and run every job that became due.
    pub async fn advance(&self, by: Duration) -> usize {
        let now = {
            let mut now = mutex_lock(&self.now, SOURCE, "advance");
            *now += by;
            *now
        };
        self.fire_where(|job| job.due_at <= now).await
    }

    /// Run the jobs already due at the current virtual time.
    pub async fn fire_due(&self) -> usize {
        self.advance(Duration::ZERO).await
    }

    /// Run every scheduled job regardless of its delay.
    pub async fn fire_all(&self) -> usize {
        self.fire_where(|_| true).await
    }

    async fn fire_where(&self, due: impl Fn(&ManualJob) -> bool) -> usize {
        let ready: Vec<ManualJob> = {
            let mut jobs = mutex_lock(&self.jobs, SOURCE, "fire");
            let (ready, waiting) = jobs.drain(..).partition(|job| due(job));
            *jobs = waiting;
            ready
        };

        let fired = ready.len();
        for job in ready {
            debug!(job = job.name, job_id = %job.id, "manual job firing");
            job.task.await;
        }
        fired
    }
}

impl DeferredScheduler for ManualScheduler {
    fn schedule_once(
        &self,
        job: &'static str,
        delay: Duration,
        task: DeferredTask,
    ) -> Result<Uuid, ScheduleError> {
        let id = Uuid::new_v4();
        let due_at = *mutex_lock(&self.now, SOURCE, "schedule_once.now") + delay;
        mutex_lock(&self.jobs, SOURCE, "schedule_once.jobs").push(ManualJob {
            id,
            name: job,
            due_at,
            task,
        });
        Ok(id)
    }

    fn is_scheduled(&self, job: &str) -> bool {
        mutex_lock(&self.jobs, SOURCE, "is_scheduled")
            .iter()
            .any(|scheduled| scheduled.name == job)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::FutureExt;

    use super::*;

    fn counting_task(counter: &Arc<AtomicUsize>) -> DeferredTask {
        let counter = Arc::clone(counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
        .boxed()
    }

    #[tokio::test]
    async fn manual_scheduler_fires_only_due_jobs() {
        let scheduler = ManualScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));

        scheduler
            .schedule_once("slow", Duration::from_secs(60), counting_task(&counter))
            .unwrap();
        scheduler
            .schedule_once("fast", Duration::from_secs(5), counting_task(&counter))
            .unwrap();

        assert_eq!(scheduler.remaining("slow"), Some(Duration::from_secs(60)));
        assert_eq!(scheduler.advance(Duration::from_secs(10)).await, 1);
        assert!(!scheduler.is_scheduled("fast"));
        assert!(scheduler.is_scheduled("slow"));
        assert_eq!(scheduler.remaining("slow"), Some(Duration::from_secs(50)));

        assert_eq!(scheduler.fire_all().await, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_scheduler_unregisters_job_when_it_fires() {
        let scheduler = TokioScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));

        scheduler
            .schedule_once("job", Duration::from_secs(60), counting_task(&counter))
            .unwrap();
        assert!(scheduler.is_scheduled("job"));

        tokio::time::sleep(Duration::from_secs(61)).await;
        tokio::task::yield_now().await;

        assert!(!scheduler.is_scheduled("job"));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn tokio_scheduler_rejects_outside_runtime() {
        let scheduler = TokioScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let result =
            scheduler.schedule_once("job", Duration::from_secs(1), counting_task(&counter));
        assert!(matches!(result, Err(ScheduleError::Rejected { .. })));
    }
}
