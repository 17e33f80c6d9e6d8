//! Drives each job on its own interval.
//!
//! A pass runs only when the outage guard allows it and this instance holds
//! the job's lease.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::TimeDelta;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use regnskap_db::LeaseLock;
use regnskap_shared::CallContext;
use regnskap_shared::config::JobSchedule;

use crate::error::JobError;
use crate::guard::OutageGuard;
use crate::jobs::Job;

/// What happened to one scheduled pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Utfall {
    /// The pass ran to completion.
    Kjort,
    /// Skipped by the outage guard.
    Hindret,
    /// Another instance holds the lease.
    Laast,
}

/// Runs registered jobs until shutdown.
pub struct Scheduler {
    lock: LeaseLock,
    guard: OutageGuard,
    jobs: Vec<(Arc<dyn Job>, JobSchedule)>,
}

impl Scheduler {
    /// Creates an empty scheduler.
    #[must_use]
    pub fn new(lock: LeaseLock, guard: OutageGuard) -> Self {
        Self {
            lock,
            guard,
            jobs: Vec::new(),
        }
    }

    /// Adds a job; disabled jobs are left out.
    #[must_use]
    pub fn register(mut self, job: Arc<dyn Job>, schedule: JobSchedule) -> Self {
        if schedule.enabled {
            self.jobs.push((job, schedule));
        } else {
            info!(job = job.name(), "Job disabled");
        }
        self
    }

    /// Spawns one task per job. Tasks stop when `shutdown` turns true.
    pub fn start(self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let lock = Arc::new(self.lock);
        let guard = Arc::new(self.guard);

        self.jobs
            .into_iter()
            .map(|(job, schedule)| {
                let lock = Arc::clone(&lock);
                let guard = Arc::clone(&guard);
                let shutdown = shutdown.clone();
                tokio::spawn(async move { run_loop(job, schedule, lock, guard, shutdown).await })
            })
            .collect()
    }
}

async fn run_loop(
    job: Arc<dyn Job>,
    schedule: JobSchedule,
    lock: Arc<LeaseLock>,
    guard: Arc<OutageGuard>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(schedule.interval_secs.max(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(job = job.name(), interval_secs = schedule.interval_secs, "Job scheduled");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = run_pass(job.as_ref(), &schedule, &lock, &guard).await {
                    error!(job = job.name(), error = %e, "Job pass failed");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!(job = job.name(), "Job stopped");
}

/// Runs a single pass under the guard and the job's lease.
pub async fn run_pass(
    job: &dyn Job,
    schedule: &JobSchedule,
    lock: &LeaseLock,
    guard: &OutageGuard,
) -> Result<Utfall, JobError> {
    let ctx = CallContext::for_job(job.name());

    if let Some(hindring) = guard.hindring(&ctx, job.mot_skatt()).await? {
        info!(job = job.name(), reason = %hindring, correlation_id = %ctx, "Pass skipped");
        return Ok(Utfall::Hindret);
    }

    let Some(lease) = lock
        .try_acquire(
            job.name(),
            sekunder(schedule.lock_at_most_secs),
            sekunder(schedule.lock_at_least_secs),
        )
        .await?
    else {
        debug!(job = job.name(), "Lease held by another instance");
        return Ok(Utfall::Laast);
    };

    let started = Instant::now();
    let result = job.run(&ctx).await;
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    if let Err(e) = lease.release().await {
        error!(job = job.name(), error = %e, "Could not release lease");
    }

    result?;
    debug!(job = job.name(), elapsed_ms, correlation_id = %ctx, "Pass finished");
    Ok(Utfall::Kjort)
}

fn sekunder(secs: u64) -> TimeDelta {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}
