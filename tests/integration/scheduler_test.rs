// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::integration::helpers::{insert_job, setup_db, site_batch};
use async_trait::async_trait;
use auditrs::domain::models::job::{Job, JobProgress, JobStatus, JobType};
use auditrs::domain::repositories::job_repository::{JobRepository, RepositoryError};
use auditrs::infrastructure::repositories::job_repo_impl::JobRepositoryImpl;
use auditrs::queue::job_queue::JobService;
use auditrs::queue::scheduler::{CancelOutcome, JobScheduler, Scheduler, SchedulerOptions};
use auditrs::workers::handler::{HandlerError, ItemError, JobHandler};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// 按脚本返回结果的处理器，工作单元为配置中站点的序号
#[derive(Default)]
struct ScriptedHandler {
    failing: HashSet<u32>,
    rate_limited_attempts: u32,
    wait_for_cancel: bool,
    hold_from: Option<u32>,
    gate: Option<Arc<Semaphore>>,
    reject_plan: bool,
    attempts: Mutex<HashMap<u32, u32>>,
    recorded_failures: Mutex<Vec<(u32, ItemError)>>,
}

impl ScriptedHandler {
    fn attempts(&self, item: u32) -> u32 {
        self.attempts.lock().get(&item).copied().unwrap_or(0)
    }
}

#[async_trait]
impl JobHandler for ScriptedHandler {
    type Item = u32;

    fn job_type(&self) -> JobType {
        JobType::Analysis
    }

    fn plan(&self, job: &Job) -> Result<Vec<u32>, HandlerError> {
        if self.reject_plan {
            return Err(HandlerError::ConfigMismatch {
                expected: JobType::Analysis,
            });
        }
        Ok((0..job.config.site_ids().len() as u32).collect())
    }

    async fn process(
        &self,
        _job_id: Uuid,
        item: &u32,
        cancel: &CancellationToken,
    ) -> Result<(), ItemError> {
        let attempt = {
            let mut attempts = self.attempts.lock();
            let entry = attempts.entry(*item).or_insert(0);
            *entry += 1;
            *entry
        };

        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.unwrap();
        }
        if self.wait_for_cancel || self.hold_from.is_some_and(|from| *item >= from) {
            cancel.cancelled().await;
            return Err(ItemError::Cancelled);
        }
        if attempt <= self.rate_limited_attempts {
            return Err(ItemError::RateLimited("pagespeed".to_string()));
        }
        if self.failing.contains(item) {
            return Err(ItemError::Failed(format!("item {} broke", item)));
        }
        Ok(())
    }

    async fn record_failure(&self, _job_id: Uuid, item: &u32, error: &ItemError) {
        self.recorded_failures.lock().push((*item, error.clone()));
    }
}

fn options() -> SchedulerOptions {
    SchedulerOptions {
        poll_interval: Duration::from_millis(10),
        batch_size: 2,
        rate_limit_backoff: Duration::from_millis(5),
        max_rate_limit_retries: 3,
    }
}

struct Fixture {
    jobs: Arc<JobRepositoryImpl>,
    handler: Arc<ScriptedHandler>,
    scheduler: Arc<JobScheduler<ScriptedHandler>>,
}

async fn fixture(handler: ScriptedHandler, options: SchedulerOptions) -> Fixture {
    let db = setup_db().await;
    let jobs = Arc::new(JobRepositoryImpl::new(db));
    let handler = Arc::new(handler);
    let scheduler = Arc::new(JobScheduler::new(handler.clone(), jobs.clone(), options));
    Fixture {
        jobs,
        handler,
        scheduler,
    }
}

async fn analysis_job(jobs: &JobRepositoryImpl, items: usize, age_secs: i64) -> Job {
    let sites: Vec<Uuid> = (0..items).map(|_| Uuid::new_v4()).collect();
    insert_job(jobs, site_batch(JobType::Analysis, &sites), age_secs).await
}

#[tokio::test]
async fn test_successful_run_completes_with_full_progress() {
    let f = fixture(ScriptedHandler::default(), options()).await;
    let job = analysis_job(&f.jobs, 5, 0).await;

    let handle = f.scheduler.poll().await.unwrap().expect("job claimed");
    handle.await.unwrap();

    let stored = f.jobs.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.total_items, 5);
    assert_eq!(stored.processed_items, 5);
    assert_eq!(stored.failed_items, 0);
    assert_eq!(stored.progress, 100);
    assert!(stored.error.is_none());
    assert!(stored.completed_at.is_some());
    assert!(!f.scheduler.is_busy());
}

#[tokio::test]
async fn test_partial_failure_completes_with_summary() {
    let handler = ScriptedHandler {
        failing: HashSet::from([1]),
        ..Default::default()
    };
    let f = fixture(handler, options()).await;
    let job = analysis_job(&f.jobs, 3, 0).await;

    f.scheduler.poll().await.unwrap().unwrap().await.unwrap();

    let stored = f.jobs.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.failed_items, 1);
    assert_eq!(stored.processed_items, 3);
    assert_eq!(stored.error.as_deref(), Some("1 of 3 items failed"));

    let failures = f.handler.recorded_failures.lock().clone();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, 1);
}

#[tokio::test]
async fn test_all_items_failing_fails_the_job() {
    let handler = ScriptedHandler {
        failing: HashSet::from([0, 1]),
        ..Default::default()
    };
    let f = fixture(handler, options()).await;
    let job = analysis_job(&f.jobs, 2, 0).await;

    f.scheduler.poll().await.unwrap().unwrap().await.unwrap();

    let stored = f.jobs.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(stored.failed_items, 2);
    assert_eq!(stored.error.as_deref(), Some("all 2 items failed"));
}

#[tokio::test]
async fn test_only_one_job_runs_at_a_time() {
    let gate = Arc::new(Semaphore::new(0));
    let handler = ScriptedHandler {
        gate: Some(gate.clone()),
        ..Default::default()
    };
    let f = fixture(handler, options()).await;
    let first = analysis_job(&f.jobs, 1, 60).await;
    let second = analysis_job(&f.jobs, 1, 0).await;

    let running = f.scheduler.poll().await.unwrap().expect("first job claimed");
    assert!(f.scheduler.is_busy());
    assert!(f.scheduler.poll().await.unwrap().is_none());
    assert_eq!(
        f.jobs.find_by_id(second.id).await.unwrap().unwrap().status,
        JobStatus::Pending
    );

    gate.add_permits(10);
    running.await.unwrap();
    assert_eq!(
        f.jobs.find_by_id(first.id).await.unwrap().unwrap().status,
        JobStatus::Completed
    );

    f.scheduler.poll().await.unwrap().expect("second job claimed").await.unwrap();
    assert_eq!(
        f.jobs.find_by_id(second.id).await.unwrap().unwrap().status,
        JobStatus::Completed
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_polls_claim_exactly_one_job() {
    let gate = Arc::new(Semaphore::new(0));
    let handler = ScriptedHandler {
        gate: Some(gate.clone()),
        ..Default::default()
    };
    let f = fixture(handler, options()).await;
    for age in 0..3 {
        analysis_job(&f.jobs, 1, age).await;
    }

    let polls: Vec<_> = (0..8)
        .map(|_| {
            let scheduler = f.scheduler.clone();
            tokio::spawn(async move { scheduler.poll().await })
        })
        .collect();
    let mut claimed = Vec::new();
    for poll in polls {
        if let Some(handle) = poll.await.unwrap().unwrap() {
            claimed.push(handle);
        }
    }
    assert_eq!(claimed.len(), 1);

    let running = f
        .jobs
        .list_recent(10)
        .await
        .unwrap()
        .into_iter()
        .filter(|job| job.status == JobStatus::Running)
        .count();
    assert_eq!(running, 1);

    gate.add_permits(10);
    for handle in claimed {
        handle.await.unwrap();
    }
}

#[tokio::test]
async fn test_cancelling_running_job_stops_at_batch_boundary() {
    let handler = ScriptedHandler {
        wait_for_cancel: true,
        ..Default::default()
    };
    let f = fixture(
        handler,
        SchedulerOptions {
            batch_size: 1,
            ..options()
        },
    )
    .await;
    let job = analysis_job(&f.jobs, 4, 0).await;

    let running = f.scheduler.poll().await.unwrap().unwrap();
    assert!(f.scheduler.watch_progress(job.id).is_some());
    while f.handler.attempts(0) == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(
        f.scheduler.cancel(job.id).await.unwrap(),
        CancelOutcome::Signalled
    );
    running.await.unwrap();

    let stored = f.jobs.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Cancelled);
    assert_eq!(stored.processed_items, 1);
    assert_eq!(f.handler.attempts(1), 0);
    assert!(f.scheduler.watch_progress(job.id).is_none());

    assert_eq!(
        f.scheduler.cancel(job.id).await.unwrap(),
        CancelOutcome::AlreadyFinished(JobStatus::Cancelled)
    );
}

#[tokio::test]
async fn test_cancelling_pending_and_unknown_jobs() {
    let f = fixture(ScriptedHandler::default(), options()).await;
    let job = analysis_job(&f.jobs, 1, 0).await;

    assert_eq!(
        f.scheduler.cancel(job.id).await.unwrap(),
        CancelOutcome::Cancelled
    );
    assert_eq!(
        f.jobs.find_by_id(job.id).await.unwrap().unwrap().status,
        JobStatus::Cancelled
    );
    assert!(f.scheduler.poll().await.unwrap().is_none());

    assert_eq!(
        f.scheduler.cancel(Uuid::new_v4()).await.unwrap(),
        CancelOutcome::NotFound
    );
}

#[tokio::test]
async fn test_rate_limited_items_are_retried() {
    let handler = ScriptedHandler {
        rate_limited_attempts: 2,
        ..Default::default()
    };
    let f = fixture(handler, options()).await;
    let job = analysis_job(&f.jobs, 1, 0).await;

    f.scheduler.poll().await.unwrap().unwrap().await.unwrap();

    let stored = f.jobs.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.failed_items, 0);
    assert_eq!(f.handler.attempts(0), 3);
    assert!(f.handler.recorded_failures.lock().is_empty());
}

#[tokio::test]
async fn test_exhausted_retries_record_an_item_error() {
    let handler = ScriptedHandler {
        rate_limited_attempts: u32::MAX,
        ..Default::default()
    };
    let f = fixture(
        handler,
        SchedulerOptions {
            max_rate_limit_retries: 2,
            ..options()
        },
    )
    .await;
    let job = analysis_job(&f.jobs, 1, 0).await;

    f.scheduler.poll().await.unwrap().unwrap().await.unwrap();

    let stored = f.jobs.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(f.handler.attempts(0), 3);
    assert_eq!(
        f.handler.recorded_failures.lock().clone(),
        vec![(0, ItemError::RateLimited("pagespeed".to_string()))]
    );
}

#[tokio::test]
async fn test_unplannable_job_fails_fast() {
    let handler = ScriptedHandler {
        reject_plan: true,
        ..Default::default()
    };
    let f = fixture(handler, options()).await;
    let job = analysis_job(&f.jobs, 2, 0).await;

    assert!(f.scheduler.poll().await.unwrap().is_none());

    let stored = f.jobs.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(stored.processed_items, 0);
    assert!(stored.error.is_some());
    assert!(!f.scheduler.is_busy());
}

#[tokio::test]
async fn test_interrupted_runs_are_recovered() {
    let f = fixture(ScriptedHandler::default(), options()).await;
    let job = analysis_job(&f.jobs, 1, 0).await;
    // Simulates a process that died mid-run
    f.jobs.claim_next(JobType::Analysis).await.unwrap().unwrap();

    assert_eq!(f.scheduler.recover_interrupted().await.unwrap(), 1);

    let stored = f.jobs.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(stored.error.as_deref(), Some("interrupted"));
}

#[tokio::test]
async fn test_poll_loop_picks_up_new_jobs() {
    let f = fixture(ScriptedHandler::default(), options()).await;
    let shutdown = CancellationToken::new();
    let scheduler: Arc<dyn Scheduler> = f.scheduler.clone();
    let handle = scheduler.spawn(shutdown.clone());

    let job = analysis_job(&f.jobs, 2, 0).await;

    let mut status = JobStatus::Pending;
    for _ in 0..200 {
        status = f.jobs.find_by_id(job.id).await.unwrap().unwrap().status;
        if status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(status, JobStatus::Completed);

    shutdown.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_shutdown_waits_for_running_job_to_record_cancellation() {
    let handler = ScriptedHandler {
        wait_for_cancel: true,
        ..Default::default()
    };
    let f = fixture(handler, options()).await;
    let job = analysis_job(&f.jobs, 2, 0).await;

    let shutdown = CancellationToken::new();
    let scheduler: Arc<dyn Scheduler> = f.scheduler.clone();
    let handle = scheduler.spawn(shutdown.clone());
    while f.handler.attempts(0) == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    shutdown.cancel();
    handle.await.unwrap();

    let stored = f.jobs.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Cancelled);
    assert!(stored.completed_at.is_some());
    assert!(!f.scheduler.is_busy());
}

/// 丢弃进度写入的仓库，模拟落后于内存进度的存储
struct StaleProgress(Arc<JobRepositoryImpl>);

#[async_trait]
impl JobRepository for StaleProgress {
    async fn create(&self, job: &Job) -> Result<Job, RepositoryError> {
        self.0.create(job).await
    }
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Job>, RepositoryError> {
        self.0.find_by_id(id).await
    }
    async fn claim_next(&self, job_type: JobType) -> Result<Option<Job>, RepositoryError> {
        self.0.claim_next(job_type).await
    }
    async fn update_progress(
        &self,
        _id: Uuid,
        _progress: JobProgress,
    ) -> Result<(), RepositoryError> {
        Ok(())
    }
    async fn finish(&self, job: &Job) -> Result<bool, RepositoryError> {
        self.0.finish(job).await
    }
    async fn cancel_pending(&self, id: Uuid) -> Result<bool, RepositoryError> {
        self.0.cancel_pending(id).await
    }
    async fn fail_interrupted(&self, job_type: JobType) -> Result<u64, RepositoryError> {
        self.0.fail_interrupted(job_type).await
    }
    async fn list_recent(&self, limit: u64) -> Result<Vec<Job>, RepositoryError> {
        self.0.list_recent(limit).await
    }
}

#[tokio::test]
async fn test_service_reads_live_progress_of_running_job() {
    let store = Arc::new(JobRepositoryImpl::new(setup_db().await));
    let jobs: Arc<dyn JobRepository> = Arc::new(StaleProgress(store.clone()));
    let handler = Arc::new(ScriptedHandler {
        hold_from: Some(1),
        ..Default::default()
    });
    let scheduler = Arc::new(JobScheduler::new(
        handler.clone(),
        jobs.clone(),
        SchedulerOptions {
            batch_size: 1,
            ..options()
        },
    ));
    let service = JobService::new(jobs, vec![scheduler.clone() as Arc<dyn Scheduler>]);
    let job = analysis_job(&store, 3, 0).await;

    let running = scheduler.poll().await.unwrap().unwrap();
    while handler.attempts(1) == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let stored = store.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(stored.processed_items, 0);

    let live = service.get(job.id).await.unwrap();
    assert_eq!(live.status, JobStatus::Running);
    assert_eq!(live.processed_items, 1);
    assert_eq!(live.failed_items, 0);
    assert_eq!(live.total_items, 3);

    assert_eq!(service.cancel(job.id).await.unwrap(), CancelOutcome::Signalled);
    running.await.unwrap();

    let finished = service.get(job.id).await.unwrap();
    assert_eq!(finished.status, JobStatus::Cancelled);
}
