// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use metrics::{counter, histogram};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::settings::SchedulerSettings;
use crate::domain::models::job::{DomainError, Job, JobProgress, JobStatus, JobType};
use crate::domain::repositories::job_repository::{JobRepository, RepositoryError};
use crate::infrastructure::metrics::{
    ITEMS_FAILED, ITEMS_PROCESSED, ITEM_RETRIES, JOBS_CLAIMED, JOBS_FINISHED, JOB_DURATION,
};
use crate::queue::progress::{spawn_progress_writer, ProgressReporter};
use crate::workers::handler::{ItemError, JobHandler};

/// 调度器错误类型
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// 仓库错误
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// 非法的状态转换
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

/// 取消请求的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// 运行中的任务已收到取消信号，将在下一个批次边界结束
    Signalled,
    /// 待处理任务被直接置为 cancelled
    Cancelled,
    /// 任务已处于终态，未做任何修改
    AlreadyFinished(JobStatus),
    /// 任务不存在
    NotFound,
}

/// 调度器运行参数
#[derive(Debug, Clone, Copy)]
pub struct SchedulerOptions {
    pub poll_interval: Duration,
    pub batch_size: usize,
    pub rate_limit_backoff: Duration,
    pub max_rate_limit_retries: u32,
}

impl SchedulerOptions {
    pub fn from_settings(settings: &SchedulerSettings, job_type: JobType) -> Self {
        Self {
            poll_interval: settings.poll_interval(),
            batch_size: settings.batch_sizes.for_job_type(job_type),
            rate_limit_backoff: settings.rate_limit_backoff(),
            max_rate_limit_retries: settings.max_rate_limit_retries,
        }
    }
}

/// 登记在调度器中的运行中任务
struct RunningJob {
    cancel: CancellationToken,
    progress: watch::Receiver<JobProgress>,
}

/// 与处理器类型无关的调度器接口
///
/// 供任务服务与工作管理器按任务类型路由
#[async_trait]
pub trait Scheduler: Send + Sync {
    fn job_type(&self) -> JobType;

    /// 取消任务
    async fn cancel(&self, job_id: Uuid) -> Result<CancelOutcome, SchedulerError>;

    /// 订阅运行中任务的实时进度
    fn watch_progress(&self, job_id: Uuid) -> Option<watch::Receiver<JobProgress>>;

    /// 将上次进程遗留的 running 任务标记为失败
    async fn recover_interrupted(&self) -> Result<u64, SchedulerError>;

    /// 启动轮询循环，直到 `shutdown` 被取消
    ///
    /// 返回的句柄在运行中的任务写入终态之后才结束
    fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()>;
}

/// 任务调度器
///
/// 每种任务类型一个实例。同一时间最多运行一个任务：
/// 认领由 `claim_lock` 串行化，运行中的任务登记在 `registry` 中。
pub struct JobScheduler<H: JobHandler> {
    handler: Arc<H>,
    jobs: Arc<dyn JobRepository>,
    options: SchedulerOptions,
    registry: Mutex<HashMap<Uuid, RunningJob>>,
    claim_lock: tokio::sync::Mutex<()>,
}

impl<H: JobHandler> JobScheduler<H> {
    pub fn new(handler: Arc<H>, jobs: Arc<dyn JobRepository>, options: SchedulerOptions) -> Self {
        Self {
            handler,
            jobs,
            options,
            registry: Mutex::new(HashMap::new()),
            claim_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// 是否有任务正在运行
    pub fn is_busy(&self) -> bool {
        !self.registry.lock().is_empty()
    }

    /// 认领并启动下一个待处理任务
    ///
    /// # 返回值
    ///
    /// * `Ok(Some(JoinHandle))` - 已启动的任务执行句柄
    /// * `Ok(None)` - 已有任务在运行或队列为空
    /// * `Err(SchedulerError)` - 认领失败
    pub async fn poll(self: &Arc<Self>) -> Result<Option<JoinHandle<()>>, SchedulerError> {
        let _guard = self.claim_lock.lock().await;

        if self.is_busy() {
            return Ok(None);
        }

        let Some(job) = self.jobs.claim_next(self.handler.job_type()).await? else {
            return Ok(None);
        };

        counter!(JOBS_CLAIMED, "job_type" => job.job_type.as_str()).increment(1);
        info!(job_id = %job.id, job_type = %job.job_type, "Job claimed");

        let items = match self.handler.plan(&job) {
            Ok(items) => items,
            Err(e) => {
                error!(job_id = %job.id, "Job cannot be planned: {}", e);
                let job_type = job.job_type;
                self.finish(job, JobStatus::Failed, Some(e.to_string())).await?;
                counter!(JOBS_FINISHED, "job_type" => job_type.as_str(), "status" => "failed")
                    .increment(1);
                return Ok(None);
            }
        };

        let cancel = CancellationToken::new();
        let reporter = ProgressReporter::new(items.len() as i32);
        self.registry.lock().insert(
            job.id,
            RunningJob {
                cancel: cancel.clone(),
                progress: reporter.subscribe(),
            },
        );

        let scheduler = Arc::clone(self);
        Ok(Some(tokio::spawn(async move {
            scheduler.execute(job, items, reporter, cancel).await;
        })))
    }

    async fn execute(
        self: Arc<Self>,
        mut job: Job,
        items: Vec<H::Item>,
        mut reporter: ProgressReporter,
        cancel: CancellationToken,
    ) {
        let started = Instant::now();
        let (job_id, job_type) = (job.id, job.job_type);
        let writer = spawn_progress_writer(self.jobs.clone(), job_id, reporter.subscribe());

        for batch in items.chunks(self.options.batch_size.max(1)) {
            if cancel.is_cancelled() {
                break;
            }

            // Items start in config order; results are recorded as they settle
            let mut in_flight: FuturesUnordered<_> = batch
                .iter()
                .map(|item| self.process_item(job_id, item, &cancel))
                .collect();
            while let Some(result) = in_flight.next().await {
                reporter.record(result.is_ok());
            }
        }

        let progress = reporter.close();
        if let Err(e) = writer.await {
            warn!(job_id = %job_id, "Progress writer ended abnormally: {}", e);
        }

        let (status, message) = final_status(&progress, cancel.is_cancelled());
        job.record_progress(progress);
        match self.finish(job, status, message).await {
            Ok(true) => {}
            Ok(false) => warn!(job_id = %job_id, "Job was no longer running when finishing"),
            Err(e) => error!(job_id = %job_id, "Failed to finish job: {}", e),
        }
        self.registry.lock().remove(&job_id);

        let job_type = job_type.as_str();
        counter!(JOBS_FINISHED, "job_type" => job_type, "status" => status.as_str()).increment(1);
        counter!(ITEMS_PROCESSED, "job_type" => job_type)
            .increment(progress.processed_items as u64);
        counter!(ITEMS_FAILED, "job_type" => job_type).increment(progress.failed_items as u64);
        histogram!(JOB_DURATION, "job_type" => job_type).record(started.elapsed().as_secs_f64());

        info!(
            job_id = %job_id,
            status = %status,
            processed = progress.processed_items,
            failed = progress.failed_items,
            total = progress.total_items,
            "Job finished"
        );
    }

    /// 在内存中完成状态转换后写入仓库
    async fn finish(
        &self,
        job: Job,
        status: JobStatus,
        message: Option<String>,
    ) -> Result<bool, SchedulerError> {
        let job = job.finish(status, message)?;
        Ok(self.jobs.finish(&job).await?)
    }

    /// 执行单个工作单元，限流时按固定退避重试
    async fn process_item(
        &self,
        job_id: Uuid,
        item: &H::Item,
        cancel: &CancellationToken,
    ) -> Result<(), ItemError> {
        let mut retries = 0;
        let result = loop {
            match self.handler.process(job_id, item, cancel).await {
                Err(ItemError::RateLimited(provider))
                    if retries < self.options.max_rate_limit_retries =>
                {
                    retries += 1;
                    counter!(ITEM_RETRIES, "provider" => provider.clone()).increment(1);
                    warn!(
                        job_id = %job_id,
                        item = %item,
                        retry = retries,
                        "Rate limited by {}, backing off",
                        provider
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => break Err(ItemError::Cancelled),
                        _ = tokio::time::sleep(self.options.rate_limit_backoff) => {}
                    }
                }
                other => break other,
            }
        };

        if let Err(e) = &result {
            warn!(job_id = %job_id, item = %item, "Work item failed: {}", e);
            self.handler.record_failure(job_id, item, e).await;
        }
        result
    }
}

/// 根据最终计数决定任务终态
///
/// 仅当所有工作单元都失败时任务才失败，部分失败记录在 error 字段中
pub fn final_status(progress: &JobProgress, cancelled: bool) -> (JobStatus, Option<String>) {
    if cancelled {
        return (JobStatus::Cancelled, None);
    }
    let JobProgress {
        failed_items,
        total_items,
        ..
    } = *progress;
    if total_items > 0 && failed_items >= total_items {
        return (
            JobStatus::Failed,
            Some(format!("all {} items failed", total_items)),
        );
    }
    if failed_items > 0 {
        return (
            JobStatus::Completed,
            Some(format!("{} of {} items failed", failed_items, total_items)),
        );
    }
    (JobStatus::Completed, None)
}

#[async_trait]
impl<H: JobHandler> Scheduler for JobScheduler<H> {
    fn job_type(&self) -> JobType {
        self.handler.job_type()
    }

    async fn cancel(&self, job_id: Uuid) -> Result<CancelOutcome, SchedulerError> {
        // Serialised with claiming so a job cannot slip between the two checks
        let _guard = self.claim_lock.lock().await;

        let running = self
            .registry
            .lock()
            .get(&job_id)
            .map(|running| running.cancel.clone());
        if let Some(token) = running {
            token.cancel();
            info!(job_id = %job_id, "Cancellation requested for running job");
            return Ok(CancelOutcome::Signalled);
        }

        if self.jobs.cancel_pending(job_id).await? {
            info!(job_id = %job_id, "Pending job cancelled");
            counter!(JOBS_FINISHED, "job_type" => self.handler.job_type().as_str(), "status" => "cancelled")
                .increment(1);
            return Ok(CancelOutcome::Cancelled);
        }

        Ok(match self.jobs.find_by_id(job_id).await? {
            Some(job) => CancelOutcome::AlreadyFinished(job.status),
            None => CancelOutcome::NotFound,
        })
    }

    fn watch_progress(&self, job_id: Uuid) -> Option<watch::Receiver<JobProgress>> {
        self.registry
            .lock()
            .get(&job_id)
            .map(|running| running.progress.clone())
    }

    async fn recover_interrupted(&self) -> Result<u64, SchedulerError> {
        let count = self.jobs.fail_interrupted(self.handler.job_type()).await?;
        if count > 0 {
            warn!(
                job_type = %self.handler.job_type(),
                "Marked {} interrupted jobs as failed",
                count
            );
        }
        Ok(count)
    }

    fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.options.poll_interval);
            let mut executions: Vec<JoinHandle<()>> = Vec::new();
            info!(job_type = %self.handler.job_type(), "Scheduler started");

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {}
                }
                executions.retain(|handle| !handle.is_finished());
                match self.poll().await {
                    Ok(Some(handle)) => executions.push(handle),
                    Ok(None) => {}
                    Err(e) => {
                        error!(job_type = %self.handler.job_type(), "Scheduler poll failed: {}", e)
                    }
                }
            }

            // Running jobs stop at their next batch boundary and record `cancelled`
            let running: Vec<CancellationToken> = self
                .registry
                .lock()
                .values()
                .map(|running| running.cancel.clone())
                .collect();
            for token in running {
                token.cancel();
            }
            for handle in executions {
                if let Err(e) = handle.await {
                    error!(job_type = %self.handler.job_type(), "Job execution ended abnormally: {}", e);
                }
            }
            info!(job_type = %self.handler.job_type(), "Scheduler stopped");
        })
    }
}
