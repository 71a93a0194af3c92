// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::info;
use uuid::Uuid;

use crate::domain::models::job::{Job, JobConfig, JobConfigError, JobProgress, JobStatus, JobType};
use crate::domain::repositories::job_repository::{JobRepository, RepositoryError};
use crate::queue::scheduler::{CancelOutcome, Scheduler, SchedulerError};

/// 队列错误类型
#[derive(Error, Debug)]
pub enum QueueError {
    /// 任务配置无效，不会写入存储
    #[error("Invalid config: {0}")]
    InvalidConfig(#[from] JobConfigError),

    /// 任务不存在
    #[error("Job {0} not found")]
    NotFound(Uuid),

    /// 仓库错误
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// 调度器错误
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// 没有注册该类型的调度器
    #[error("No scheduler registered for {0} jobs")]
    NoScheduler(JobType),
}

/// 任务服务
///
/// 外部协作方创建、查询和取消任务的统一入口
#[derive(Clone)]
pub struct JobService {
    jobs: Arc<dyn JobRepository>,
    schedulers: HashMap<JobType, Arc<dyn Scheduler>>,
}

impl JobService {
    pub fn new(jobs: Arc<dyn JobRepository>, schedulers: Vec<Arc<dyn Scheduler>>) -> Self {
        let schedulers = schedulers
            .into_iter()
            .map(|scheduler| (scheduler.job_type(), scheduler))
            .collect();
        Self { jobs, schedulers }
    }

    /// 校验配置并创建待处理任务
    ///
    /// # 参数
    ///
    /// * `job_type` - 任务类型
    /// * `config` - 原始 JSON 配置
    /// * `provider` - 数据提供方（仅作展示）
    ///
    /// # 返回值
    ///
    /// * `Ok(Uuid)` - 新任务的 ID
    /// * `Err(QueueError::InvalidConfig)` - 配置不合法，未写入存储
    pub async fn enqueue(
        &self,
        job_type: JobType,
        config: serde_json::Value,
        provider: Option<String>,
    ) -> Result<Uuid, QueueError> {
        let config = JobConfig::parse(job_type, config)?;
        let job = Job::new(config, provider);
        self.jobs.create(&job).await?;

        info!(job_id = %job.id, job_type = %job_type, "Job enqueued");
        Ok(job.id)
    }

    /// 读取任务；运行中的任务叠加内存中的最新进度
    pub async fn get(&self, job_id: Uuid) -> Result<Job, QueueError> {
        let mut job = self
            .jobs
            .find_by_id(job_id)
            .await?
            .ok_or(QueueError::NotFound(job_id))?;
        if job.status == JobStatus::Running {
            if let Some(progress) = self.watch(job.job_type, job_id) {
                job.record_progress(*progress.borrow());
            }
        }
        Ok(job)
    }

    pub async fn list_recent(&self, limit: u64) -> Result<Vec<Job>, QueueError> {
        Ok(self.jobs.list_recent(limit).await?)
    }

    /// 取消任务
    ///
    /// 运行中的任务由其调度器发出取消信号；已处于终态的任务不做修改
    pub async fn cancel(&self, job_id: Uuid) -> Result<CancelOutcome, QueueError> {
        let job = self.get(job_id).await?;
        let scheduler = self
            .schedulers
            .get(&job.job_type)
            .ok_or(QueueError::NoScheduler(job.job_type))?;

        match scheduler.cancel(job_id).await? {
            CancelOutcome::NotFound => Err(QueueError::NotFound(job_id)),
            outcome => Ok(outcome),
        }
    }

    /// 订阅运行中任务的实时进度，任务未在运行时返回 `None`
    pub fn watch(&self, job_type: JobType, job_id: Uuid) -> Option<watch::Receiver<JobProgress>> {
        self.schedulers
            .get(&job_type)
            .and_then(|scheduler| scheduler.watch_progress(job_id))
    }
}
