// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::job::{Job, JobProgress, JobType};
use async_trait::async_trait;
use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

/// 仓库错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    /// 记录未找到
    #[error("Record not found")]
    NotFound,
    /// 持久化数据无法还原为领域对象
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

/// 任务仓库特质
///
/// 所有状态变更都是以当前状态为条件的单行更新，
/// 因此非法的状态转换在存储层同样无法发生。
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// 创建新任务
    async fn create(&self, job: &Job) -> Result<Job, RepositoryError>;
    /// 根据ID查找任务
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Job>, RepositoryError>;
    /// 认领指定类型最早创建的待处理任务并置为 running
    async fn claim_next(&self, job_type: JobType) -> Result<Option<Job>, RepositoryError>;
    /// 写入运行中任务的进度计数
    async fn update_progress(&self, id: Uuid, progress: JobProgress)
        -> Result<(), RepositoryError>;
    /// 写入已完成状态转换的任务，仅当存储中仍为 running 时生效，返回是否发生了更新
    async fn finish(&self, job: &Job) -> Result<bool, RepositoryError>;
    /// 直接取消待处理任务，返回是否发生了更新
    async fn cancel_pending(&self, id: Uuid) -> Result<bool, RepositoryError>;
    /// 将遗留的 running 任务标记为失败（进程崩溃后启动时调用）
    async fn fail_interrupted(&self, job_type: JobType) -> Result<u64, RepositoryError>;
    /// 最近创建的任务
    async fn list_recent(&self, limit: u64) -> Result<Vec<Job>, RepositoryError>;
}
