// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::fmt::Display;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::domain::models::job::{Job, JobType};

/// 单个工作单元的错误
///
/// 只影响该工作单元，不会传播给同一任务中的其他单元
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ItemError {
    /// 外部服务限流，调度器退避后重试同一单元
    #[error("rate limited by {0}")]
    RateLimited(String),
    /// 输入无效，不重试
    #[error("{0}")]
    Validation(String),
    /// 其他失败
    #[error("{0}")]
    Failed(String),
    /// 任务取消时中止
    #[error("cancelled")]
    Cancelled,
}

/// 处理器级别的错误，导致整个任务立即失败
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("config does not match {expected} job")]
    ConfigMismatch { expected: JobType },
}

/// 任务处理器特质
///
/// 调度器负责认领、分批、进度与取消，处理器只描述单个工作单元如何执行
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    /// 工作单元类型（站点ID、URL 等）
    type Item: Display + Send + Sync + 'static;

    /// 处理器负责的任务类型
    fn job_type(&self) -> JobType;

    /// 把任务配置展开为按顺序处理的工作单元
    fn plan(&self, job: &Job) -> Result<Vec<Self::Item>, HandlerError>;

    /// 处理一个工作单元
    async fn process(
        &self,
        job_id: Uuid,
        item: &Self::Item,
        cancel: &CancellationToken,
    ) -> Result<(), ItemError>;

    /// 工作单元最终失败（包括重试耗尽）后的收尾
    async fn record_failure(&self, _job_id: Uuid, _item: &Self::Item, _error: &ItemError) {}
}
