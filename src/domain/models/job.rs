// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use url::Url;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

/// 任务实体
///
/// 表示一个异步执行的工作单元，例如站点发现、联系人补全、
/// 技术分析或报告生成。任务只会由一个调度器实例执行，
/// 进入终态后不会再被重新激活。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// 任务唯一标识符
    pub id: Uuid,
    /// 任务类型，决定由哪个调度器处理
    #[serde(rename = "type")]
    pub job_type: JobType,
    /// 任务状态
    pub status: JobStatus,
    /// 数据提供方（仅作信息展示）
    pub provider: Option<String>,
    /// 已校验的任务配置
    pub config: JobConfig,
    /// 进度百分比 (0-100)，由已处理数/总数推导
    pub progress: i32,
    /// 工作项总数
    pub total_items: i32,
    /// 已处理（成功或失败）的工作项数
    pub processed_items: i32,
    /// 失败的工作项数
    pub failed_items: i32,
    /// 错误信息
    pub error: Option<String>,
    /// 创建时间
    pub created_at: DateTime<FixedOffset>,
    /// 开始执行时间，仅在进入 running 时设置
    pub started_at: Option<DateTime<FixedOffset>>,
    /// 完成时间，仅在进入终态时设置
    pub completed_at: Option<DateTime<FixedOffset>>,
    /// 最后更新时间
    pub updated_at: DateTime<FixedOffset>,
}

/// 任务类型枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// 站点发现
    Discovery,
    /// 联系人补全
    Enrichment,
    /// 站点技术分析
    Analysis,
    /// 报告生成
    Report,
}

impl JobType {
    /// 所有任务类型，按调度器启动顺序排列
    pub const ALL: [JobType; 4] = [
        JobType::Discovery,
        JobType::Enrichment,
        JobType::Analysis,
        JobType::Report,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Discovery => "discovery",
            JobType::Enrichment => "enrichment",
            JobType::Analysis => "analysis",
            JobType::Report => "report",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "discovery" => Ok(JobType::Discovery),
            "enrichment" => Ok(JobType::Enrichment),
            "analysis" => Ok(JobType::Analysis),
            "report" => Ok(JobType::Report),
            other => Err(DomainError::ValidationError(format!(
                "unknown job type: {}",
                other
            ))),
        }
    }
}

/// 任务状态枚举
///
/// 状态转换遵循以下流程：
/// Pending → Running → Completed/Failed/Cancelled，以及 Pending → Cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// 等待调度
    #[default]
    Pending,
    /// 执行中
    Running,
    /// 已完成（可能包含部分失败的工作项）
    Completed,
    /// 全部工作项失败，或任务级错误
    Failed,
    /// 已取消
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(DomainError::ValidationError(format!(
                "unknown job status: {}",
                other
            ))),
        }
    }
}

/// 领域错误类型
#[derive(Error, Debug)]
pub enum DomainError {
    /// 无效的状态转换
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: JobStatus, to: JobStatus },

    /// 验证错误
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// 任务配置错误
#[derive(Error, Debug)]
pub enum JobConfigError {
    /// JSON 结构与任务类型不匹配
    #[error("malformed {job_type} config: {source}")]
    Malformed {
        job_type: JobType,
        #[source]
        source: serde_json::Error,
    },

    /// 字段校验失败
    #[error("invalid {job_type} config: {source}")]
    Invalid {
        job_type: JobType,
        #[source]
        source: ValidationErrors,
    },
}

/// 面向一组站点的任务配置（补全、分析、报告）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SiteBatchConfig {
    /// 目标站点 ID 列表
    #[validate(length(min = 1, max = 1000))]
    pub site_ids: Vec<Uuid>,
}

/// 站点发现任务配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DiscoveryConfig {
    /// 候选站点 URL
    #[validate(length(min = 1, max = 1000), custom(function = "validate_http_urls"))]
    pub urls: Vec<String>,
}

fn validate_http_urls(urls: &[String]) -> Result<(), ValidationError> {
    for raw in urls {
        let parsed = Url::parse(raw).map_err(|_| ValidationError::new("invalid_url"))?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(ValidationError::new("invalid_url"));
        }
    }
    Ok(())
}

/// 任务配置（按任务类型区分的标签联合）
///
/// 在首次读取 JSON 的边界处完成解析与校验，内部代码不再重新解析原始 JSON。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum JobConfig {
    Discovery(DiscoveryConfig),
    Enrichment(SiteBatchConfig),
    Analysis(SiteBatchConfig),
    Report(SiteBatchConfig),
}

impl JobConfig {
    /// 根据任务类型解析并校验原始配置
    pub fn parse(job_type: JobType, raw: serde_json::Value) -> Result<Self, JobConfigError> {
        let malformed = |source| JobConfigError::Malformed { job_type, source };
        let invalid = |source| JobConfigError::Invalid { job_type, source };

        let config = match job_type {
            JobType::Discovery => {
                let config: DiscoveryConfig = serde_json::from_value(raw).map_err(malformed)?;
                config.validate().map_err(invalid)?;
                JobConfig::Discovery(config)
            }
            JobType::Enrichment | JobType::Analysis | JobType::Report => {
                let config: SiteBatchConfig = serde_json::from_value(raw).map_err(malformed)?;
                config.validate().map_err(invalid)?;
                match job_type {
                    JobType::Enrichment => JobConfig::Enrichment(config),
                    JobType::Analysis => JobConfig::Analysis(config),
                    _ => JobConfig::Report(config),
                }
            }
        };
        Ok(config)
    }

    pub fn job_type(&self) -> JobType {
        match self {
            JobConfig::Discovery(_) => JobType::Discovery,
            JobConfig::Enrichment(_) => JobType::Enrichment,
            JobConfig::Analysis(_) => JobType::Analysis,
            JobConfig::Report(_) => JobType::Report,
        }
    }

    /// 站点类任务的目标站点（去重并保持原始顺序）
    pub fn site_ids(&self) -> Vec<Uuid> {
        match self {
            JobConfig::Discovery(_) => Vec::new(),
            JobConfig::Enrichment(c) | JobConfig::Analysis(c) | JobConfig::Report(c) => {
                let mut seen = std::collections::HashSet::new();
                c.site_ids
                    .iter()
                    .copied()
                    .filter(|id| seen.insert(*id))
                    .collect()
            }
        }
    }

    /// 序列化为持久化用的 JSON
    pub fn to_value(&self) -> serde_json::Value {
        // Plain structs of strings and uuids always serialize
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// 任务进度计数快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    pub processed_items: i32,
    pub failed_items: i32,
    pub total_items: i32,
}

impl JobProgress {
    pub fn new(total_items: i32) -> Self {
        Self {
            processed_items: 0,
            failed_items: 0,
            total_items,
        }
    }

    /// 派生的进度百分比
    pub fn percent(&self) -> i32 {
        progress_percent(self.processed_items, self.total_items)
    }
}

/// 计算进度百分比
///
/// `total_items` 为 0 时返回 0
pub fn progress_percent(processed_items: i32, total_items: i32) -> i32 {
    if total_items <= 0 {
        return 0;
    }
    let ratio = processed_items.max(0) as f64 / total_items as f64;
    ((ratio * 100.0).round() as i32).clamp(0, 100)
}

impl Job {
    /// 创建一个新的待处理任务
    pub fn new(config: JobConfig, provider: Option<String>) -> Self {
        let now: DateTime<FixedOffset> = Utc::now().into();
        Self {
            id: Uuid::new_v4(),
            job_type: config.job_type(),
            status: JobStatus::Pending,
            provider,
            config,
            progress: 0,
            total_items: 0,
            processed_items: 0,
            failed_items: 0,
            error: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
        }
    }

    /// 启动任务：Pending → Running
    pub fn start(mut self) -> Result<Self, DomainError> {
        self.transition(JobStatus::Running)?;
        self.started_at = Some(Utc::now().into());
        Ok(self)
    }

    /// 完成任务：Running → Completed
    pub fn complete(mut self) -> Result<Self, DomainError> {
        self.transition(JobStatus::Completed)?;
        Ok(self)
    }

    /// 标记失败：Running → Failed
    pub fn fail(mut self, error: impl Into<String>) -> Result<Self, DomainError> {
        self.transition(JobStatus::Failed)?;
        self.error = Some(error.into());
        Ok(self)
    }

    /// 取消任务：Pending/Running → Cancelled
    pub fn cancel(mut self) -> Result<Self, DomainError> {
        self.transition(JobStatus::Cancelled)?;
        Ok(self)
    }

    /// 按调度结果写入终态
    ///
    /// `error` 在 completed 时保存部分失败的摘要
    pub fn finish(self, status: JobStatus, error: Option<String>) -> Result<Self, DomainError> {
        match status {
            JobStatus::Completed => {
                let mut job = self.complete()?;
                job.error = error;
                Ok(job)
            }
            JobStatus::Failed => self.fail(error.unwrap_or_default()),
            JobStatus::Cancelled => self.cancel(),
            to => Err(DomainError::InvalidStateTransition {
                from: self.status,
                to,
            }),
        }
    }

    /// 更新计数并重新推导进度
    pub fn record_progress(&mut self, progress: JobProgress) {
        self.processed_items = progress.processed_items;
        self.failed_items = progress.failed_items;
        self.total_items = progress.total_items;
        self.progress = progress.percent();
        self.updated_at = Utc::now().into();
    }

    fn transition(&mut self, to: JobStatus) -> Result<(), DomainError> {
        if !Self::can_transition(self.status, to) {
            return Err(DomainError::InvalidStateTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        let now: DateTime<FixedOffset> = Utc::now().into();
        if to.is_terminal() {
            self.completed_at = Some(now);
        }
        self.updated_at = now;
        Ok(())
    }

    /// 判断状态转换是否合法
    pub fn can_transition(from: JobStatus, to: JobStatus) -> bool {
        matches!(
            (from, to),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Pending, JobStatus::Cancelled)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Cancelled)
        )
    }
}

#[cfg(test)]
#[path = "job_test.rs"]
mod tests;
