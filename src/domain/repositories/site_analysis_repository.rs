// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::job_repository::RepositoryError;
use crate::domain::models::site_analysis::{AnalysisScores, ProbeCaptures, SiteAnalysis};
use async_trait::async_trait;
use uuid::Uuid;

/// 站点分析仓库特质
///
/// `complete` 与 `mark_error` 只作用于 pending 记录，且各自是一条 UPDATE 语句
#[async_trait]
pub trait SiteAnalysisRepository: Send + Sync {
    /// 为 (任务, 站点) 创建 pending 记录；已存在时返回已有记录
    async fn ensure_pending(
        &self,
        site_id: Uuid,
        analysis_job_id: Uuid,
    ) -> Result<SiteAnalysis, RepositoryError>;
    /// 写入原始数据与全部评分字段
    async fn complete(
        &self,
        id: Uuid,
        captures: &ProbeCaptures,
        scores: &AnalysisScores,
    ) -> Result<(), RepositoryError>;
    /// 标记为 error，评分字段保持为空
    async fn mark_error(&self, id: Uuid, error: &str) -> Result<(), RepositoryError>;
    /// 按任务与站点查找
    async fn find_for_job(
        &self,
        site_id: Uuid,
        analysis_job_id: Uuid,
    ) -> Result<Option<SiteAnalysis>, RepositoryError>;
    /// 站点最近创建的一条分析记录
    async fn find_latest(&self, site_id: Uuid) -> Result<Option<SiteAnalysis>, RepositoryError>;
    /// 站点最近一条已完成的分析记录
    async fn find_latest_completed(
        &self,
        site_id: Uuid,
    ) -> Result<Option<SiteAnalysis>, RepositoryError>;
}
