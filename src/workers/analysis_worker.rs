// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use crate::domain::models::job::{Job, JobConfig, JobType};
use crate::domain::services::analysis_orchestrator::{AnalysisError, AnalysisOrchestrator};
use crate::workers::handler::{HandlerError, ItemError, JobHandler};

impl From<AnalysisError> for ItemError {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::RateLimited(provider) => ItemError::RateLimited(provider.to_string()),
            AnalysisError::SiteNotFound(_) => ItemError::Validation(err.to_string()),
            AnalysisError::Cancelled => ItemError::Cancelled,
            AnalysisError::Repository(_) => ItemError::Failed(err.to_string()),
        }
    }
}

/// 技术分析任务处理器
///
/// 每个工作单元是一个站点 ID
pub struct AnalysisHandler {
    orchestrator: Arc<AnalysisOrchestrator>,
}

impl AnalysisHandler {
    pub fn new(orchestrator: Arc<AnalysisOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl JobHandler for AnalysisHandler {
    type Item = Uuid;

    fn job_type(&self) -> JobType {
        JobType::Analysis
    }

    fn plan(&self, job: &Job) -> Result<Vec<Uuid>, HandlerError> {
        match &job.config {
            JobConfig::Analysis(_) => Ok(job.config.site_ids()),
            _ => Err(HandlerError::ConfigMismatch {
                expected: JobType::Analysis,
            }),
        }
    }

    async fn process(
        &self,
        job_id: Uuid,
        site_id: &Uuid,
        cancel: &CancellationToken,
    ) -> Result<(), ItemError> {
        self.orchestrator.run(job_id, *site_id, cancel).await?;
        Ok(())
    }

    async fn record_failure(&self, job_id: Uuid, site_id: &Uuid, error: &ItemError) {
        // Rows left pending by rate limiting are settled here
        if let Err(e) = self
            .orchestrator
            .record_failure(job_id, *site_id, &error.to_string())
            .await
        {
            warn!(job_id = %job_id, site_id = %site_id, "Failed to mark analysis error: {}", e);
        }
    }
}
