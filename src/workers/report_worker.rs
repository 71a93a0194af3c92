// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::domain::models::job::{Job, JobConfig, JobType};
use crate::domain::services::report_service::{ReportError, ReportService};
use crate::workers::handler::{HandlerError, ItemError, JobHandler};

impl From<ReportError> for ItemError {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::SiteNotFound(_) | ReportError::NoCompletedAnalysis(_) => {
                ItemError::Validation(err.to_string())
            }
            _ => ItemError::Failed(err.to_string()),
        }
    }
}

/// 报告生成任务处理器
pub struct ReportHandler {
    reports: Arc<ReportService>,
}

impl ReportHandler {
    pub fn new(reports: Arc<ReportService>) -> Self {
        Self { reports }
    }
}

#[async_trait]
impl JobHandler for ReportHandler {
    type Item = Uuid;

    fn job_type(&self) -> JobType {
        JobType::Report
    }

    fn plan(&self, job: &Job) -> Result<Vec<Uuid>, HandlerError> {
        match &job.config {
            JobConfig::Report(_) => Ok(job.config.site_ids()),
            _ => Err(HandlerError::ConfigMismatch {
                expected: JobType::Report,
            }),
        }
    }

    async fn process(
        &self,
        job_id: Uuid,
        site_id: &Uuid,
        cancel: &CancellationToken,
    ) -> Result<(), ItemError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(ItemError::Cancelled),
            result = self.reports.generate(job_id, *site_id) => result.map(|_| ()).map_err(Into::into),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repositories::storage_repository::StorageError;

    #[test]
    fn test_missing_inputs_are_not_retried() {
        let site_id = Uuid::new_v4();
        assert!(matches!(
            ItemError::from(ReportError::NoCompletedAnalysis(site_id)),
            ItemError::Validation(_)
        ));
        assert!(matches!(
            ItemError::from(ReportError::SiteNotFound(site_id)),
            ItemError::Validation(_)
        ));
        assert!(matches!(
            ItemError::from(ReportError::Storage(StorageError::InvalidKey("../x".into()))),
            ItemError::Failed(_)
        ));
    }
}
