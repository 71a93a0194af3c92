// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::models::job::{Job, JobConfig, JobProgress, JobStatus, JobType};
use crate::domain::repositories::job_repository::{JobRepository, RepositoryError};
use crate::infrastructure::database::entities::job as job_entity;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{
    sea_query::{Expr, LockBehavior, LockType},
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// 任务仓库实现
///
/// 基于SeaORM实现的任务数据访问层
#[derive(Clone)]
pub struct JobRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl JobRepositoryImpl {
    /// 创建新的任务仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    ///
    /// # 返回值
    ///
    /// 返回新的任务仓库实例
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl TryFrom<job_entity::Model> for Job {
    type Error = RepositoryError;

    fn try_from(model: job_entity::Model) -> Result<Self, Self::Error> {
        let job_type: JobType = model
            .job_type
            .parse()
            .map_err(|e| RepositoryError::Serialization(format!("{}", e)))?;
        let status: JobStatus = model
            .status
            .parse()
            .map_err(|e| RepositoryError::Serialization(format!("{}", e)))?;
        let config = JobConfig::parse(job_type, model.config)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

        Ok(Self {
            id: model.id,
            job_type,
            status,
            provider: model.provider,
            config,
            progress: model.progress,
            total_items: model.total_items,
            processed_items: model.processed_items,
            failed_items: model.failed_items,
            error: model.error,
            created_at: model.created_at,
            started_at: model.started_at,
            completed_at: model.completed_at,
            updated_at: model.updated_at,
        })
    }
}

impl From<&Job> for job_entity::ActiveModel {
    fn from(job: &Job) -> Self {
        Self {
            id: Set(job.id),
            job_type: Set(job.job_type.to_string()),
            status: Set(job.status.to_string()),
            provider: Set(job.provider.clone()),
            config: Set(job.config.to_value()),
            progress: Set(job.progress),
            total_items: Set(job.total_items),
            processed_items: Set(job.processed_items),
            failed_items: Set(job.failed_items),
            error: Set(job.error.clone()),
            created_at: Set(job.created_at),
            started_at: Set(job.started_at),
            completed_at: Set(job.completed_at),
            updated_at: Set(job.updated_at),
        }
    }
}

fn now() -> DateTime<FixedOffset> {
    Utc::now().into()
}

#[async_trait]
impl JobRepository for JobRepositoryImpl {
    async fn create(&self, job: &Job) -> Result<Job, RepositoryError> {
        let model: job_entity::ActiveModel = job.into();

        model.insert(self.db.as_ref()).await?;
        Ok(job.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Job>, RepositoryError> {
        let model = job_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;

        model.map(Job::try_from).transpose()
    }

    async fn claim_next(&self, job_type: JobType) -> Result<Option<Job>, RepositoryError> {
        let txn = self.db.begin().await?;

        let candidate = job_entity::Entity::find()
            .filter(job_entity::Column::JobType.eq(job_type.as_str()))
            .filter(job_entity::Column::Status.eq(JobStatus::Pending.as_str()))
            .order_by_asc(job_entity::Column::CreatedAt)
            .lock_with_behavior(LockType::Update, LockBehavior::SkipLocked)
            .one(&txn)
            .await?;

        let Some(model) = candidate else {
            txn.commit().await?;
            return Ok(None);
        };

        // Config written by an external collaborator may be unreadable; fail it right here
        let job = match Job::try_from(model.clone()) {
            Ok(job) => job,
            Err(e) => {
                let message = format!("invalid config: {}", e);
                let mut active: job_entity::ActiveModel = model.into();
                let at = now();
                active.status = Set(JobStatus::Failed.to_string());
                active.error = Set(Some(message.clone()));
                active.started_at = Set(Some(at));
                active.completed_at = Set(Some(at));
                active.updated_at = Set(at);
                active.update(&txn).await?;
                txn.commit().await?;
                warn!(job_type = %job_type, "Failed unreadable job at claim time: {}", message);
                return Err(e);
            }
        };

        let job = job
            .start()
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

        // Guarded on the status so a concurrent claimer cannot take the same row
        let result = job_entity::Entity::update_many()
            .col_expr(
                job_entity::Column::Status,
                Expr::value(JobStatus::Running.as_str()),
            )
            .col_expr(job_entity::Column::StartedAt, Expr::value(job.started_at))
            .col_expr(job_entity::Column::UpdatedAt, Expr::value(job.updated_at))
            .filter(job_entity::Column::Id.eq(job.id))
            .filter(job_entity::Column::Status.eq(JobStatus::Pending.as_str()))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        if result.rows_affected == 0 {
            return Ok(None);
        }
        Ok(Some(job))
    }

    async fn update_progress(
        &self,
        id: Uuid,
        progress: JobProgress,
    ) -> Result<(), RepositoryError> {
        job_entity::Entity::update_many()
            .col_expr(
                job_entity::Column::ProcessedItems,
                Expr::value(progress.processed_items),
            )
            .col_expr(job_entity::Column::FailedItems, Expr::value(progress.failed_items))
            .col_expr(job_entity::Column::TotalItems, Expr::value(progress.total_items))
            .col_expr(job_entity::Column::Progress, Expr::value(progress.percent()))
            .col_expr(job_entity::Column::UpdatedAt, Expr::value(now()))
            .filter(job_entity::Column::Id.eq(id))
            .filter(job_entity::Column::Status.eq(JobStatus::Running.as_str()))
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }

    async fn finish(&self, job: &Job) -> Result<bool, RepositoryError> {
        if !job.status.is_terminal() {
            return Err(RepositoryError::Serialization(format!(
                "{} is not a terminal status",
                job.status
            )));
        }

        let result = job_entity::Entity::update_many()
            .col_expr(job_entity::Column::Status, Expr::value(job.status.as_str()))
            .col_expr(job_entity::Column::Error, Expr::value(job.error.clone()))
            .col_expr(job_entity::Column::CompletedAt, Expr::value(job.completed_at))
            .col_expr(job_entity::Column::UpdatedAt, Expr::value(job.updated_at))
            .filter(job_entity::Column::Id.eq(job.id))
            .filter(job_entity::Column::Status.eq(JobStatus::Running.as_str()))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn cancel_pending(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let at = now();
        let result = job_entity::Entity::update_many()
            .col_expr(
                job_entity::Column::Status,
                Expr::value(JobStatus::Cancelled.as_str()),
            )
            .col_expr(job_entity::Column::CompletedAt, Expr::value(Some(at)))
            .col_expr(job_entity::Column::UpdatedAt, Expr::value(at))
            .filter(job_entity::Column::Id.eq(id))
            .filter(job_entity::Column::Status.eq(JobStatus::Pending.as_str()))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn fail_interrupted(&self, job_type: JobType) -> Result<u64, RepositoryError> {
        let at = now();
        let result = job_entity::Entity::update_many()
            .col_expr(
                job_entity::Column::Status,
                Expr::value(JobStatus::Failed.as_str()),
            )
            .col_expr(
                job_entity::Column::Error,
                Expr::value(Some("interrupted".to_string())),
            )
            .col_expr(job_entity::Column::CompletedAt, Expr::value(Some(at)))
            .col_expr(job_entity::Column::UpdatedAt, Expr::value(at))
            .filter(job_entity::Column::JobType.eq(job_type.as_str()))
            .filter(job_entity::Column::Status.eq(JobStatus::Running.as_str()))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected)
    }

    async fn list_recent(&self, limit: u64) -> Result<Vec<Job>, RepositoryError> {
        let models = job_entity::Entity::find()
            .order_by_desc(job_entity::Column::CreatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await?;

        Ok(models
            .into_iter()
            .filter_map(|model| {
                let id = model.id;
                Job::try_from(model)
                    .map_err(|e| warn!(job_id = %id, "Skipping unreadable job: {}", e))
                    .ok()
            })
            .collect())
    }
}
