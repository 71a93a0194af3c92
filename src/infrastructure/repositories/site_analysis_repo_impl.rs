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

use crate::domain::models::site_analysis::{
    AnalysisScores, AnalysisStatus, ProbeCaptures, SiteAnalysis,
};
use crate::domain::repositories::job_repository::RepositoryError;
use crate::domain::repositories::site_analysis_repository::SiteAnalysisRepository;
use crate::infrastructure::database::entities::site_analysis as analysis_entity;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// 站点分析仓库实现
///
/// 终态写入都以 pending 为条件，保证每条记录只被结算一次
#[derive(Clone)]
pub struct SiteAnalysisRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl SiteAnalysisRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

fn decode<T: DeserializeOwned>(value: Option<serde_json::Value>) -> Result<Option<T>, RepositoryError> {
    value
        .filter(|v| !v.is_null())
        .map(serde_json::from_value)
        .transpose()
        .map_err(Into::into)
}

fn encode<T: Serialize>(value: Option<&T>) -> Result<Option<serde_json::Value>, RepositoryError> {
    value.map(serde_json::to_value).transpose().map_err(Into::into)
}

fn decode_scores(model: &analysis_entity::Model) -> Result<Option<AnalysisScores>, RepositoryError> {
    let (
        Some(health_score),
        Some(security_score),
        Some(performance_score),
        Some(seo_score),
        Some(availability_score),
        Some(priority),
        Some(action),
    ) = (
        model.health_score,
        model.security_score,
        model.performance_score,
        model.seo_score,
        model.availability_score,
        model.priority_classification.as_deref(),
        model.action_classification.as_deref(),
    )
    else {
        return Ok(None);
    };

    Ok(Some(AnalysisScores {
        health_score,
        security_score,
        performance_score,
        seo_score,
        availability_score,
        priority_classification: priority
            .parse()
            .map_err(|e| RepositoryError::Serialization(format!("{}", e)))?,
        action_classification: action
            .parse()
            .map_err(|e| RepositoryError::Serialization(format!("{}", e)))?,
        deductions: decode(model.deductions.clone())?.unwrap_or_default(),
    }))
}

impl TryFrom<analysis_entity::Model> for SiteAnalysis {
    type Error = RepositoryError;

    fn try_from(model: analysis_entity::Model) -> Result<Self, Self::Error> {
        let scores = decode_scores(&model)?;
        let status: AnalysisStatus = model
            .status
            .parse()
            .map_err(|e| RepositoryError::Serialization(format!("{}", e)))?;

        Ok(Self {
            id: model.id,
            site_id: model.site_id,
            analysis_job_id: model.analysis_job_id,
            status,
            captures: ProbeCaptures {
                pagespeed: decode(model.pagespeed)?,
                tls: decode(model.tls)?,
                wordpress: decode(model.wordpress)?,
                vulnerabilities: decode(model.vulnerabilities)?,
                security_headers: decode(model.security_headers)?,
                availability: decode(model.availability)?,
            },
            scores,
            error: model.error,
            created_at: model.created_at,
            analyzed_at: model.analyzed_at,
        })
    }
}

impl From<&SiteAnalysis> for analysis_entity::ActiveModel {
    fn from(analysis: &SiteAnalysis) -> Self {
        Self {
            id: Set(analysis.id),
            site_id: Set(analysis.site_id),
            analysis_job_id: Set(analysis.analysis_job_id),
            status: Set(analysis.status.to_string()),
            pagespeed: Set(None),
            tls: Set(None),
            wordpress: Set(None),
            vulnerabilities: Set(None),
            security_headers: Set(None),
            availability: Set(None),
            health_score: Set(None),
            security_score: Set(None),
            performance_score: Set(None),
            seo_score: Set(None),
            availability_score: Set(None),
            priority_classification: Set(None),
            action_classification: Set(None),
            deductions: Set(None),
            error: Set(analysis.error.clone()),
            created_at: Set(analysis.created_at),
            analyzed_at: Set(analysis.analyzed_at),
        }
    }
}

fn now() -> DateTime<FixedOffset> {
    Utc::now().into()
}

impl SiteAnalysisRepositoryImpl {
    async fn find_one(
        &self,
        site_id: Uuid,
        status: Option<AnalysisStatus>,
    ) -> Result<Option<SiteAnalysis>, RepositoryError> {
        let mut query = analysis_entity::Entity::find()
            .filter(analysis_entity::Column::SiteId.eq(site_id));
        if let Some(status) = status {
            query = query.filter(analysis_entity::Column::Status.eq(status.as_str()));
        }
        let model = query
            .order_by_desc(analysis_entity::Column::CreatedAt)
            .one(self.db.as_ref())
            .await?;
        model.map(SiteAnalysis::try_from).transpose()
    }
}

#[async_trait]
impl SiteAnalysisRepository for SiteAnalysisRepositoryImpl {
    async fn ensure_pending(
        &self,
        site_id: Uuid,
        analysis_job_id: Uuid,
    ) -> Result<SiteAnalysis, RepositoryError> {
        if let Some(existing) = self.find_for_job(site_id, analysis_job_id).await? {
            return Ok(existing);
        }

        let analysis = SiteAnalysis::pending(site_id, analysis_job_id);
        let model: analysis_entity::ActiveModel = (&analysis).into();
        model.insert(self.db.as_ref()).await?;
        Ok(analysis)
    }

    async fn complete(
        &self,
        id: Uuid,
        captures: &ProbeCaptures,
        scores: &AnalysisScores,
    ) -> Result<(), RepositoryError> {
        let deductions = serde_json::to_value(&scores.deductions)?;

        // Captures and every derived field land in one statement
        let result = analysis_entity::Entity::update_many()
            .col_expr(
                analysis_entity::Column::Status,
                Expr::value(AnalysisStatus::Completed.as_str()),
            )
            .col_expr(
                analysis_entity::Column::Pagespeed,
                Expr::value(encode(captures.pagespeed.as_ref())?),
            )
            .col_expr(
                analysis_entity::Column::Tls,
                Expr::value(encode(captures.tls.as_ref())?),
            )
            .col_expr(
                analysis_entity::Column::Wordpress,
                Expr::value(encode(captures.wordpress.as_ref())?),
            )
            .col_expr(
                analysis_entity::Column::Vulnerabilities,
                Expr::value(encode(captures.vulnerabilities.as_ref())?),
            )
            .col_expr(
                analysis_entity::Column::SecurityHeaders,
                Expr::value(encode(captures.security_headers.as_ref())?),
            )
            .col_expr(
                analysis_entity::Column::Availability,
                Expr::value(encode(captures.availability.as_ref())?),
            )
            .col_expr(
                analysis_entity::Column::HealthScore,
                Expr::value(Some(scores.health_score)),
            )
            .col_expr(
                analysis_entity::Column::SecurityScore,
                Expr::value(Some(scores.security_score)),
            )
            .col_expr(
                analysis_entity::Column::PerformanceScore,
                Expr::value(Some(scores.performance_score)),
            )
            .col_expr(
                analysis_entity::Column::SeoScore,
                Expr::value(Some(scores.seo_score)),
            )
            .col_expr(
                analysis_entity::Column::AvailabilityScore,
                Expr::value(Some(scores.availability_score)),
            )
            .col_expr(
                analysis_entity::Column::PriorityClassification,
                Expr::value(Some(scores.priority_classification.to_string())),
            )
            .col_expr(
                analysis_entity::Column::ActionClassification,
                Expr::value(Some(scores.action_classification.to_string())),
            )
            .col_expr(analysis_entity::Column::Deductions, Expr::value(Some(deductions)))
            .col_expr(analysis_entity::Column::AnalyzedAt, Expr::value(Some(now())))
            .filter(analysis_entity::Column::Id.eq(id))
            .filter(analysis_entity::Column::Status.eq(AnalysisStatus::Pending.as_str()))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn mark_error(&self, id: Uuid, error: &str) -> Result<(), RepositoryError> {
        let result = analysis_entity::Entity::update_many()
            .col_expr(
                analysis_entity::Column::Status,
                Expr::value(AnalysisStatus::Error.as_str()),
            )
            .col_expr(
                analysis_entity::Column::Error,
                Expr::value(Some(error.to_string())),
            )
            .col_expr(analysis_entity::Column::AnalyzedAt, Expr::value(Some(now())))
            .filter(analysis_entity::Column::Id.eq(id))
            .filter(analysis_entity::Column::Status.eq(AnalysisStatus::Pending.as_str()))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn find_for_job(
        &self,
        site_id: Uuid,
        analysis_job_id: Uuid,
    ) -> Result<Option<SiteAnalysis>, RepositoryError> {
        let model = analysis_entity::Entity::find()
            .filter(analysis_entity::Column::SiteId.eq(site_id))
            .filter(analysis_entity::Column::AnalysisJobId.eq(analysis_job_id))
            .one(self.db.as_ref())
            .await?;
        model.map(SiteAnalysis::try_from).transpose()
    }

    async fn find_latest(&self, site_id: Uuid) -> Result<Option<SiteAnalysis>, RepositoryError> {
        self.find_one(site_id, None).await
    }

    async fn find_latest_completed(
        &self,
        site_id: Uuid,
    ) -> Result<Option<SiteAnalysis>, RepositoryError> {
        self.find_one(site_id, Some(AnalysisStatus::Completed)).await
    }
}
