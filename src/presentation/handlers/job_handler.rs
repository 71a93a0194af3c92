// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::models::job::{Job, JobStatus, JobType};
use crate::presentation::errors::{AppError, RequestError};
use crate::queue::job_queue::JobService;
use crate::queue::scheduler::CancelOutcome;

const DEFAULT_LIST_LIMIT: u64 = 20;
const MAX_LIST_LIMIT: u64 = 100;

/// 创建任务请求
#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    #[serde(rename = "type")]
    pub job_type: String,
    pub config: serde_json::Value,
    pub provider: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateJobResponse {
    pub id: Uuid,
}

/// 任务状态响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub status: JobStatus,
    pub provider: Option<String>,
    pub progress: i32,
    pub processed_items: i32,
    pub total_items: i32,
    pub failed_items: i32,
    pub error: Option<String>,
    pub created_at: DateTime<FixedOffset>,
    pub started_at: Option<DateTime<FixedOffset>>,
    pub completed_at: Option<DateTime<FixedOffset>>,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            job_type: job.job_type,
            status: job.status,
            provider: job.provider,
            progress: job.progress,
            processed_items: job.processed_items,
            total_items: job.total_items,
            failed_items: job.failed_items,
            error: job.error,
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub limit: Option<u64>,
}

/// 取消请求响应
#[derive(Debug, Serialize)]
pub struct CancelJobResponse {
    pub id: Uuid,
    /// signalled / cancelled / already_finished
    pub outcome: &'static str,
    pub status: JobStatus,
}

/// 创建任务
///
/// 配置不合法时返回 400，且不会写入存储
pub async fn create_job(
    Extension(jobs): Extension<Arc<JobService>>,
    Json(payload): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<CreateJobResponse>), AppError> {
    let job_type: JobType = payload
        .job_type
        .parse()
        .map_err(|e: crate::domain::models::job::DomainError| {
            RequestError::BadRequest(e.to_string())
        })?;

    let id = jobs
        .enqueue(job_type, payload.config, payload.provider)
        .await?;
    Ok((StatusCode::CREATED, Json(CreateJobResponse { id })))
}

pub async fn get_job(
    Extension(jobs): Extension<Arc<JobService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobResponse>, AppError> {
    let job = jobs.get(id).await?;
    Ok(Json(job.into()))
}

pub async fn list_jobs(
    Extension(jobs): Extension<Arc<JobService>>,
    Query(query): Query<ListJobsQuery>,
) -> Result<Json<Vec<JobResponse>>, AppError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    let recent = jobs.list_recent(limit).await?;
    Ok(Json(recent.into_iter().map(JobResponse::from).collect()))
}

/// 取消任务
///
/// 已处于终态的任务原样返回 200
pub async fn cancel_job(
    Extension(jobs): Extension<Arc<JobService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<CancelJobResponse>, AppError> {
    let (outcome, status) = match jobs.cancel(id).await? {
        CancelOutcome::Signalled => ("signalled", JobStatus::Running),
        CancelOutcome::Cancelled => ("cancelled", JobStatus::Cancelled),
        CancelOutcome::AlreadyFinished(status) => ("already_finished", status),
        CancelOutcome::NotFound => {
            return Err(RequestError::NotFound(format!("Job {} not found", id)).into())
        }
    };
    Ok(Json(CancelJobResponse {
        id,
        outcome,
        status,
    }))
}
