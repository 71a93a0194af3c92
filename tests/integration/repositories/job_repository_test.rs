// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::integration::helpers::{insert_job, setup_db, site_batch};
use auditrs::domain::models::job::{JobProgress, JobStatus, JobType};
use auditrs::domain::repositories::job_repository::{JobRepository, RepositoryError};
use auditrs::infrastructure::database::entities::job as job_entity;
use auditrs::infrastructure::repositories::job_repo_impl::JobRepositoryImpl;
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn test_claim_takes_oldest_pending_of_its_type() {
    let db = setup_db().await;
    let jobs = JobRepositoryImpl::new(db.clone());
    let sites = [Uuid::new_v4()];

    let newer = insert_job(&jobs, site_batch(JobType::Analysis, &sites), 10).await;
    let oldest = insert_job(&jobs, site_batch(JobType::Analysis, &sites), 60).await;
    insert_job(&jobs, site_batch(JobType::Report, &sites), 120).await;

    let claimed = jobs.claim_next(JobType::Analysis).await.unwrap().unwrap();
    assert_eq!(claimed.id, oldest.id);
    assert_eq!(claimed.status, JobStatus::Running);
    assert!(claimed.started_at.is_some());

    let stored = jobs.find_by_id(oldest.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Running);
    assert!(stored.started_at.is_some());
    assert!(stored.completed_at.is_none());

    let next = jobs.claim_next(JobType::Analysis).await.unwrap().unwrap();
    assert_eq!(next.id, newer.id);
    assert!(jobs.claim_next(JobType::Analysis).await.unwrap().is_none());
}

#[tokio::test]
async fn test_finish_only_moves_running_jobs() {
    let db = setup_db().await;
    let jobs = JobRepositoryImpl::new(db.clone());
    let job = insert_job(&jobs, site_batch(JobType::Analysis, &[Uuid::new_v4()]), 0).await;

    // Still pending in the store
    let early = job
        .clone()
        .start()
        .unwrap()
        .finish(JobStatus::Completed, None)
        .unwrap();
    assert!(!jobs.finish(&early).await.unwrap());

    let claimed = jobs.claim_next(JobType::Analysis).await.unwrap().unwrap();
    assert!(matches!(
        jobs.finish(&claimed).await,
        Err(RepositoryError::Serialization(_))
    ));

    let completed = claimed
        .clone()
        .finish(JobStatus::Completed, Some("1 of 2 items failed".into()))
        .unwrap();
    assert!(jobs.finish(&completed).await.unwrap());

    let stored = jobs.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.error.as_deref(), Some("1 of 2 items failed"));
    assert!(stored.completed_at.is_some());

    // Terminal is final
    let failed = claimed.finish(JobStatus::Failed, Some("late".into())).unwrap();
    assert!(!jobs.finish(&failed).await.unwrap());
    let stored = jobs.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
}

#[tokio::test]
async fn test_cancel_pending_is_conditional() {
    let db = setup_db().await;
    let jobs = JobRepositoryImpl::new(db.clone());
    let pending = insert_job(&jobs, site_batch(JobType::Report, &[Uuid::new_v4()]), 10).await;

    assert!(jobs.cancel_pending(pending.id).await.unwrap());
    assert!(!jobs.cancel_pending(pending.id).await.unwrap());
    let stored = jobs.find_by_id(pending.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Cancelled);
    assert!(stored.started_at.is_none());
    assert!(stored.completed_at.is_some());

    let running = insert_job(&jobs, site_batch(JobType::Report, &[Uuid::new_v4()]), 0).await;
    jobs.claim_next(JobType::Report).await.unwrap().unwrap();
    assert!(!jobs.cancel_pending(running.id).await.unwrap());
}

#[tokio::test]
async fn test_progress_is_written_only_while_running() {
    let db = setup_db().await;
    let jobs = JobRepositoryImpl::new(db.clone());
    let job = insert_job(&jobs, site_batch(JobType::Analysis, &[Uuid::new_v4()]), 0).await;
    let progress = JobProgress {
        processed_items: 1,
        failed_items: 0,
        total_items: 3,
    };

    jobs.update_progress(job.id, progress).await.unwrap();
    assert_eq!(jobs.find_by_id(job.id).await.unwrap().unwrap().processed_items, 0);

    jobs.claim_next(JobType::Analysis).await.unwrap().unwrap();
    jobs.update_progress(job.id, progress).await.unwrap();
    let stored = jobs.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(stored.processed_items, 1);
    assert_eq!(stored.total_items, 3);
    assert_eq!(stored.progress, 33);
}

#[tokio::test]
async fn test_interrupted_jobs_are_failed_per_type() {
    let db = setup_db().await;
    let jobs = JobRepositoryImpl::new(db.clone());
    let analysis = insert_job(&jobs, site_batch(JobType::Analysis, &[Uuid::new_v4()]), 0).await;
    let report = insert_job(&jobs, site_batch(JobType::Report, &[Uuid::new_v4()]), 0).await;
    jobs.claim_next(JobType::Analysis).await.unwrap().unwrap();
    jobs.claim_next(JobType::Report).await.unwrap().unwrap();

    assert_eq!(jobs.fail_interrupted(JobType::Analysis).await.unwrap(), 1);

    let stored = jobs.find_by_id(analysis.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(stored.error.as_deref(), Some("interrupted"));
    let untouched = jobs.find_by_id(report.id).await.unwrap().unwrap();
    assert_eq!(untouched.status, JobStatus::Running);
}

#[tokio::test]
async fn test_unreadable_config_fails_at_claim() {
    let db = setup_db().await;
    let jobs = JobRepositoryImpl::new(db.clone());
    let id = Uuid::new_v4();
    let now: DateTime<FixedOffset> = Utc::now().into();

    job_entity::ActiveModel {
        id: Set(id),
        job_type: Set("analysis".to_string()),
        status: Set("pending".to_string()),
        provider: Set(None),
        config: Set(json!({ "siteIds": [] })),
        progress: Set(0),
        total_items: Set(0),
        processed_items: Set(0),
        failed_items: Set(0),
        error: Set(None),
        created_at: Set(now),
        started_at: Set(None),
        completed_at: Set(None),
        updated_at: Set(now),
    }
    .insert(db.as_ref())
    .await
    .unwrap();

    assert!(matches!(
        jobs.claim_next(JobType::Analysis).await,
        Err(RepositoryError::Serialization(_))
    ));

    let row = job_entity::Entity::find_by_id(id)
        .one(db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status, "failed");
    assert!(row.error.unwrap().starts_with("invalid config"));

    // The broken row no longer blocks the queue
    assert!(jobs.claim_next(JobType::Analysis).await.unwrap().is_none());
}

#[tokio::test]
async fn test_list_recent_is_newest_first() {
    let db = setup_db().await;
    let jobs = JobRepositoryImpl::new(db.clone());
    let old = insert_job(&jobs, site_batch(JobType::Report, &[Uuid::new_v4()]), 100).await;
    let new = insert_job(&jobs, site_batch(JobType::Analysis, &[Uuid::new_v4()]), 1).await;

    let recent = jobs.list_recent(10).await.unwrap();
    assert_eq!(
        recent.iter().map(|j| j.id).collect::<Vec<_>>(),
        vec![new.id, old.id]
    );
    assert_eq!(jobs.list_recent(1).await.unwrap().len(), 1);
}
