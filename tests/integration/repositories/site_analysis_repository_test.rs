// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::integration::helpers::{insert_site, setup_db};
use auditrs::domain::models::probe::TlsResult;
use auditrs::domain::models::score::{Action, Category, Deduction, Priority};
use auditrs::domain::models::site_analysis::{AnalysisScores, AnalysisStatus, ProbeCaptures};
use auditrs::domain::repositories::job_repository::RepositoryError;
use auditrs::domain::repositories::site_analysis_repository::SiteAnalysisRepository;
use auditrs::infrastructure::repositories::site_analysis_repo_impl::SiteAnalysisRepositoryImpl;
use std::time::Duration;
use uuid::Uuid;

fn scores() -> AnalysisScores {
    AnalysisScores {
        health_score: 66,
        security_score: 20,
        performance_score: 18,
        seo_score: 12,
        availability_score: 16,
        priority_classification: Priority::Medium,
        action_classification: Action::ManualReview,
        deductions: vec![Deduction {
            category: Category::Security,
            points: 10,
            reason: "TLS certificate invalid".to_string(),
        }],
    }
}

fn captures() -> ProbeCaptures {
    ProbeCaptures {
        tls: Some(TlsResult {
            trusted: false,
            days_until_expiry: Some(-3),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_ensure_pending_is_idempotent_per_job() {
    let db = setup_db().await;
    let analyses = SiteAnalysisRepositoryImpl::new(db.clone());
    let site = insert_site(&db, "example.com").await;
    let job_id = Uuid::new_v4();

    let first = analyses.ensure_pending(site.id, job_id).await.unwrap();
    let again = analyses.ensure_pending(site.id, job_id).await.unwrap();
    assert_eq!(first.id, again.id);
    assert_eq!(again.status, AnalysisStatus::Pending);
    assert!(again.scores.is_none());

    let other_job = analyses.ensure_pending(site.id, Uuid::new_v4()).await.unwrap();
    assert_ne!(other_job.id, first.id);
}

#[tokio::test]
async fn test_complete_writes_everything_once() {
    let db = setup_db().await;
    let analyses = SiteAnalysisRepositoryImpl::new(db.clone());
    let site = insert_site(&db, "example.com").await;
    let pending = analyses.ensure_pending(site.id, Uuid::new_v4()).await.unwrap();

    analyses
        .complete(pending.id, &captures(), &scores())
        .await
        .unwrap();

    let stored = analyses.find_latest(site.id).await.unwrap().unwrap();
    assert_eq!(stored.status, AnalysisStatus::Completed);
    assert_eq!(stored.scores, Some(scores()));
    assert_eq!(stored.captures, captures());
    assert!(stored.analyzed_at.is_some());
    assert!(stored.error.is_none());

    // Settled rows are never mutated again
    assert!(matches!(
        analyses.complete(pending.id, &captures(), &scores()).await,
        Err(RepositoryError::NotFound)
    ));
    assert!(matches!(
        analyses.mark_error(pending.id, "late").await,
        Err(RepositoryError::NotFound)
    ));
}

#[tokio::test]
async fn test_error_leaves_scores_empty() {
    let db = setup_db().await;
    let analyses = SiteAnalysisRepositoryImpl::new(db.clone());
    let site = insert_site(&db, "example.com").await;
    let pending = analyses.ensure_pending(site.id, Uuid::new_v4()).await.unwrap();

    analyses.mark_error(pending.id, "cancelled").await.unwrap();

    let stored = analyses.find_latest(site.id).await.unwrap().unwrap();
    assert_eq!(stored.status, AnalysisStatus::Error);
    assert_eq!(stored.error.as_deref(), Some("cancelled"));
    assert!(stored.scores.is_none());
    assert!(analyses.find_latest_completed(site.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_latest_row_is_authoritative() {
    let db = setup_db().await;
    let analyses = SiteAnalysisRepositoryImpl::new(db.clone());
    let site = insert_site(&db, "example.com").await;

    let older = analyses.ensure_pending(site.id, Uuid::new_v4()).await.unwrap();
    analyses.complete(older.id, &captures(), &scores()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    let newer = analyses.ensure_pending(site.id, Uuid::new_v4()).await.unwrap();

    let latest = analyses.find_latest(site.id).await.unwrap().unwrap();
    assert_eq!(latest.id, newer.id);
    assert_eq!(latest.status, AnalysisStatus::Pending);

    let completed = analyses.find_latest_completed(site.id).await.unwrap().unwrap();
    assert_eq!(completed.id, older.id);
}
