// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::integration::helpers::{insert_site, setup_db};
use async_trait::async_trait;
use auditrs::domain::models::job::{Job, JobType};
use auditrs::domain::models::score::{Action, Priority};
use auditrs::domain::models::site_analysis::{AnalysisScores, ProbeCaptures};
use auditrs::domain::repositories::site_analysis_repository::SiteAnalysisRepository;
use auditrs::infrastructure::repositories::job_repo_impl::JobRepositoryImpl;
use auditrs::infrastructure::repositories::site_analysis_repo_impl::SiteAnalysisRepositoryImpl;
use auditrs::presentation::routes::routes;
use auditrs::queue::job_queue::JobService;
use auditrs::queue::scheduler::{JobScheduler, Scheduler, SchedulerOptions};
use auditrs::workers::handler::{HandlerError, ItemError, JobHandler};
use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use uuid::Uuid;

struct NoopHandler;

#[async_trait]
impl JobHandler for NoopHandler {
    type Item = Uuid;

    fn job_type(&self) -> JobType {
        JobType::Analysis
    }

    fn plan(&self, job: &Job) -> Result<Vec<Uuid>, HandlerError> {
        Ok(job.config.site_ids())
    }

    async fn process(
        &self,
        _job_id: Uuid,
        _item: &Uuid,
        _cancel: &CancellationToken,
    ) -> Result<(), ItemError> {
        Ok(())
    }
}

struct TestApp {
    db: Arc<DatabaseConnection>,
    router: Router,
}

async fn test_app() -> TestApp {
    let db = setup_db().await;
    let jobs = Arc::new(JobRepositoryImpl::new(db.clone()));
    let scheduler: Arc<dyn Scheduler> = Arc::new(JobScheduler::new(
        Arc::new(NoopHandler),
        jobs.clone(),
        SchedulerOptions {
            poll_interval: Duration::from_secs(60),
            batch_size: 3,
            rate_limit_backoff: Duration::from_millis(1),
            max_rate_limit_retries: 0,
        },
    ));
    let service = Arc::new(JobService::new(jobs, vec![scheduler]));
    let analyses: Arc<dyn SiteAnalysisRepository> =
        Arc::new(SiteAnalysisRepositoryImpl::new(db.clone()));

    TestApp {
        db,
        router: routes(service, analyses),
    }
}

async fn send(app: &TestApp, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn create_analysis_job(app: &TestApp) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/v1/jobs",
        Some(json!({
            "type": "analysis",
            "config": { "siteIds": [Uuid::new_v4(), Uuid::new_v4()] },
            "provider": "csv-import"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_check() {
    let app = test_app().await;
    let response = app
        .router
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_created_job_is_pending() {
    let app = test_app().await;
    let id = create_analysis_job(&app).await;

    let (status, body) = send(&app, Method::GET, &format!("/v1/jobs/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id.as_str());
    assert_eq!(body["type"], "analysis");
    assert_eq!(body["status"], "pending");
    assert_eq!(body["provider"], "csv-import");
    assert_eq!(body["progress"], 0);
    assert_eq!(body["processedItems"], 0);
    assert_eq!(body["failedItems"], 0);
    assert!(body["startedAt"].is_null());
}

#[tokio::test]
async fn test_invalid_config_is_rejected_and_not_stored() {
    let app = test_app().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/jobs",
        Some(json!({ "type": "analysis", "config": { "siteIds": [] } })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("analysis"));

    let (status, _) = send(
        &app,
        Method::POST,
        "/v1/jobs",
        Some(json!({ "type": "discovery", "config": { "urls": ["ftp://example.com"] } })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        "/v1/jobs",
        Some(json!({ "type": "crawl", "config": {} })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, jobs) = send(&app, Method::GET, "/v1/jobs", None).await;
    assert_eq!(jobs.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_cancel_is_idempotent() {
    let app = test_app().await;
    let id = create_analysis_job(&app).await;
    let uri = format!("/v1/jobs/{}", id);

    let (status, body) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "cancelled");

    let (status, body) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "already_finished");
    assert_eq!(body["status"], "cancelled");

    let (_, job) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(job["status"], "cancelled");
    assert!(!job["completedAt"].is_null());
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let app = test_app().await;
    let uri = format!("/v1/jobs/{}", Uuid::new_v4());

    let (status, _) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_respects_limit() {
    let app = test_app().await;
    create_analysis_job(&app).await;
    let newest = create_analysis_job(&app).await;

    let (status, body) = send(&app, Method::GET, "/v1/jobs?limit=1", None).await;
    assert_eq!(status, StatusCode::OK);
    let jobs = body.as_array().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["id"], newest.as_str());
}

#[tokio::test]
async fn test_latest_analysis_endpoint() {
    let app = test_app().await;
    let site = insert_site(&app.db, "example.com").await;
    let uri = format!("/v1/sites/{}/analysis/latest", site.id);

    let (status, _) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let analyses = SiteAnalysisRepositoryImpl::new(app.db.clone());
    let pending = analyses.ensure_pending(site.id, Uuid::new_v4()).await.unwrap();
    analyses
        .complete(
            pending.id,
            &ProbeCaptures::default(),
            &AnalysisScores {
                health_score: 66,
                security_score: 20,
                performance_score: 18,
                seo_score: 12,
                availability_score: 16,
                priority_classification: Priority::Medium,
                action_classification: Action::ManualReview,
                deductions: vec![],
            },
        )
        .await
        .unwrap();

    let (status, body) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["scores"]["healthScore"], 66);
    assert_eq!(body["scores"]["priorityClassification"], "medium");
    assert_eq!(body["scores"]["actionClassification"], "manual_review");
}
