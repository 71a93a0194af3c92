// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use auditrs::domain::models::job::{Job, JobConfig, JobType};
use auditrs::domain::models::site::Site;
use auditrs::domain::repositories::job_repository::JobRepository;
use auditrs::domain::repositories::site_repository::SiteRepository;
use auditrs::infrastructure::repositories::job_repo_impl::JobRepositoryImpl;
use auditrs::infrastructure::repositories::site_repo_impl::SiteRepositoryImpl;
use chrono::{Duration, Utc};
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// 已执行迁移的内存数据库
pub async fn setup_db() -> Arc<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");
    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    Arc::new(db)
}

pub fn site_batch(job_type: JobType, site_ids: &[Uuid]) -> JobConfig {
    JobConfig::parse(job_type, json!({ "siteIds": site_ids })).expect("valid config")
}

/// 创建一个待处理任务，`age_secs` 越大创建时间越早
pub async fn insert_job(
    jobs: &JobRepositoryImpl,
    config: JobConfig,
    age_secs: i64,
) -> Job {
    let mut job = Job::new(config, Some("test".to_string()));
    job.created_at = (Utc::now() - Duration::seconds(age_secs)).into();
    jobs.create(&job).await.expect("Failed to insert job")
}

pub async fn insert_site(db: &Arc<DatabaseConnection>, domain: &str) -> Site {
    let sites = SiteRepositoryImpl::new(db.clone());
    sites
        .upsert(&Site::new(domain, format!("https://{}/", domain)))
        .await
        .expect("Failed to insert site")
}
