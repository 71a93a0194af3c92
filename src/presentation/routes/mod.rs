// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::domain::repositories::site_analysis_repository::SiteAnalysisRepository;
use crate::presentation::handlers::{job_handler, site_handler};
use crate::queue::job_queue::JobService;

/// 创建应用路由
///
/// # 参数
///
/// * `jobs` - 任务服务
/// * `analyses` - 站点分析仓库
///
/// # 返回值
///
/// 返回配置好的路由
pub fn routes(jobs: Arc<JobService>, analyses: Arc<dyn SiteAnalysisRepository>) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/v1/version", get(version));

    let api_routes = Router::new()
        .route(
            "/v1/jobs",
            post(job_handler::create_job).get(job_handler::list_jobs),
        )
        .route(
            "/v1/jobs/{id}",
            get(job_handler::get_job).delete(job_handler::cancel_job),
        )
        .route(
            "/v1/sites/{id}/analysis/latest",
            get(site_handler::latest_analysis),
        )
        .layer(Extension(jobs))
        .layer(Extension(analyses));

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
}

/// 健康检查端点
///
/// # 返回值
///
/// 返回"OK"字符串
pub async fn health_check() -> &'static str {
    "OK"
}

/// 版本信息端点
pub async fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
