// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    extract::{Extension, Path},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::models::site_analysis::SiteAnalysis;
use crate::domain::repositories::site_analysis_repository::SiteAnalysisRepository;
use crate::presentation::errors::{AppError, RequestError};

/// 站点最近一次分析（按创建时间），包括仍为 pending 或 error 的记录
pub async fn latest_analysis(
    Extension(analyses): Extension<Arc<dyn SiteAnalysisRepository>>,
    Path(site_id): Path<Uuid>,
) -> Result<Json<SiteAnalysis>, AppError> {
    let analysis = analyses.find_latest(site_id).await?.ok_or_else(|| {
        RequestError::NotFound(format!("Site {} has no analysis", site_id))
    })?;
    Ok(Json(analysis))
}
