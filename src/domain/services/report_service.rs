// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::domain::models::probe::{Severity, VulnerabilityReport};
use crate::domain::models::site::Site;
use crate::domain::models::site_analysis::{AnalysisScores, SiteAnalysis};
use crate::domain::repositories::job_repository::RepositoryError;
use crate::domain::repositories::site_analysis_repository::SiteAnalysisRepository;
use crate::domain::repositories::site_repository::SiteRepository;
use crate::domain::repositories::storage_repository::{StorageError, StorageRepository};

/// 报告生成错误
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Site {0} not found")]
    SiteNotFound(Uuid),
    #[error("Site {0} has no completed analysis")]
    NoCompletedAnalysis(Uuid),
    #[error("Render error: {0}")]
    Render(String),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// 报告中的关键探针结论
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyFacts {
    pub reachable: Option<bool>,
    pub response_time_ms: Option<u64>,
    pub tls_valid: Option<bool>,
    pub tls_days_until_expiry: Option<i64>,
    pub missing_security_headers: Vec<String>,
    pub wordpress_version: Option<String>,
    pub critical_vulnerabilities: usize,
    pub high_vulnerabilities: usize,
}

/// 单个站点的审计报告
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub site_id: Uuid,
    pub domain: String,
    pub url: String,
    pub analysis_id: Uuid,
    pub analyzed_at: Option<DateTime<FixedOffset>>,
    pub generated_at: DateTime<FixedOffset>,
    pub scores: AnalysisScores,
    pub key_facts: KeyFacts,
}

impl AuditReport {
    /// 由站点与其已完成的分析记录构建报告
    pub fn build(site: &Site, analysis: &SiteAnalysis) -> Result<Self, ReportError> {
        let scores = analysis
            .scores
            .clone()
            .ok_or(ReportError::NoCompletedAnalysis(site.id))?;
        let captures = &analysis.captures;

        let vulnerability_count = |severity: Severity| {
            captures
                .vulnerabilities
                .as_ref()
                .map_or(0, |report: &VulnerabilityReport| report.count(severity))
        };

        let key_facts = KeyFacts {
            reachable: captures.availability.as_ref().map(|a| a.reachable),
            response_time_ms: captures.availability.as_ref().map(|a| a.response_time_ms),
            tls_valid: captures.tls.as_ref().map(|t| t.is_valid()),
            tls_days_until_expiry: captures.tls.as_ref().and_then(|t| t.days_until_expiry),
            missing_security_headers: captures
                .security_headers
                .as_ref()
                .map(|h| h.missing.clone())
                .unwrap_or_default(),
            wordpress_version: captures.wordpress.as_ref().and_then(|w| w.version.clone()),
            critical_vulnerabilities: vulnerability_count(Severity::Critical),
            high_vulnerabilities: vulnerability_count(Severity::High),
        };

        Ok(Self {
            site_id: site.id,
            domain: site.domain.clone(),
            url: site.url.clone(),
            analysis_id: analysis.id,
            analyzed_at: analysis.analyzed_at,
            generated_at: Utc::now().into(),
            scores,
            key_facts,
        })
    }
}

/// 报告渲染特质
pub trait ReportRenderer: Send + Sync {
    /// 生成文件的扩展名
    fn extension(&self) -> &'static str;

    fn render(&self, report: &AuditReport) -> Result<Vec<u8>, ReportError>;
}

/// JSON 报告渲染器
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonReportRenderer;

impl ReportRenderer for JsonReportRenderer {
    fn extension(&self) -> &'static str {
        "json"
    }

    fn render(&self, report: &AuditReport) -> Result<Vec<u8>, ReportError> {
        serde_json::to_vec_pretty(report).map_err(|e| ReportError::Render(e.to_string()))
    }
}

/// 报告服务
///
/// 读取站点最近一次完成的分析，渲染后写入存储
pub struct ReportService {
    sites: Arc<dyn SiteRepository>,
    analyses: Arc<dyn SiteAnalysisRepository>,
    storage: Arc<dyn StorageRepository>,
    renderer: Arc<dyn ReportRenderer>,
}

impl ReportService {
    pub fn new(
        sites: Arc<dyn SiteRepository>,
        analyses: Arc<dyn SiteAnalysisRepository>,
        storage: Arc<dyn StorageRepository>,
        renderer: Arc<dyn ReportRenderer>,
    ) -> Self {
        Self {
            sites,
            analyses,
            storage,
            renderer,
        }
    }

    /// 报告存储键：reports/<site_id>/<job_id>.<ext>
    pub fn report_key(&self, site_id: Uuid, job_id: Uuid) -> String {
        format!(
            "reports/{}/{}.{}",
            site_id,
            job_id,
            self.renderer.extension()
        )
    }

    /// 生成并保存报告，返回存储键
    pub async fn generate(&self, job_id: Uuid, site_id: Uuid) -> Result<String, ReportError> {
        let site = self
            .sites
            .find_by_id(site_id)
            .await?
            .ok_or(ReportError::SiteNotFound(site_id))?;
        let analysis = self
            .analyses
            .find_latest_completed(site_id)
            .await?
            .ok_or(ReportError::NoCompletedAnalysis(site_id))?;

        let report = AuditReport::build(&site, &analysis)?;
        let bytes = self.renderer.render(&report)?;
        let key = self.report_key(site_id, job_id);
        self.storage.save(&key, &bytes).await?;

        info!(site_id = %site_id, key = %key, "Report stored");
        Ok(key)
    }
}
