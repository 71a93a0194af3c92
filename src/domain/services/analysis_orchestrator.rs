// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::settings::ProbeSettings;
use crate::domain::models::probe::{
    AvailabilityResult, PageSpeedResult, ProbeOutcome, ProbeSlot, SecurityHeadersResult,
    TlsResult, WordPressFingerprint,
};
use crate::domain::models::score::ScoreCard;
use crate::domain::models::site::Site;
use crate::domain::models::site_analysis::{AnalysisStatus, ProbeCaptures};
use crate::domain::repositories::job_repository::RepositoryError;
use crate::domain::repositories::site_analysis_repository::SiteAnalysisRepository;
use crate::domain::repositories::site_repository::SiteRepository;
use crate::domain::services::scoring_engine::{self, ScoringRules};
use crate::probes::traits::{Probe, ProbeError, ProbeTarget};
use crate::probes::vulnerabilities::VulnerabilityMatcher;

/// 分析编排错误
///
/// 与单个探针缺失不同，这些错误作用于整个站点分析
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// 站点记录不存在，不重试
    #[error("Site {0} not found")]
    SiteNotFound(Uuid),
    /// 外部服务限流，由调度器退避后重试
    #[error("Rate limited by {0}")]
    RateLimited(&'static str),
    /// 任务已取消
    #[error("cancelled")]
    Cancelled,
    /// 持久化失败
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// 编排使用的全部探针
#[derive(Clone)]
pub struct ProbeSuite {
    pub availability: Arc<dyn Probe<Output = AvailabilityResult>>,
    pub security_headers: Arc<dyn Probe<Output = SecurityHeadersResult>>,
    pub pagespeed: Arc<dyn Probe<Output = PageSpeedResult>>,
    pub tls: Arc<dyn Probe<Output = TlsResult>>,
    pub wordpress: Arc<dyn Probe<Output = WordPressFingerprint>>,
    pub vulnerabilities: Arc<dyn VulnerabilityMatcher>,
}

/// 各探针的超时
#[derive(Debug, Clone, Copy)]
pub struct ProbeTimeouts {
    pub http: Duration,
    pub tls: Duration,
    pub external: Duration,
}

impl From<&ProbeSettings> for ProbeTimeouts {
    fn from(settings: &ProbeSettings) -> Self {
        Self {
            http: settings.http_timeout(),
            tls: settings.tls_timeout(),
            external: settings.pagespeed_timeout(),
        }
    }
}

/// 可用性探针自行在 `http` 预算内收尾，外层守卫只兜底未返回的调用
const AVAILABILITY_GRACE: Duration = Duration::from_secs(2);

/// 用超时与取消令牌包装探针调用；超时或取消都会丢弃进行中的请求
async fn guarded<T, F>(future: F, limit: Duration, cancel: &CancellationToken) -> Result<T, ProbeError>
where
    F: Future<Output = Result<T, ProbeError>>,
{
    tokio::select! {
        _ = cancel.cancelled() => Err(ProbeError::Cancelled),
        result = tokio::time::timeout(limit, future) => result.unwrap_or(Err(ProbeError::Timeout)),
    }
}

fn into_slot<T>(site_id: Uuid, probe: &str, result: Result<T, ProbeError>) -> ProbeSlot<T> {
    match result {
        Ok(value) => ProbeSlot::Present(value),
        Err(e) => {
            warn!(site_id = %site_id, probe, "Probe failed: {}", e);
            ProbeSlot::Failed(e.to_string())
        }
    }
}

/// 站点分析编排器
///
/// 并发运行所有适用的探针，单个探针的失败只会让对应槽位缺失，
/// 随后交给评分引擎并以一次更新写入分析记录。
pub struct AnalysisOrchestrator {
    sites: Arc<dyn SiteRepository>,
    analyses: Arc<dyn SiteAnalysisRepository>,
    probes: ProbeSuite,
    timeouts: ProbeTimeouts,
    rules: ScoringRules,
}

impl AnalysisOrchestrator {
    pub fn new(
        sites: Arc<dyn SiteRepository>,
        analyses: Arc<dyn SiteAnalysisRepository>,
        probes: ProbeSuite,
        timeouts: ProbeTimeouts,
    ) -> Self {
        Self {
            sites,
            analyses,
            probes,
            timeouts,
            rules: ScoringRules::default(),
        }
    }

    async fn load_site(&self, site_id: Uuid) -> Result<Site, AnalysisError> {
        self.sites
            .find_by_id(site_id)
            .await?
            .ok_or(AnalysisError::SiteNotFound(site_id))
    }

    /// 收集单个站点的探针结果
    ///
    /// # 参数
    ///
    /// * `site_id` - 站点ID
    /// * `cancel` - 所属任务的取消令牌
    ///
    /// # 返回值
    ///
    /// * `Ok(ProbeOutcome)` - 每个槽位为结果、跳过或失败
    /// * `Err(AnalysisError)` - 站点不存在、PageSpeed 限流或任务取消
    pub async fn analyze(
        &self,
        site_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<ProbeOutcome, AnalysisError> {
        let site = self.load_site(site_id).await?;
        self.collect(&site, cancel).await
    }

    async fn collect(
        &self,
        site: &Site,
        cancel: &CancellationToken,
    ) -> Result<ProbeOutcome, AnalysisError> {
        if cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }

        let target = ProbeTarget::from(site);
        let probes = &self.probes;
        let timeouts = self.timeouts;

        let (availability, security_headers, pagespeed, tls) = tokio::join!(
            guarded(
                probes.availability.run(&target),
                timeouts.http + AVAILABILITY_GRACE,
                cancel
            ),
            guarded(probes.security_headers.run(&target), timeouts.http, cancel),
            guarded(probes.pagespeed.run(&target), timeouts.external, cancel),
            guarded(probes.tls.run(&target), timeouts.tls, cancel),
        );

        if cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }
        if let Err(e) = &pagespeed {
            if e.is_rate_limited() {
                return Err(AnalysisError::RateLimited(probes.pagespeed.name()));
            }
        }

        let wordpress = if site.is_wordpress {
            into_slot(
                site.id,
                probes.wordpress.name(),
                guarded(probes.wordpress.run(&target), timeouts.http, cancel).await,
            )
        } else {
            ProbeSlot::Skipped
        };

        let vulnerabilities = match wordpress.present() {
            Some(fingerprint) if fingerprint.has_components() => into_slot(
                site.id,
                "vulnerabilities",
                guarded(
                    probes.vulnerabilities.match_components(fingerprint),
                    timeouts.external,
                    cancel,
                )
                .await,
            ),
            _ => ProbeSlot::Skipped,
        };

        if cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }

        Ok(ProbeOutcome {
            availability: into_slot(site.id, probes.availability.name(), availability),
            security_headers: into_slot(site.id, probes.security_headers.name(), security_headers),
            pagespeed: into_slot(site.id, probes.pagespeed.name(), pagespeed),
            tls: into_slot(site.id, probes.tls.name(), tls),
            wordpress,
            vulnerabilities,
        })
    }

    /// 分析、评分并持久化一个站点
    ///
    /// 站点不存在时不创建分析记录；限流错误保持记录为 pending 以便重试，
    /// 其余失败将该记录标记为 error。
    #[instrument(skip(self, cancel), fields(job_id = %job_id, site_id = %site_id))]
    pub async fn run(
        &self,
        job_id: Uuid,
        site_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<ScoreCard, AnalysisError> {
        let site = self.load_site(site_id).await?;
        let analysis = self.analyses.ensure_pending(site_id, job_id).await?;

        let outcome = match self.collect(&site, cancel).await {
            Ok(outcome) => outcome,
            Err(AnalysisError::RateLimited(provider)) => {
                return Err(AnalysisError::RateLimited(provider));
            }
            Err(e) => {
                error!(stage = "probes", "Analysis failed: {}", e);
                self.analyses.mark_error(analysis.id, &e.to_string()).await?;
                return Err(e);
            }
        };

        let card = scoring_engine::score(&outcome, &self.rules);
        let captures = ProbeCaptures::from(&outcome);
        if let Err(e) = self
            .analyses
            .complete(analysis.id, &captures, &card.clone().into())
            .await
        {
            error!(stage = "persist", "Failed to store analysis: {}", e);
            self.analyses.mark_error(analysis.id, &e.to_string()).await?;
            return Err(e.into());
        }

        info!(
            health_score = card.health_score,
            priority = %card.priority,
            "Site analysis completed"
        );
        Ok(card)
    }

    /// 重试耗尽等情况下，把该任务中仍为 pending 的分析记录标记为 error
    pub async fn record_failure(
        &self,
        job_id: Uuid,
        site_id: Uuid,
        message: &str,
    ) -> Result<(), AnalysisError> {
        if let Some(analysis) = self.analyses.find_for_job(site_id, job_id).await? {
            if analysis.status == AnalysisStatus::Pending {
                self.analyses.mark_error(analysis.id, message).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "analysis_orchestrator_test.rs"]
mod tests;
