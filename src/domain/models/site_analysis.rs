// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::job::DomainError;
use super::probe::{
    AvailabilityResult, PageSpeedResult, ProbeOutcome, SecurityHeadersResult, TlsResult,
    VulnerabilityReport, WordPressFingerprint,
};
use super::score::{Action, Deduction, Priority, ScoreCard};

/// 站点分析状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    #[default]
    Pending,
    Completed,
    Error,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::Completed => "completed",
            AnalysisStatus::Error => "error",
        }
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AnalysisStatus::Pending),
            "completed" => Ok(AnalysisStatus::Completed),
            "error" => Ok(AnalysisStatus::Error),
            other => Err(DomainError::ValidationError(format!(
                "unknown analysis status: {}",
                other
            ))),
        }
    }
}

/// 探针原始数据（均可为空）
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProbeCaptures {
    pub pagespeed: Option<PageSpeedResult>,
    pub tls: Option<TlsResult>,
    pub wordpress: Option<WordPressFingerprint>,
    pub vulnerabilities: Option<VulnerabilityReport>,
    pub security_headers: Option<SecurityHeadersResult>,
    pub availability: Option<AvailabilityResult>,
}

impl From<&ProbeOutcome> for ProbeCaptures {
    fn from(outcome: &ProbeOutcome) -> Self {
        Self {
            pagespeed: outcome.pagespeed.present().cloned(),
            tls: outcome.tls.present().cloned(),
            wordpress: outcome.wordpress.present().cloned(),
            vulnerabilities: outcome.vulnerabilities.present().cloned(),
            security_headers: outcome.security_headers.present().cloned(),
            availability: outcome.availability.present().cloned(),
        }
    }
}

/// 评分派生字段，要么全部存在，要么全部为空
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisScores {
    pub health_score: i32,
    pub security_score: i32,
    pub performance_score: i32,
    pub seo_score: i32,
    pub availability_score: i32,
    pub priority_classification: Priority,
    pub action_classification: Action,
    pub deductions: Vec<Deduction>,
}

impl From<ScoreCard> for AnalysisScores {
    fn from(card: ScoreCard) -> Self {
        Self {
            health_score: card.health_score,
            security_score: card.security_score,
            performance_score: card.performance_score,
            seo_score: card.seo_score,
            availability_score: card.availability_score,
            priority_classification: card.priority,
            action_classification: card.action,
            deductions: card.deductions,
        }
    }
}

/// 单次站点审计记录
///
/// 以 `pending` 创建，结束时通过一次更新变为 `completed` 或 `error`。
/// 同一站点可以有多条历史记录，按 `created_at` 最新的一条为准。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteAnalysis {
    pub id: Uuid,
    pub site_id: Uuid,
    pub analysis_job_id: Uuid,
    pub status: AnalysisStatus,
    pub captures: ProbeCaptures,
    pub scores: Option<AnalysisScores>,
    pub error: Option<String>,
    pub created_at: DateTime<FixedOffset>,
    pub analyzed_at: Option<DateTime<FixedOffset>>,
}

impl SiteAnalysis {
    pub fn pending(site_id: Uuid, analysis_job_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            site_id,
            analysis_job_id,
            status: AnalysisStatus::Pending,
            captures: ProbeCaptures::default(),
            scores: None,
            error: None,
            created_at: Utc::now().into(),
            analyzed_at: None,
        }
    }
}
