// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 单个探针槽位
///
/// 评分引擎把 `Skipped` 与 `Failed` 一律视为缺失，并施加固定扣分；
/// 二者的区分只用于日志与审计。
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeSlot<T> {
    /// 探针成功返回结果
    Present(T),
    /// 探针不适用（例如非 WordPress 站点）
    Skipped,
    /// 探针失败或超时
    Failed(String),
}

impl<T> ProbeSlot<T> {
    pub fn present(&self) -> Option<&T> {
        match self {
            ProbeSlot::Present(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, ProbeSlot::Present(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ProbeSlot::Failed(_))
    }

    /// 转换为可持久化的可选值
    pub fn into_option(self) -> Option<T> {
        match self {
            ProbeSlot::Present(value) => Some(value),
            _ => None,
        }
    }
}

impl<T> Default for ProbeSlot<T> {
    fn default() -> Self {
        ProbeSlot::Skipped
    }
}

/// 可用性探针结果
///
/// 站点不可达同样是有效数据，而不是探针失败
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResult {
    pub reachable: bool,
    pub status_code: Option<u16>,
    pub response_time_ms: u64,
    /// 检测到反爬虫挑战页（Cloudflare 等）
    pub challenge_detected: bool,
    pub has_meta_description: bool,
    pub has_sitemap: bool,
    pub final_url: Option<String>,
    pub error: Option<String>,
}

/// 安全响应头探针结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SecurityHeadersResult {
    pub present: Vec<String>,
    pub missing: Vec<String>,
}

impl SecurityHeadersResult {
    pub fn total_checks(&self) -> usize {
        self.present.len() + self.missing.len()
    }
}

/// PageSpeed Insights 结果，各分数为 0-100
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PageSpeedResult {
    pub performance: u8,
    pub accessibility: u8,
    pub best_practices: u8,
    pub seo: u8,
    pub strategy: String,
    pub largest_contentful_paint_ms: Option<f64>,
    pub cumulative_layout_shift: Option<f64>,
    pub total_blocking_time_ms: Option<f64>,
}

/// TLS 证书探针结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TlsResult {
    /// 证书链可追溯到受信任根证书
    pub trusted: bool,
    pub expired: bool,
    pub hostname_matches: bool,
    pub self_signed: bool,
    /// 距离过期的天数，无法确定时为空
    pub days_until_expiry: Option<i64>,
    /// 协商的协议版本，例如 "TLSv1.3"
    pub protocol: Option<String>,
    pub verification_error: Option<String>,
    /// 服务器拒绝 TLS 1.2 及以上版本，证书未能检查
    #[serde(default)]
    pub legacy_only: bool,
}

/// 证书剩余有效期不超过该天数即视为弱证书
pub const TLS_EXPIRY_WARNING_DAYS: i64 = 30;

/// 只支持旧协议的服务器记录的协议名称
pub const LEGACY_PROTOCOL_LABEL: &str = "pre-TLSv1.2";

impl TlsResult {
    /// 服务器只接受旧协议时的结果，按弱配置而非无效证书计分
    pub fn legacy_only() -> Self {
        Self {
            protocol: Some(LEGACY_PROTOCOL_LABEL.to_string()),
            verification_error: Some("server rejected TLS 1.2 and 1.3".to_string()),
            legacy_only: true,
            ..Default::default()
        }
    }

    pub fn is_valid(&self) -> bool {
        self.legacy_only
            || (!self.expired && self.hostname_matches && (self.trusted || self.self_signed))
    }

    pub fn is_legacy_protocol(&self) -> bool {
        self.legacy_only
            || matches!(
                self.protocol.as_deref(),
                Some("SSLv2") | Some("SSLv3") | Some("TLSv1.0") | Some("TLSv1.1")
            )
    }

    pub fn is_weak(&self) -> bool {
        self.self_signed
            || self.is_legacy_protocol()
            || self
                .days_until_expiry
                .is_some_and(|days| days <= TLS_EXPIRY_WARNING_DAYS)
    }
}

/// WordPress 核心版本新鲜度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionStatus {
    Latest,
    Outdated,
    Insecure,
}

impl fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            VersionStatus::Latest => "latest",
            VersionStatus::Outdated => "outdated",
            VersionStatus::Insecure => "insecure",
        };
        f.write_str(s)
    }
}

/// 主题或插件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WpComponent {
    pub slug: String,
    pub version: Option<String>,
}

/// WordPress 指纹
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct WordPressFingerprint {
    pub version: Option<String>,
    pub version_status: Option<VersionStatus>,
    /// 落后于最新版本的发布数
    pub releases_behind: Option<u32>,
    pub theme: Option<WpComponent>,
    pub plugins: Vec<WpComponent>,
    pub users: Vec<String>,
}

impl WordPressFingerprint {
    /// 是否有可用于漏洞匹配的组件标识
    pub fn has_components(&self) -> bool {
        self.theme.is_some() || !self.plugins.is_empty()
    }
}

/// 漏洞严重级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

/// 组件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Core,
    Plugin,
    Theme,
}

/// 单条已知漏洞
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VulnerabilityFinding {
    pub component: String,
    pub kind: ComponentKind,
    pub title: String,
    pub severity: Severity,
    pub fixed_in: Option<String>,
}

/// 漏洞匹配汇总
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct VulnerabilityReport {
    pub findings: Vec<VulnerabilityFinding>,
}

impl VulnerabilityReport {
    pub fn count(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == severity)
            .count()
    }
}

/// 一次分析的探针结果集合（不单独持久化）
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProbeOutcome {
    pub availability: ProbeSlot<AvailabilityResult>,
    pub security_headers: ProbeSlot<SecurityHeadersResult>,
    pub pagespeed: ProbeSlot<PageSpeedResult>,
    pub tls: ProbeSlot<TlsResult>,
    pub wordpress: ProbeSlot<WordPressFingerprint>,
    pub vulnerabilities: ProbeSlot<VulnerabilityReport>,
}
