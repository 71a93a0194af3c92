// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::probe::{
    AvailabilityResult, PageSpeedResult, ProbeOutcome, ProbeSlot, SecurityHeadersResult,
    Severity, TlsResult, VersionStatus, VulnerabilityReport, WordPressFingerprint,
};
use crate::domain::models::score::{Action, Category, Deduction, Priority, ScoreCard};

/// 评分规则
///
/// 各扣分常量。缺失 PageSpeed 时性能扣 20、SEO 扣 8，两者不对称是有意保留的。
#[derive(Debug, Clone)]
pub struct ScoringRules {
    pub performance_absent: i32,
    pub tls_invalid: i32,
    pub tls_weak: i32,
    pub headers_max: i32,
    pub headers_probe_failed: i32,
    pub wordpress_outdated: i32,
    pub wordpress_unknown_version: i32,
    /// 落后超过该发布数即视为过旧
    pub wordpress_max_releases_behind: u32,
    pub seo_pagespeed_max: i32,
    pub seo_absent: i32,
    pub missing_meta_description: i32,
    pub missing_sitemap: i32,
    pub availability_absent: i32,
    pub unreachable: i32,
    pub challenge_page: i32,
    /// (响应时间阈值毫秒, 扣分)，按阈值从高到低排列，只取最差一档
    pub response_time_tiers: Vec<(u64, i32)>,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            performance_absent: 20,
            tls_invalid: 10,
            tls_weak: 4,
            headers_max: 5,
            headers_probe_failed: 3,
            wordpress_outdated: 5,
            wordpress_unknown_version: 2,
            wordpress_max_releases_behind: 2,
            seo_pagespeed_max: 12,
            seo_absent: 8,
            missing_meta_description: 4,
            missing_sitemap: 4,
            availability_absent: 12,
            unreachable: 12,
            challenge_page: 4,
            response_time_tiers: vec![(10_000, 8), (5_000, 6), (3_000, 3)],
        }
    }
}

/// 按比例取整：round(numerator / denominator * max)，四舍五入
fn proportional(numerator: i64, denominator: i64, max: i32) -> i32 {
    if denominator <= 0 || numerator <= 0 {
        return 0;
    }
    let scaled = numerator * max as i64 * 2 + denominator;
    (scaled / (denominator * 2)) as i32
}

/// 按类别累积扣分记录
struct DeductionLog {
    entries: Vec<Deduction>,
}

impl DeductionLog {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn add(&mut self, category: Category, points: i32, reason: impl Into<String>) {
        if points > 0 {
            self.entries.push(Deduction {
                category,
                points,
                reason: reason.into(),
            });
        }
    }

    fn total(&self, category: Category) -> i32 {
        self.entries
            .iter()
            .filter(|d| d.category == category)
            .map(|d| d.points)
            .sum()
    }

    /// 类别满分减去扣分，限制在 [0, max]
    fn score(&self, category: Category) -> i32 {
        let max = category.max_score();
        (max - self.total(category).min(max)).clamp(0, max)
    }
}

/// 将探针结果归约为评分结果
///
/// 纯函数，不做任何 I/O；任何输入组合都不会失败。
pub fn score(outcome: &ProbeOutcome, rules: &ScoringRules) -> ScoreCard {
    let mut log = DeductionLog::new();

    score_performance(&outcome.pagespeed, rules, &mut log);
    score_security(outcome, rules, &mut log);
    score_seo(&outcome.pagespeed, &outcome.availability, rules, &mut log);
    score_availability(&outcome.availability, rules, &mut log);

    let performance_score = log.score(Category::Performance);
    let security_score = log.score(Category::Security);
    let seo_score = log.score(Category::Seo);
    let availability_score = log.score(Category::Availability);
    let health_score = performance_score + security_score + seo_score + availability_score;

    ScoreCard {
        performance_score,
        security_score,
        seo_score,
        availability_score,
        health_score,
        priority: Priority::from_health_score(health_score),
        action: Action::from_health_score(health_score),
        deductions: log.entries,
    }
}

fn score_performance(
    pagespeed: &ProbeSlot<PageSpeedResult>,
    rules: &ScoringRules,
    log: &mut DeductionLog,
) {
    match pagespeed.present() {
        Some(psi) => {
            // weighted composite in tenths of a point
            let weighted_tenths = 6 * psi.performance.min(100) as i64
                + 2 * psi.accessibility.min(100) as i64
                + 2 * psi.best_practices.min(100) as i64;
            let points = proportional(1000 - weighted_tenths, 1000, 30);
            log.add(
                Category::Performance,
                points,
                format!(
                    "PageSpeed weighted score {:.1}/100 (performance {}, accessibility {}, best practices {})",
                    weighted_tenths as f64 / 10.0,
                    psi.performance,
                    psi.accessibility,
                    psi.best_practices
                ),
            );
        }
        None => log.add(
            Category::Performance,
            rules.performance_absent,
            "PageSpeed data unavailable",
        ),
    }
}

fn score_security(outcome: &ProbeOutcome, rules: &ScoringRules, log: &mut DeductionLog) {
    score_tls(outcome.tls.present(), rules, log);
    score_headers(&outcome.security_headers, rules, log);
    if let Some(fingerprint) = outcome.wordpress.present() {
        score_wordpress(fingerprint, rules, log);
    }
    if let Some(report) = outcome.vulnerabilities.present() {
        score_vulnerabilities(report, log);
    }
}

fn score_tls(tls: Option<&TlsResult>, rules: &ScoringRules, log: &mut DeductionLog) {
    let Some(tls) = tls else {
        log.add(
            Category::Security,
            rules.tls_invalid,
            "TLS certificate could not be verified",
        );
        return;
    };

    if !tls.is_valid() {
        let cause = if tls.expired {
            "TLS certificate has expired".to_string()
        } else if !tls.hostname_matches {
            "TLS certificate does not match the hostname".to_string()
        } else {
            format!(
                "TLS certificate is not trusted ({})",
                tls.verification_error.as_deref().unwrap_or("unknown issuer")
            )
        };
        log.add(Category::Security, rules.tls_invalid, cause);
        return;
    }

    if tls.is_weak() {
        let mut causes = Vec::new();
        if let Some(days) = tls.days_until_expiry.filter(|d| *d <= 30) {
            causes.push(format!("expires in {} days", days));
        }
        if tls.self_signed {
            causes.push("self-signed".to_string());
        }
        if tls.is_legacy_protocol() {
            causes.push(format!(
                "legacy protocol {}",
                tls.protocol.as_deref().unwrap_or_default()
            ));
        }
        log.add(
            Category::Security,
            rules.tls_weak,
            format!("Weak TLS certificate: {}", causes.join(", ")),
        );
    }
}

fn score_headers(
    headers: &ProbeSlot<SecurityHeadersResult>,
    rules: &ScoringRules,
    log: &mut DeductionLog,
) {
    match headers.present() {
        Some(result) => {
            let missing = result.missing.len() as i64;
            let total = result.total_checks() as i64;
            let points = proportional(missing, total, rules.headers_max);
            log.add(
                Category::Security,
                points,
                format!(
                    "Missing {}/{} security headers: {}",
                    missing,
                    total,
                    result.missing.join(", ")
                ),
            );
        }
        None => log.add(
            Category::Security,
            rules.headers_probe_failed,
            "Security header check failed",
        ),
    }
}

fn score_wordpress(fingerprint: &WordPressFingerprint, rules: &ScoringRules, log: &mut DeductionLog) {
    let behind = fingerprint.releases_behind.unwrap_or(0);
    let insecure = fingerprint.version_status == Some(VersionStatus::Insecure);

    if insecure || behind > rules.wordpress_max_releases_behind {
        let version = fingerprint.version.as_deref().unwrap_or("unknown");
        let reason = if insecure {
            format!("WordPress {} is marked insecure", version)
        } else {
            format!("WordPress {} is {} releases behind", version, behind)
        };
        log.add(Category::Security, rules.wordpress_outdated, reason);
    } else if fingerprint.version.is_none() && !fingerprint.plugins.is_empty() {
        log.add(
            Category::Security,
            rules.wordpress_unknown_version,
            format!(
                "WordPress version hidden with {} plugins detected",
                fingerprint.plugins.len()
            ),
        );
    }
}

fn score_vulnerabilities(report: &VulnerabilityReport, log: &mut DeductionLog) {
    let critical = report.count(Severity::Critical) as i64;
    let high = report.count(Severity::High) as i64;
    let medium = report.count(Severity::Medium) as i64;
    let low = report.count(Severity::Low) as i64;

    // weighted score in half points: critical*4 + high*3 + medium*1.5 + low*0.5
    let halves = critical * 8 + high * 6 + medium * 3 + low;
    let points = match halves {
        h if h > 40 => 10,
        h if h > 20 => 7,
        h if h > 10 => 5,
        h if h > 0 => 3,
        _ => 0,
    };
    log.add(
        Category::Security,
        points,
        format!(
            "Known vulnerabilities: {} critical, {} high, {} medium, {} low (weighted {:.1})",
            critical,
            high,
            medium,
            low,
            halves as f64 / 2.0
        ),
    );
}

fn score_seo(
    pagespeed: &ProbeSlot<PageSpeedResult>,
    availability: &ProbeSlot<AvailabilityResult>,
    rules: &ScoringRules,
    log: &mut DeductionLog,
) {
    match pagespeed.present() {
        Some(psi) => {
            let points = proportional(100 - psi.seo.min(100) as i64, 100, rules.seo_pagespeed_max);
            log.add(
                Category::Seo,
                points,
                format!("PageSpeed SEO score {}/100", psi.seo),
            );
        }
        None => log.add(Category::Seo, rules.seo_absent, "PageSpeed SEO data unavailable"),
    }

    let (has_meta, has_sitemap) = availability
        .present()
        .map(|a| (a.has_meta_description, a.has_sitemap))
        .unwrap_or((false, false));
    if !has_meta {
        log.add(
            Category::Seo,
            rules.missing_meta_description,
            "Missing meta description",
        );
    }
    if !has_sitemap {
        log.add(Category::Seo, rules.missing_sitemap, "Missing sitemap");
    }
}

fn score_availability(
    availability: &ProbeSlot<AvailabilityResult>,
    rules: &ScoringRules,
    log: &mut DeductionLog,
) {
    let Some(result) = availability.present() else {
        log.add(
            Category::Availability,
            rules.availability_absent,
            "Availability data unavailable",
        );
        return;
    };

    if result.challenge_detected {
        log.add(
            Category::Availability,
            rules.challenge_page,
            "Homepage is behind an anti-bot challenge",
        );
        return;
    }

    if !result.reachable {
        log.add(
            Category::Availability,
            rules.unreachable,
            format!(
                "Site unreachable: {}",
                result.error.as_deref().unwrap_or("no response")
            ),
        );
        return;
    }

    if let Some((threshold, points)) = rules
        .response_time_tiers
        .iter()
        .find(|(threshold, _)| result.response_time_ms > *threshold)
    {
        log.add(
            Category::Availability,
            *points,
            format!(
                "Slow response: {} ms (over {} ms)",
                result.response_time_ms, threshold
            ),
        );
    }
}

#[cfg(test)]
#[path = "scoring_engine_test.rs"]
mod tests;
