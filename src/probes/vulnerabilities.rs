// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::models::probe::{
    ComponentKind, Severity, VulnerabilityFinding, VulnerabilityReport, WordPressFingerprint,
};
use crate::probes::http::{ensure_success, map_request_error, provider_limiter, ProviderLimiter};
use crate::probes::traits::ProbeError;
use crate::utils::version::compare_versions;

/// 漏洞匹配特质
///
/// 输入为指纹探针得到的组件标识
#[async_trait]
pub trait VulnerabilityMatcher: Send + Sync {
    async fn match_components(
        &self,
        fingerprint: &WordPressFingerprint,
    ) -> Result<VulnerabilityReport, ProbeError>;
}

#[derive(Debug, Deserialize)]
struct FeedVulnerability {
    name: String,
    #[serde(default)]
    operator: Option<FeedOperator>,
    #[serde(default)]
    impact: Option<FeedImpact>,
}

#[derive(Debug, Default, Deserialize)]
struct FeedOperator {
    min_version: Option<String>,
    min_operator: Option<String>,
    max_version: Option<String>,
    max_operator: Option<String>,
    unfixed: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeedImpact {
    cvss: Option<FeedCvss>,
}

#[derive(Debug, Deserialize)]
struct FeedCvss {
    severity: Option<String>,
}

fn severity_from_code(code: Option<&str>) -> Severity {
    match code.map(|c| c.to_ascii_lowercase()).as_deref() {
        Some("c") | Some("critical") => Severity::Critical,
        Some("h") | Some("high") => Severity::High,
        Some("l") | Some("low") => Severity::Low,
        _ => Severity::Medium,
    }
}

fn satisfies(version: &str, bound: &str, operator: Option<&str>, upper: bool) -> bool {
    let Some(ordering) = compare_versions(version, bound) else {
        return false;
    };
    match (operator, upper) {
        (Some("lt"), _) => ordering == Ordering::Less,
        (Some("gt"), _) => ordering == Ordering::Greater,
        (Some("ge"), _) => ordering != Ordering::Less,
        (Some("le"), _) | (None, true) => ordering != Ordering::Greater,
        (_, false) => ordering != Ordering::Less,
        (_, true) => ordering != Ordering::Greater,
    }
}

impl FeedVulnerability {
    /// 判断给定版本是否受影响；版本未知时只计入尚未修复的漏洞
    fn affects(&self, version: Option<&str>) -> bool {
        let operator = self.operator.as_ref();
        let unfixed = operator
            .and_then(|o| o.unfixed.as_deref())
            .is_some_and(|u| u == "1" || u.eq_ignore_ascii_case("true"));
        if unfixed {
            return true;
        }

        let Some(version) = version else {
            return false;
        };
        let Some(operator) = operator else {
            return false;
        };

        let below_max = match operator.max_version.as_deref() {
            Some(max) => satisfies(version, max, operator.max_operator.as_deref(), true),
            None => true,
        };
        let above_min = match operator.min_version.as_deref() {
            Some(min) => satisfies(version, min, operator.min_operator.as_deref(), false),
            None => true,
        };
        below_max && above_min
    }

    fn into_finding(self, component: &str, kind: ComponentKind) -> VulnerabilityFinding {
        let severity = severity_from_code(
            self.impact
                .as_ref()
                .and_then(|i| i.cvss.as_ref())
                .and_then(|c| c.severity.as_deref()),
        );
        let fixed_in = self.operator.and_then(|o| o.max_version);
        VulnerabilityFinding {
            component: component.to_string(),
            kind,
            title: self.name,
            severity,
            fixed_in,
        }
    }
}

/// 从漏洞库响应中筛选影响指定版本的漏洞
pub fn parse_findings(
    body: &serde_json::Value,
    component: &str,
    kind: ComponentKind,
    version: Option<&str>,
) -> Result<Vec<VulnerabilityFinding>, ProbeError> {
    let entries = match body.pointer("/data/vulnerability") {
        Some(serde_json::Value::Array(entries)) => entries.clone(),
        _ => return Ok(Vec::new()),
    };

    let mut findings = Vec::new();
    for entry in entries {
        let vulnerability: FeedVulnerability =
            serde_json::from_value(entry).map_err(|e| ProbeError::Parse(e.to_string()))?;
        if vulnerability.affects(version) {
            findings.push(vulnerability.into_finding(component, kind));
        }
    }
    Ok(findings)
}

/// wpvulnerability 风格的漏洞库客户端
pub struct WpVulnerabilityClient {
    client: Client,
    base_url: String,
    limiter: Arc<ProviderLimiter>,
}

impl WpVulnerabilityClient {
    pub fn new(client: Client, base_url: &str, requests_per_minute: u32) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            limiter: provider_limiter(requests_per_minute),
        }
    }

    async fn lookup(
        &self,
        kind: ComponentKind,
        slug: &str,
        version: Option<&str>,
    ) -> Result<Vec<VulnerabilityFinding>, ProbeError> {
        let url = match kind {
            ComponentKind::Core => format!("{}/core/{}/", self.base_url, slug),
            ComponentKind::Plugin => format!("{}/plugin/{}/", self.base_url, slug),
            ComponentKind::Theme => format!("{}/theme/{}/", self.base_url, slug),
        };

        self.limiter.until_ready().await;
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(map_request_error)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let body: serde_json::Value = ensure_success(response)?
            .json()
            .await
            .map_err(|e| ProbeError::Parse(e.to_string()))?;

        let name = match kind {
            ComponentKind::Core => "wordpress",
            _ => slug,
        };
        parse_findings(&body, name, kind, version)
    }
}

#[async_trait]
impl VulnerabilityMatcher for WpVulnerabilityClient {
    async fn match_components(
        &self,
        fingerprint: &WordPressFingerprint,
    ) -> Result<VulnerabilityReport, ProbeError> {
        let mut lookups: Vec<(ComponentKind, String, Option<String>)> = Vec::new();
        if let Some(version) = &fingerprint.version {
            lookups.push((ComponentKind::Core, version.clone(), Some(version.clone())));
        }
        if let Some(theme) = &fingerprint.theme {
            lookups.push((ComponentKind::Theme, theme.slug.clone(), theme.version.clone()));
        }
        for plugin in &fingerprint.plugins {
            lookups.push((
                ComponentKind::Plugin,
                plugin.slug.clone(),
                plugin.version.clone(),
            ));
        }

        let mut report = VulnerabilityReport::default();
        let mut last_error = None;
        let mut succeeded = 0usize;
        for (kind, slug, version) in &lookups {
            match self.lookup(*kind, slug, version.as_deref()).await {
                Ok(findings) => {
                    succeeded += 1;
                    report.findings.extend(findings);
                }
                Err(e) => {
                    warn!("Vulnerability lookup for {} failed: {}", slug, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if succeeded == 0 => Err(e),
            _ => {
                debug!(
                    "Matched {} vulnerabilities across {} components",
                    report.findings.len(),
                    lookups.len()
                );
                Ok(report)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::probe::WpComponent;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn plugin_feed() -> serde_json::Value {
        json!({
            "error": 0,
            "data": {
                "name": "Contact Form 7",
                "vulnerability": [
                    {
                        "name": "Unrestricted file upload",
                        "operator": { "max_version": "5.8.4", "max_operator": "lt", "unfixed": "0" },
                        "impact": { "cvss": { "severity": "h" } }
                    },
                    {
                        "name": "Reflected XSS",
                        "operator": { "max_version": "5.3.1", "max_operator": "le", "unfixed": "0" },
                        "impact": { "cvss": { "severity": "m" } }
                    },
                    {
                        "name": "Open redirect",
                        "operator": { "max_version": null, "unfixed": "1" },
                        "impact": { "cvss": { "severity": "l" } }
                    }
                ]
            }
        })
    }

    #[test]
    fn test_known_version_matches_upper_bounds() {
        let findings =
            parse_findings(&plugin_feed(), "contact-form-7", ComponentKind::Plugin, Some("5.7.2"))
                .unwrap();
        let titles: Vec<&str> = findings.iter().map(|f| f.title.as_str()).collect();
        assert_eq!(titles, vec!["Unrestricted file upload", "Open redirect"]);
        assert_eq!(findings[0].severity, Severity::High);
        assert_eq!(findings[0].fixed_in.as_deref(), Some("5.8.4"));
    }

    #[test]
    fn test_inclusive_and_exclusive_bounds() {
        let at_bound =
            parse_findings(&plugin_feed(), "cf7", ComponentKind::Plugin, Some("5.3.1")).unwrap();
        assert_eq!(at_bound.len(), 3);
        let patched =
            parse_findings(&plugin_feed(), "cf7", ComponentKind::Plugin, Some("5.8.4")).unwrap();
        assert_eq!(patched.len(), 1);
    }

    #[test]
    fn test_unknown_version_only_counts_unfixed() {
        let findings = parse_findings(&plugin_feed(), "cf7", ComponentKind::Plugin, None).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Low);
    }

    #[test]
    fn test_empty_feed_has_no_findings() {
        let body = json!({ "error": 0, "data": { "vulnerability": null } });
        assert!(parse_findings(&body, "x", ComponentKind::Theme, Some("1.0"))
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_client_queries_each_component() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/plugin/contact-form-7/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(plugin_feed()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/theme/astra/"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = WpVulnerabilityClient::new(Client::new(), &server.uri(), 600);
        let fingerprint = WordPressFingerprint {
            theme: Some(WpComponent {
                slug: "astra".into(),
                version: Some("4.1.0".into()),
            }),
            plugins: vec![WpComponent {
                slug: "contact-form-7".into(),
                version: Some("5.7.2".into()),
            }],
            ..Default::default()
        };

        let report = client.match_components(&fingerprint).await.unwrap();
        assert_eq!(report.count(Severity::High), 1);
        assert_eq!(report.count(Severity::Low), 1);
    }

    #[tokio::test]
    async fn test_all_lookups_failing_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = WpVulnerabilityClient::new(Client::new(), &server.uri(), 600);
        let fingerprint = WordPressFingerprint {
            plugins: vec![WpComponent {
                slug: "akismet".into(),
                version: None,
            }],
            ..Default::default()
        };
        assert!(matches!(
            client.match_components(&fingerprint).await,
            Err(ProbeError::Http(500))
        ));
    }
}
