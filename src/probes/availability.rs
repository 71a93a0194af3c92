// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::domain::models::probe::AvailabilityResult;
use crate::probes::http::join_path;
use crate::probes::traits::{Probe, ProbeError, ProbeTarget};

const SITEMAP_PATHS: [&str; 3] = ["/sitemap.xml", "/sitemap_index.xml", "/wp-sitemap.xml"];

const CHALLENGE_MARKERS: [&str; 7] = [
    "cf-browser-verification",
    "cf_chl_opt",
    "challenge-platform",
    "checking your browser",
    "just a moment...",
    "ddos protection by",
    "captcha-delivery.com",
];

/// 可用性探针
///
/// 抓取首页，记录状态码与响应时间，并从同一次抓取中
/// 检查 meta description；随后通过 robots.txt 与常见路径发现站点地图。
///
/// 站点地图发现只使用首页抓取后剩余的预算，超出时按没有站点地图处理，
/// 首页的测量结果始终保留。
pub struct AvailabilityProbe {
    client: Client,
    budget: Duration,
}

impl AvailabilityProbe {
    pub fn new(client: Client, budget: Duration) -> Self {
        Self { client, budget }
    }

    async fn discover_sitemap(&self, base_url: &str) -> bool {
        if let Ok(robots_url) = join_path(base_url, "/robots.txt") {
            if let Ok(response) = self.client.get(&robots_url).send().await {
                if response.status().is_success() {
                    if let Ok(body) = response.text().await {
                        if robots_declares_sitemap(&body) {
                            return true;
                        }
                    }
                }
            }
        }

        for path in SITEMAP_PATHS {
            let Ok(url) = join_path(base_url, path) else {
                continue;
            };
            match self.client.get(&url).send().await {
                Ok(response) if response.status().is_success() => return true,
                Ok(_) => {}
                Err(e) => debug!("Sitemap probe {} failed: {}", url, e),
            }
        }
        false
    }
}

#[async_trait]
impl Probe for AvailabilityProbe {
    type Output = AvailabilityResult;

    async fn run(&self, target: &ProbeTarget) -> Result<AvailabilityResult, ProbeError> {
        let start = Instant::now();
        let response = match self.client.get(&target.url).send().await {
            Ok(response) => response,
            Err(e) => {
                // An unreachable site is a finding, not a probe failure
                return Ok(AvailabilityResult {
                    reachable: false,
                    response_time_ms: start.elapsed().as_millis() as u64,
                    error: Some(e.to_string()),
                    ..Default::default()
                });
            }
        };

        let status = response.status();
        let headers = response.headers().clone();
        let final_url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        let response_time_ms = start.elapsed().as_millis() as u64;

        let challenge_detected = detect_challenge(status, &headers, &body);
        let reachable = challenge_detected || !status.is_server_error();
        let has_meta_description = status.is_success() && has_meta_description(&body);
        let has_sitemap = if reachable && !challenge_detected {
            let remaining = self.budget.saturating_sub(start.elapsed());
            match tokio::time::timeout(remaining, self.discover_sitemap(&final_url)).await {
                Ok(found) => found,
                Err(_) => {
                    debug!(
                        url = %final_url,
                        "Sitemap discovery ran out of budget after {} ms",
                        response_time_ms
                    );
                    false
                }
            }
        } else {
            false
        };

        Ok(AvailabilityResult {
            reachable,
            status_code: Some(status.as_u16()),
            response_time_ms,
            challenge_detected,
            has_meta_description,
            has_sitemap,
            final_url: Some(final_url),
            error: (!reachable).then(|| format!("HTTP {}", status.as_u16())),
        })
    }

    fn name(&self) -> &'static str {
        "availability"
    }
}

/// 判断响应是否为反爬虫挑战页
pub fn detect_challenge(status: StatusCode, headers: &HeaderMap, body: &str) -> bool {
    if headers
        .get("cf-mitigated")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("challenge"))
    {
        return true;
    }

    if !matches!(status.as_u16(), 403 | 429 | 503) {
        return false;
    }

    let lower = body.to_lowercase();
    CHALLENGE_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// 页面是否包含非空的 meta description
pub fn has_meta_description(html: &str) -> bool {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("meta[name][content]") else {
        return false;
    };
    document.select(&selector).any(|meta| {
        let element = meta.value();
        element
            .attr("name")
            .is_some_and(|name| name.eq_ignore_ascii_case("description"))
            && element
                .attr("content")
                .is_some_and(|content| !content.trim().is_empty())
    })
}

fn robots_declares_sitemap(body: &str) -> bool {
    body.lines().any(|line| {
        let line = line.trim();
        line.get(..8)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("sitemap:"))
            && line.get(8..).is_some_and(|rest| !rest.trim().is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn probe() -> AvailabilityProbe {
        probe_with_budget(Duration::from_secs(5))
    }

    fn probe_with_budget(budget: Duration) -> AvailabilityProbe {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        AvailabilityProbe::new(client, budget)
    }

    fn target(server: &MockServer) -> ProbeTarget {
        ProbeTarget {
            url: format!("{}/", server.uri()),
            domain: "localhost".to_string(),
        }
    }

    #[tokio::test]
    async fn test_reachable_site_with_meta_and_sitemap() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><head><meta name="Description" content="Widgets and more"></head></html>"#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("User-agent: *\nSitemap: https://example.com/sitemap.xml\n"),
            )
            .mount(&server)
            .await;

        let result = probe().run(&target(&server)).await.unwrap();
        assert!(result.reachable);
        assert_eq!(result.status_code, Some(200));
        assert!(result.has_meta_description);
        assert!(result.has_sitemap);
        assert!(!result.challenge_detected);
    }

    #[tokio::test]
    async fn test_sitemap_falls_back_to_well_known_paths() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/wp-sitemap.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<urlset/>"))
            .mount(&server)
            .await;

        let result = probe().run(&target(&server)).await.unwrap();
        assert!(result.has_sitemap);
        assert!(!result.has_meta_description);
    }

    #[tokio::test]
    async fn test_slow_homepage_keeps_measurement_when_sitemap_runs_out_of_budget() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"<meta name="description" content="Slow but alive">"#)
                    .set_delay(Duration::from_millis(1200)),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("Sitemap: https://example.com/sitemap.xml\n")
                    .set_delay(Duration::from_millis(1500)),
            )
            .mount(&server)
            .await;

        let budget = Duration::from_secs(2);
        let started = Instant::now();
        let result = probe_with_budget(budget)
            .run(&target(&server))
            .await
            .unwrap();

        assert!(started.elapsed() < budget + Duration::from_millis(500));
        assert!(result.reachable);
        assert!(result.response_time_ms >= 1200);
        assert!(result.has_meta_description);
        assert!(!result.has_sitemap);
    }

    #[tokio::test]
    async fn test_challenge_page_is_detected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_string("<title>Just a moment...</title><div id=\"cf_chl_opt\"></div>"),
            )
            .mount(&server)
            .await;

        let result = probe().run(&target(&server)).await.unwrap();
        assert!(result.reachable);
        assert!(result.challenge_detected);
        assert!(!result.has_sitemap);
    }

    #[tokio::test]
    async fn test_server_error_is_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let result = probe().run(&target(&server)).await.unwrap();
        assert!(!result.reachable);
        assert_eq!(result.error.as_deref(), Some("HTTP 502"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_data_not_error() {
        let target = ProbeTarget {
            url: "http://127.0.0.1:9/".to_string(),
            domain: "127.0.0.1".to_string(),
        };
        let result = probe().run(&target).await.unwrap();
        assert!(!result.reachable);
        assert!(result.status_code.is_none());
        assert!(result.error.is_some());
    }

    #[test]
    fn test_plain_forbidden_is_not_a_challenge() {
        assert!(!detect_challenge(
            StatusCode::FORBIDDEN,
            &HeaderMap::new(),
            "<h1>Forbidden</h1>"
        ));
        let mut headers = HeaderMap::new();
        headers.insert("cf-mitigated", "challenge".parse().unwrap());
        assert!(detect_challenge(StatusCode::OK, &headers, ""));
    }

    #[test]
    fn test_empty_meta_description_does_not_count() {
        assert!(!has_meta_description(
            r#"<meta name="description" content="   ">"#
        ));
        assert!(!has_meta_description("<meta property=\"og:description\" content=\"x\">"));
    }
}
