// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::config::settings::PageSpeedSettings;
use crate::domain::models::probe::PageSpeedResult;
use crate::probes::http::{ensure_success, map_request_error, provider_limiter, ProviderLimiter};
use crate::probes::traits::{Probe, ProbeError, ProbeTarget};

const CATEGORIES: [&str; 4] = ["performance", "accessibility", "best-practices", "seo"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PsiResponse {
    lighthouse_result: LighthouseResult,
}

#[derive(Debug, Deserialize)]
struct LighthouseResult {
    categories: HashMap<String, LighthouseCategory>,
    #[serde(default)]
    audits: HashMap<String, LighthouseAudit>,
}

#[derive(Debug, Deserialize)]
struct LighthouseCategory {
    score: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LighthouseAudit {
    numeric_value: Option<f64>,
}

/// PageSpeed Insights 探针
///
/// 通过令牌桶控制请求速率；上游 429 以 `ProbeError::RateLimited` 返回
pub struct PageSpeedProbe {
    client: Client,
    settings: PageSpeedSettings,
    limiter: Arc<ProviderLimiter>,
}

impl PageSpeedProbe {
    pub fn new(client: Client, settings: PageSpeedSettings) -> Self {
        let limiter = provider_limiter(settings.requests_per_minute);
        Self {
            client,
            settings,
            limiter,
        }
    }
}

#[async_trait]
impl Probe for PageSpeedProbe {
    type Output = PageSpeedResult;

    async fn run(&self, target: &ProbeTarget) -> Result<PageSpeedResult, ProbeError> {
        self.limiter.until_ready().await;

        let mut query: Vec<(&str, &str)> = vec![
            ("url", target.url.as_str()),
            ("strategy", self.settings.strategy.as_str()),
        ];
        query.extend(CATEGORIES.iter().map(|c| ("category", *c)));
        if let Some(key) = self.settings.api_key.as_deref() {
            query.push(("key", key));
        }

        debug!("Requesting PageSpeed report for {}", target.url);
        let response = self
            .client
            .get(&self.settings.base_url)
            .query(&query)
            .send()
            .await
            .map_err(map_request_error)?;
        let body = ensure_success(response)?
            .text()
            .await
            .map_err(map_request_error)?;

        parse_report(&body, &self.settings.strategy)
    }

    fn name(&self) -> &'static str {
        "pagespeed"
    }
}

fn category_score(result: &LighthouseResult, key: &str) -> Result<u8, ProbeError> {
    result
        .categories
        .get(key)
        .and_then(|c| c.score)
        .map(|score| (score * 100.0).round().clamp(0.0, 100.0) as u8)
        .ok_or_else(|| ProbeError::Parse(format!("missing {} score", key)))
}

fn audit_value(result: &LighthouseResult, key: &str) -> Option<f64> {
    result.audits.get(key).and_then(|a| a.numeric_value)
}

/// 解析 PageSpeed API 响应
pub fn parse_report(body: &str, strategy: &str) -> Result<PageSpeedResult, ProbeError> {
    let response: PsiResponse =
        serde_json::from_str(body).map_err(|e| ProbeError::Parse(e.to_string()))?;
    let lighthouse = response.lighthouse_result;

    Ok(PageSpeedResult {
        performance: category_score(&lighthouse, "performance")?,
        accessibility: category_score(&lighthouse, "accessibility")?,
        best_practices: category_score(&lighthouse, "best-practices")?,
        seo: category_score(&lighthouse, "seo")?,
        strategy: strategy.to_string(),
        largest_contentful_paint_ms: audit_value(&lighthouse, "largest-contentful-paint"),
        cumulative_layout_shift: audit_value(&lighthouse, "cumulative-layout-shift"),
        total_blocking_time_ms: audit_value(&lighthouse, "total-blocking-time"),
    })
}
