// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use reqwest::header::HeaderMap;
use reqwest::Client;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::domain::models::probe::{VersionStatus, WordPressFingerprint, WpComponent};
use crate::probes::http::{ensure_success, join_path, map_request_error};
use crate::probes::traits::{Probe, ProbeError, ProbeTarget};
use crate::utils::version::{compare_versions, major_minor};

static GENERATOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta[^>]+name=["']generator["'][^>]+content=["']WordPress\s*([0-9][0-9.]*)?"#)
        .expect("Failed to compile generator regex")
});
static CORE_ASSET_VER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"/wp-includes/[^"'\s?]+\?ver=([0-9][0-9.]*)"#)
        .expect("Failed to compile core asset regex")
});
static THEME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"/wp-content/themes/([A-Za-z0-9_-]+)/([^"'\s?]*)(?:\?ver=([0-9][0-9.]*))?"#)
        .expect("Failed to compile theme regex")
});
static PLUGIN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"/wp-content/plugins/([A-Za-z0-9_-]+)/[^"'\s?]*(?:\?ver=([0-9][0-9.]*))?"#)
        .expect("Failed to compile plugin regex")
});

/// 发现阶段满足该信号数即视为确认，不再发起额外的网络探测
const CONFIRMED_SIGNALS: usize = 2;
/// stable-check 数据缓存时间
const STABLE_CHECK_TTL: Duration = Duration::from_secs(6 * 3600);

/// WordPress 检测信号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WpSignal {
    GeneratorTag,
    ContentPath,
    PoweredByHeader,
    ApiLinkHeader,
    RestApi,
    Readme,
}

/// WordPress 检测结果
#[derive(Debug, Clone, PartialEq)]
pub struct WordPressDetection {
    pub signals: Vec<WpSignal>,
    pub confidence: i32,
}

impl WordPressDetection {
    pub fn is_wordpress(&self) -> bool {
        self.confidence > 0
    }
}

/// 信号数量对应的离散置信度
pub fn confidence_for(signal_count: usize) -> i32 {
    match signal_count {
        0 => 0,
        1 => 50,
        2 => 80,
        _ => 95,
    }
}

/// 从首页响应头与 HTML 中提取无需额外请求的信号
pub fn static_signals(headers: &HeaderMap, html: &str) -> Vec<WpSignal> {
    let mut signals = Vec::new();

    if GENERATOR_RE.is_match(html) {
        signals.push(WpSignal::GeneratorTag);
    }
    if html.contains("/wp-content/") || html.contains("/wp-includes/") {
        signals.push(WpSignal::ContentPath);
    }

    let header_contains = |name: &str, needle: &str| {
        headers.get_all(name).iter().any(|value| {
            value
                .to_str()
                .is_ok_and(|v| v.to_ascii_lowercase().contains(needle))
        })
    };
    if header_contains("x-powered-by", "wordpress") {
        signals.push(WpSignal::PoweredByHeader);
    }
    if header_contains("link", "api.w.org") {
        signals.push(WpSignal::ApiLinkHeader);
    }

    signals
}

/// WordPress 多信号检测器
///
/// 静态信号不足 2 个时才探测 REST API；REST API 之后仍不足 2 个时才探测 readme.html。
pub struct WordPressDetector {
    client: Client,
}

impl WordPressDetector {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// 基于已抓取的首页完成检测
    pub async fn detect_from_page(
        &self,
        base_url: &str,
        headers: &HeaderMap,
        html: &str,
    ) -> WordPressDetection {
        let mut signals = static_signals(headers, html);

        if signals.len() < CONFIRMED_SIGNALS && self.rest_api_responds(base_url).await {
            signals.push(WpSignal::RestApi);
        }
        if signals.len() < CONFIRMED_SIGNALS && self.readme_exists(base_url).await {
            signals.push(WpSignal::Readme);
        }

        WordPressDetection {
            confidence: confidence_for(signals.len()),
            signals,
        }
    }

    async fn rest_api_responds(&self, base_url: &str) -> bool {
        let Ok(url) = join_path(base_url, "/wp-json/") else {
            return false;
        };
        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => response
                .text()
                .await
                .is_ok_and(|body| body.contains("\"namespaces\"") || body.contains("wp/v2")),
            Ok(_) => false,
            Err(e) => {
                debug!("REST API probe for {} failed: {}", base_url, e);
                false
            }
        }
    }

    async fn readme_exists(&self, base_url: &str) -> bool {
        let Ok(url) = join_path(base_url, "/readme.html") else {
            return false;
        };
        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => response
                .text()
                .await
                .is_ok_and(|body| body.contains("WordPress")),
            _ => false,
        }
    }
}

/// WordPress.org stable-check 数据：版本号 → latest/outdated/insecure
pub type StableCheck = HashMap<String, VersionStatus>;

/// 带 TTL 缓存的 stable-check 数据源
pub struct StableCheckFeed {
    client: Client,
    url: String,
    cache: Mutex<Option<(Instant, Arc<StableCheck>)>>,
}

impl StableCheckFeed {
    pub fn new(client: Client, api_base_url: &str) -> Self {
        Self {
            client,
            url: format!(
                "{}/core/stable-check/1.0/",
                api_base_url.trim_end_matches('/')
            ),
            cache: Mutex::new(None),
        }
    }

    pub async fn get(&self) -> Result<Arc<StableCheck>, ProbeError> {
        if let Some((fetched_at, feed)) = self.cache.lock().as_ref() {
            if fetched_at.elapsed() < STABLE_CHECK_TTL {
                return Ok(feed.clone());
            }
        }

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(map_request_error)?;
        let feed: StableCheck = ensure_success(response)?
            .json()
            .await
            .map_err(|e| ProbeError::Parse(e.to_string()))?;
        let feed = Arc::new(feed);
        *self.cache.lock() = Some((Instant::now(), feed.clone()));
        Ok(feed)
    }
}

/// 计算版本新鲜度：状态与落后的主/次版本数
pub fn assess_freshness(version: &str, feed: &StableCheck) -> (Option<VersionStatus>, Option<u32>) {
    let Some(current) = major_minor(version) else {
        return (None, None);
    };

    let newer_branches: BTreeSet<(u32, u32)> = feed
        .keys()
        .filter_map(|v| major_minor(v))
        .filter(|branch| *branch > current)
        .collect();
    let behind = newer_branches.len() as u32;

    let status = feed.get(version).copied().or_else(|| {
        let latest = feed
            .iter()
            .find(|(_, status)| **status == VersionStatus::Latest)
            .map(|(v, _)| v.as_str())?;
        match compare_versions(version, latest)? {
            std::cmp::Ordering::Less => Some(VersionStatus::Outdated),
            _ => Some(VersionStatus::Latest),
        }
    });

    (status, Some(behind))
}

#[derive(Debug, Deserialize)]
struct WpUser {
    slug: String,
}

/// 从首页 HTML 中枚举版本、主题与插件
pub fn extract_components(html: &str) -> WordPressFingerprint {
    let version = GENERATOR_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim_end_matches('.').to_string())
        .or_else(|| {
            CORE_ASSET_VER_RE
                .captures(html)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        });

    let theme = THEME_RE.captures_iter(html).fold(None::<WpComponent>, |acc, caps| {
        let slug = caps[1].to_string();
        let is_stylesheet = caps.get(2).is_some_and(|p| p.as_str() == "style.css");
        let version = caps.get(3).map(|m| m.as_str().to_string());
        match acc {
            None => Some(WpComponent { slug, version }),
            Some(mut existing) if existing.slug == slug => {
                if existing.version.is_none() || is_stylesheet {
                    existing.version = version.or(existing.version);
                }
                Some(existing)
            }
            other => other,
        }
    });

    let mut plugins: Vec<WpComponent> = Vec::new();
    for caps in PLUGIN_RE.captures_iter(html) {
        let slug = caps[1].to_string();
        let version = caps.get(2).map(|m| m.as_str().to_string());
        match plugins.iter_mut().find(|p| p.slug == slug) {
            Some(existing) => {
                if existing.version.is_none() {
                    existing.version = version;
                }
            }
            None => plugins.push(WpComponent { slug, version }),
        }
    }

    WordPressFingerprint {
        version,
        theme,
        plugins,
        ..Default::default()
    }
}

/// WordPress 指纹探针
///
/// 仅用于已知的 WordPress 站点
pub struct WordPressProbe {
    client: Client,
    stable_check: Arc<StableCheckFeed>,
}

impl WordPressProbe {
    pub fn new(client: Client, stable_check: Arc<StableCheckFeed>) -> Self {
        Self {
            client,
            stable_check,
        }
    }

    async fn enumerate_users(&self, base_url: &str) -> Vec<String> {
        let Ok(url) = join_path(base_url, "/wp-json/wp/v2/users") else {
            return Vec::new();
        };
        let response = match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => response,
            _ => return Vec::new(),
        };
        response
            .json::<Vec<WpUser>>()
            .await
            .map(|users| users.into_iter().map(|u| u.slug).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Probe for WordPressProbe {
    type Output = WordPressFingerprint;

    async fn run(&self, target: &ProbeTarget) -> Result<WordPressFingerprint, ProbeError> {
        let response = self
            .client
            .get(&target.url)
            .send()
            .await
            .map_err(map_request_error)?;
        let response = ensure_success(response)?;
        let base_url = response.url().to_string();
        let html = response.text().await.map_err(map_request_error)?;

        let mut fingerprint = extract_components(&html);
        fingerprint.users = self.enumerate_users(&base_url).await;

        if let Some(version) = fingerprint.version.clone() {
            match self.stable_check.get().await {
                Ok(feed) => {
                    let (status, behind) = assess_freshness(&version, &feed);
                    fingerprint.version_status = status;
                    fingerprint.releases_behind = behind;
                }
                Err(e) => warn!("WordPress stable-check unavailable: {}", e),
            }
        }

        Ok(fingerprint)
    }

    fn name(&self) -> &'static str {
        "wordpress"
    }
}

#[cfg(test)]
#[path = "wordpress_test.rs"]
mod tests;
