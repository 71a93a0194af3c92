// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use thiserror::Error;
use url::Url;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UrlError {
    #[error("invalid url {0}")]
    Invalid(String),
    #[error("unsupported scheme in {0}")]
    UnsupportedScheme(String),
}

/// 规范化后的站点地址
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteUrl {
    /// 小写主机名，去掉 `www.` 前缀
    pub domain: String,
    /// 站点首页：scheme + host (+ 非默认端口) + `/`
    pub url: String,
}

/// 把候选 URL 规范化为站点首页与域名
///
/// 路径、查询和片段都会被丢弃，同一站点的不同页面得到相同结果
pub fn normalize_site_url(raw: &str) -> Result<SiteUrl, UrlError> {
    let parsed = Url::parse(raw.trim()).map_err(|_| UrlError::Invalid(raw.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(UrlError::UnsupportedScheme(raw.to_string()));
    }
    let host = parsed
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| UrlError::Invalid(raw.to_string()))?
        .to_lowercase();

    let url = match parsed.port() {
        Some(port) => format!("{}://{}:{}/", parsed.scheme(), host, port),
        None => format!("{}://{}/", parsed.scheme(), host),
    };
    let domain = host.strip_prefix("www.").unwrap_or(&host).to_string();

    Ok(SiteUrl { domain, url })
}
