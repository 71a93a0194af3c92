// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Client;

use crate::domain::models::probe::SecurityHeadersResult;
use crate::probes::http::map_request_error;
use crate::probes::traits::{Probe, ProbeError, ProbeTarget};

/// 检查的安全响应头
pub const SECURITY_HEADERS: [&str; 6] = [
    "strict-transport-security",
    "content-security-policy",
    "x-frame-options",
    "x-content-type-options",
    "referrer-policy",
    "permissions-policy",
];

/// 安全响应头探针
pub struct SecurityHeadersProbe {
    client: Client,
}

impl SecurityHeadersProbe {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Probe for SecurityHeadersProbe {
    type Output = SecurityHeadersResult;

    async fn run(&self, target: &ProbeTarget) -> Result<SecurityHeadersResult, ProbeError> {
        let response = self
            .client
            .get(&target.url)
            .send()
            .await
            .map_err(map_request_error)?;

        if response.status().is_server_error() {
            return Err(ProbeError::Http(response.status().as_u16()));
        }

        Ok(inspect_headers(response.headers()))
    }

    fn name(&self) -> &'static str {
        "security_headers"
    }
}

/// 按固定顺序划分已设置与缺失的安全头
pub fn inspect_headers(headers: &HeaderMap) -> SecurityHeadersResult {
    let (present, missing): (Vec<&str>, Vec<&str>) = SECURITY_HEADERS.into_iter().partition(|name| {
        headers
            .get(*name)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| !value.trim().is_empty())
    });

    SecurityHeadersResult {
        present: present.into_iter().map(str::to_string).collect(),
        missing: missing.into_iter().map(str::to_string).collect(),
    }
}
