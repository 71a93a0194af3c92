// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::models::site::Site;

/// 探针错误类型
#[derive(Error, Debug)]
pub enum ProbeError {
    /// 请求失败
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// 超时
    #[error("Timeout")]
    Timeout,
    /// 外部服务返回 429
    #[error("Rate limited by upstream")]
    RateLimited,
    /// 非预期的 HTTP 状态码
    #[error("Unexpected HTTP status {0}")]
    Http(u16),
    /// TLS 握手失败
    #[error("TLS error: {0}")]
    Tls(String),
    /// 响应无法解析
    #[error("Parse error: {0}")]
    Parse(String),
    /// 任务已取消
    #[error("Cancelled")]
    Cancelled,
}

impl ProbeError {
    /// 是否应由调度器退避后重试
    pub fn is_rate_limited(&self) -> bool {
        match self {
            ProbeError::RateLimited | ProbeError::Http(429) => true,
            ProbeError::Request(e) => e.status().is_some_and(|s| s.as_u16() == 429),
            _ => false,
        }
    }
}

/// 探针目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    /// 站点首页地址
    pub url: String,
    /// 小写主机名
    pub domain: String,
}

impl From<&Site> for ProbeTarget {
    fn from(site: &Site) -> Self {
        Self {
            url: site.url.clone(),
            domain: site.domain.clone(),
        }
    }
}

/// 探针特质
///
/// 每个探针只检查站点的一个维度，彼此之间互不依赖
#[async_trait]
pub trait Probe: Send + Sync {
    /// 探针结果类型
    type Output: Send;

    /// 执行探针
    async fn run(&self, target: &ProbeTarget) -> Result<Self::Output, ProbeError>;

    /// 探针名称
    fn name(&self) -> &'static str;
}
