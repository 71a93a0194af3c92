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

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::redirect::Policy;
use reqwest::{Client, Response, StatusCode};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use crate::probes::traits::ProbeError;

/// 外部服务的令牌桶限流器
pub type ProviderLimiter = DefaultDirectRateLimiter;

/// 创建每分钟 `requests_per_minute` 次的令牌桶
pub fn provider_limiter(requests_per_minute: u32) -> Arc<ProviderLimiter> {
    let rpm = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(Quota::per_minute(rpm)))
}

/// 创建探针共享的 HTTP 客户端
///
/// # 参数
///
/// * `user_agent` - 请求使用的 User-Agent
/// * `timeout` - 单次请求超时
///
/// # 返回值
///
/// * `Ok(Client)` - 可在探针之间共享的客户端
/// * `Err(ProbeError)` - 客户端构建失败
pub fn build_client(user_agent: &str, timeout: Duration) -> Result<Client, ProbeError> {
    let client = Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(10))
        .build()?;
    Ok(client)
}

/// 将 reqwest 错误映射为探针错误
pub fn map_request_error(err: reqwest::Error) -> ProbeError {
    if err.is_timeout() {
        ProbeError::Timeout
    } else {
        ProbeError::Request(err)
    }
}

/// 429 映射为 RateLimited，其余非 2xx 映射为 Http
pub fn ensure_success(response: Response) -> Result<Response, ProbeError> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ProbeError::RateLimited);
    }
    if !status.is_success() {
        return Err(ProbeError::Http(status.as_u16()));
    }
    Ok(response)
}

/// 拼接站点根路径下的地址
pub fn join_path(base: &str, path: &str) -> Result<String, ProbeError> {
    let base = url::Url::parse(base).map_err(|e| ProbeError::Parse(e.to_string()))?;
    base.join(path)
        .map(|u| u.to_string())
        .map_err(|e| ProbeError::Parse(e.to_string()))
}
