// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;

use crate::domain::models::contact::ContactCandidate;
use crate::probes::traits::ProbeError;

/// 联系人查找特质
///
/// 外部服务返回 429 时必须给出 `ProbeError::RateLimited`，由调度器退避重试
#[async_trait]
pub trait ContactFinder: Send + Sync {
    /// 查找域名下的公开联系人
    async fn find_contacts(&self, domain: &str) -> Result<Vec<ContactCandidate>, ProbeError>;

    /// 服务名称
    fn name(&self) -> &'static str;
}
