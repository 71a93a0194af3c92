// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::job_repository::RepositoryError;
use crate::domain::models::site::Site;
use async_trait::async_trait;
use uuid::Uuid;

/// 站点仓库特质
#[async_trait]
pub trait SiteRepository: Send + Sync {
    /// 根据ID查找站点
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Site>, RepositoryError>;
    /// 根据域名查找站点
    async fn find_by_domain(&self, domain: &str) -> Result<Option<Site>, RepositoryError>;
    /// 按域名插入或更新站点，返回持久化后的记录
    async fn upsert(&self, site: &Site) -> Result<Site, RepositoryError>;
}
